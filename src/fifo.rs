/*! Lock-free SPSC ring buffers.

The modem's three execution contexts only ever meet at bounded FIFOs:
the ADC context produces into the receive FIFO, the DAC context consumes
from the transmit FIFO, and the foreground sits on the other end of
both. Every crossing is strictly single-producer single-consumer, so the
rings use free-running atomic head/tail counters with acquire/release
ordering instead of masking interrupts around a critical section. One
set of methods therefore serves both the interrupt and the foreground
side.

Capacities must be a power of two so the counters can wrap with a mask.
*/
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{Error, Result};

/// Bounded single-producer single-consumer ring buffer.
///
/// `push` may only be called from one context at a time, and `pop` from
/// one context at a time; the two sides may run concurrently.
#[derive(Debug)]
pub struct Fifo<T> {
    buf: Box<[UnsafeCell<T>]>,
    mask: usize,
    /// Total number of items ever pushed.
    head: AtomicUsize,
    /// Total number of items ever popped.
    tail: AtomicUsize,
}

// SAFETY:
// The head/tail protocol gives the producer exclusive access to the slot
// it writes and the consumer exclusive access to the slot it reads; the
// release store publishing an index happens after the slot access.
unsafe impl<T: Send> Send for Fifo<T> {}
unsafe impl<T: Send> Sync for Fifo<T> {}

impl<T: Copy + Default> Fifo<T> {
    /// Create a new ring holding up to `capacity` items.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(Error::msg(format!(
                "fifo capacity {capacity} is not a nonzero power of two"
            )));
        }
        Ok(Self {
            buf: (0..capacity).map(|_| UnsafeCell::new(T::default())).collect(),
            mask: capacity - 1,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        })
    }

    /// Maximum number of items the ring can hold.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.head
            .load(Ordering::Acquire)
            .wrapping_sub(self.tail.load(Ordering::Acquire))
    }

    /// True if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if another `push` would be refused.
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Append one item. Returns false if the ring is full.
    #[must_use]
    pub fn push(&self, v: T) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head.wrapping_sub(tail) == self.capacity() {
            return false;
        }
        // SAFETY:
        // Single producer: nobody else writes this slot, and the
        // consumer won't read it until the store below publishes it.
        unsafe {
            *self.buf[head & self.mask].get() = v;
        }
        self.head.store(head.wrapping_add(1), Ordering::Release);
        true
    }

    /// Remove and return the oldest item, if any.
    pub fn pop(&self) -> Option<T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        // SAFETY:
        // Single consumer, and the acquire load of `head` made the
        // producer's write to this slot visible.
        let v = unsafe { *self.buf[tail & self.mask].get() };
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(v)
    }
}
