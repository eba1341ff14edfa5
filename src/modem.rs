/*! Modem façade and execution contexts.

[`Afsk::new`] builds the whole modem and hands back three objects:

* [`Afsk`]: the foreground façade with the blocking stream interface
  (`write`, `read`, `flush`).
* [`AdcIsr`]: the receive context; call [`AdcIsr::tick`] once per ADC
  sample interrupt.
* [`DacIsr`]: the transmit context; call [`DacIsr::tick`] once per DAC
  sample interrupt while transmission is enabled.

The three only share the two byte FIFOs and a few atomics; everything
else is owned by exactly one of them, so no locking happens anywhere on
the data path.

Writing data arms the transmitter: the first byte starts the preamble
and enables the DAC interrupt through the platform; the transmitter
tears itself down after the trailer and `flush` returns once it has.
Writing more data while a transmission is live extends it, reloading
the trailer window so the new bytes go out in the same key-down.
*/
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;

use log::{debug, trace};

use crate::config::{Config, RxTimeout};
use crate::dds::div_round;
use crate::demod::Demodulator;
use crate::fifo::Fifo;
use crate::modulator::Modulator;
use crate::platform::Platform;
use crate::{Result, BIT_RATE};

/// State crossing between contexts. Everything here is either an SPSC
/// FIFO or a single atomic word.
struct Shared {
    /// ADC context producer, foreground consumer.
    rx_fifo: Fifo<u8>,
    /// Foreground producer, DAC context consumer.
    tx_fifo: Fifo<u8>,
    /// True from transmission start until the DAC context tears down.
    sending: AtomicBool,
    /// Flag bytes left to send ahead of the data.
    preamble_len: AtomicU16,
    /// Flag bytes left to send after the data runs out. Reloaded on
    /// every write so appending extends a live transmission.
    trailer_len: AtomicU16,
}

/// Milliseconds of flag fill, as a count of flag bytes.
fn flag_bytes(ms: u32) -> u16 {
    u16::try_from(div_round(ms * BIT_RATE, 8000)).unwrap_or(u16::MAX)
}

/// Foreground façade: the modem's byte stream interface.
///
/// `write` and `read` take `&mut self`: the façade is the single
/// producer of the TX FIFO and the single consumer of the RX FIFO, and
/// exclusive access makes that discipline a compile time property.
pub struct Afsk<P> {
    shared: Arc<Shared>,
    platform: Arc<P>,
    config: Config,
}

/// Receive context, to be driven at the ADC sample rate.
pub struct AdcIsr<P> {
    shared: Arc<Shared>,
    platform: Arc<P>,
    demod: Demodulator,
}

/// Transmit context, to be driven at the DAC sample rate while enabled.
pub struct DacIsr<P> {
    shared: Arc<Shared>,
    platform: Arc<P>,
    modulator: Modulator,
}

impl<P: Platform> Afsk<P> {
    /// Build a modem: validate the configuration, bind the FIFOs,
    /// prime the demodulator delay line and initialize the receive
    /// hardware.
    pub fn new(config: Config, platform: Arc<P>) -> Result<(Afsk<P>, AdcIsr<P>, DacIsr<P>)> {
        config.validate()?;
        let shared = Arc::new(Shared {
            rx_fifo: Fifo::with_capacity(config.rx_buflen)?,
            tx_fifo: Fifo::with_capacity(config.tx_buflen)?,
            sending: AtomicBool::new(false),
            preamble_len: AtomicU16::new(0),
            trailer_len: AtomicU16::new(0),
        });
        let demod = Demodulator::new(config.filter)?;
        let modulator = Modulator::new(config.dac_sample_rate)?;

        platform.adc_init();
        platform.strobe_init();
        debug!(
            "afsk1200 up: mark_inc {}, space_inc {}",
            modulator.mark_inc(),
            modulator.space_inc()
        );

        Ok((
            Afsk {
                shared: shared.clone(),
                platform: platform.clone(),
                config,
            },
            AdcIsr {
                shared: shared.clone(),
                platform: platform.clone(),
                demod,
            },
            DacIsr {
                shared,
                platform,
                modulator,
            },
        ))
    }

    /// Queue bytes for transmission, starting or extending a
    /// transmission as needed. Blocks (spinning on `cpu_relax`) while
    /// the TX FIFO is full; returns the number of bytes accepted,
    /// always `buf.len()`.
    pub fn write(&mut self, buf: &[u8]) -> usize {
        for &b in buf {
            while self.shared.tx_fifo.is_full() {
                self.platform.cpu_relax();
            }
            // Sole producer, and we just saw space.
            let ok = self.shared.tx_fifo.push(b);
            debug_assert!(ok);
            self.tx_start();
        }
        buf.len()
    }

    /// Read received bytes. How long it waits for each byte is decided
    /// by [`Config::rx_timeout`]; returns the number of bytes stored,
    /// which is short on timeout or (in non-blocking mode) an empty
    /// FIFO.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        for slot in buf.iter_mut() {
            let b = match self.config.rx_timeout {
                RxTimeout::NonBlocking => match self.shared.rx_fifo.pop() {
                    Some(b) => b,
                    None => return n,
                },
                RxTimeout::Infinite => loop {
                    if let Some(b) = self.shared.rx_fifo.pop() {
                        break b;
                    }
                    self.platform.cpu_relax();
                },
                RxTimeout::Millis(ms) => {
                    let budget = self.platform.ms_to_ticks(ms);
                    let start = self.platform.clock();
                    loop {
                        if let Some(b) = self.shared.rx_fifo.pop() {
                            break b;
                        }
                        if self.platform.clock().wrapping_sub(start) > budget {
                            return n;
                        }
                        self.platform.cpu_relax();
                    }
                }
            };
            *slot = b;
            n += 1;
        }
        n
    }

    /// Wait until the transmitter has drained and torn down. Instant
    /// when nothing is being sent.
    pub fn flush(&self) {
        while self.shared.sending.load(Ordering::Acquire) {
            self.platform.cpu_relax();
        }
    }

    /// Arm the transmitter. Priming only happens when no transmission
    /// is live; the trailer window is reloaded every time so appended
    /// data pushes it out.
    ///
    /// The fence pairs with the one in the DAC context's teardown: the
    /// byte just pushed and the sending flag are checked on opposite
    /// sides, and the fences make sure at least one side sees the
    /// other's store, so a byte queued during a teardown is never
    /// stranded.
    fn tx_start(&self) {
        std::sync::atomic::fence(Ordering::SeqCst);
        if !self.shared.sending.load(Ordering::SeqCst) {
            self.shared
                .preamble_len
                .store(flag_bytes(self.config.preamble_ms), Ordering::Release);
            self.shared.sending.store(true, Ordering::SeqCst);
            debug!("tx start");
            self.platform.dac_irq_start();
        }
        self.shared
            .trailer_len
            .store(flag_bytes(self.config.trailer_ms), Ordering::Release);
    }
}

impl<P: Platform> AdcIsr<P> {
    /// Process one ADC sample interrupt.
    pub fn tick(&mut self) {
        self.platform.strobe_on();
        let sample = self.platform.adc_read();
        self.demod.process(sample, &self.shared.rx_fifo);
        self.platform.strobe_off();
        self.platform.adc_irq_end();
    }
}

impl<P: Platform> DacIsr<P> {
    /// Process one DAC sample interrupt.
    ///
    /// When the byte source runs dry this stops the DAC interrupt,
    /// clears the sending flag and re-primes the modulator for the
    /// next transmission.
    pub fn tick(&mut self) {
        match self.modulator.next_sample(
            &self.shared.tx_fifo,
            &self.shared.preamble_len,
            &self.shared.trailer_len,
        ) {
            Some(sample) => self.platform.dac_write(sample),
            None => {
                // The byte source ran dry, but the writer may have
                // queued a byte while we were deciding. Publish the
                // teardown, then look again; the fence pairs with the
                // one in tx_start.
                self.shared.sending.store(false, Ordering::SeqCst);
                std::sync::atomic::fence(Ordering::SeqCst);
                if self.shared.tx_fifo.is_empty() {
                    self.platform.dac_irq_stop();
                    self.modulator.reset();
                    trace!("tx teardown");
                } else {
                    self.shared.sending.store(true, Ordering::SeqCst);
                }
            }
        }
        self.platform.dac_irq_end();
    }
}
