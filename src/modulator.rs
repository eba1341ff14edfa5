/*! AFSK transmit pipeline.

One [`Modulator::next_sample`] call per DAC sample. The inner loop is a
single DDS step; the outer per-bit logic runs whenever the previous
bit's samples are spent and handles byte fetch (preamble flags, FIFO
data, trailer flags), the in-band escape convention, bit stuffing and
the NRZI tone decision.

NRZI: transmitting a 1 keeps the current tone; a 0 switches it. Bit
stuffing inserts a forced 0 after [`BIT_STUFF_LEN`] ones in a row, but
is suspended while flags or abort bytes are on the air so they stay
recognizable.
*/
use std::sync::atomic::{AtomicU16, Ordering};

use log::trace;

use crate::dds::Dds;
use crate::fifo::Fifo;
use crate::hdlc::{AX25_ESC, BIT_STUFF_LEN, HDLC_FLAG, HDLC_RESET};
use crate::{Result, BIT_RATE};

/// Transmit modulator state. Owned exclusively by the DAC context.
#[derive(Debug)]
pub struct Modulator {
    dds: Dds,
    /// DAC samples per transmitted bit.
    dac_samples_per_bit: u16,
    /// Byte currently being shifted out.
    curr_out: u8,
    /// Walking mask over `curr_out`, LSB first; 0 means byte done.
    tx_bit: u8,
    /// DAC samples left in the current bit.
    sample_count: u16,
    /// False while a flag or abort byte is on the air.
    bit_stuff: bool,
    /// Consecutive 1 bits emitted since the last 0.
    stuff_cnt: u8,
}

impl Modulator {
    /// Create a modulator primed to start on the mark tone.
    pub fn new(dac_sample_rate: u32) -> Result<Self> {
        let dds = Dds::new(dac_sample_rate)?;
        Ok(Self {
            dds,
            dac_samples_per_bit: (dac_sample_rate / BIT_RATE) as u16,
            curr_out: 0,
            tx_bit: 0,
            sample_count: 0,
            bit_stuff: false,
            stuff_cnt: 0,
        })
    }

    /// Phase increment of the mark tone (for logging at init).
    pub fn mark_inc(&self) -> u16 {
        self.dds.mark_inc()
    }

    /// Phase increment of the space tone (for logging at init).
    pub fn space_inc(&self) -> u16 {
        self.dds.space_inc()
    }

    /// Restore the primed idle state after a teardown, so the next
    /// transmission starts at zero phase on the mark tone.
    pub fn reset(&mut self) {
        self.dds.reset();
        self.curr_out = 0;
        self.tx_bit = 0;
        self.sample_count = 0;
        self.bit_stuff = false;
        self.stuff_cnt = 0;
    }

    /// Produce the next DAC sample.
    ///
    /// Returns `None` when the byte source is exhausted (TX FIFO empty
    /// with no trailer left, or a trailing escape with no partner
    /// byte); the caller must then stop the DAC interrupt, clear the
    /// sending flag and [`reset`](Self::reset) this modulator.
    pub fn next_sample(
        &mut self,
        tx_fifo: &Fifo<u8>,
        preamble_len: &AtomicU16,
        trailer_len: &AtomicU16,
    ) -> Option<u8> {
        if self.sample_count == 0 {
            if self.tx_bit == 0 {
                // Finished a byte; fetch the next one.
                if tx_fifo.is_empty() && trailer_len.load(Ordering::Acquire) == 0 {
                    return None;
                }

                // A byte sent without stuffing must not leak its run
                // length into the next one.
                if !self.bit_stuff {
                    self.stuff_cnt = 0;
                }
                self.bit_stuff = true;

                let preamble = preamble_len.load(Ordering::Acquire);
                self.curr_out = if preamble > 0 {
                    preamble_len.store(preamble - 1, Ordering::Release);
                    HDLC_FLAG
                } else if let Some(b) = tx_fifo.pop() {
                    b
                } else {
                    let trailer = trailer_len.load(Ordering::Acquire);
                    if trailer > 0 {
                        trailer_len.store(trailer - 1, Ordering::Release);
                    }
                    HDLC_FLAG
                };

                if self.curr_out == AX25_ESC {
                    // Escape: the partner byte is sent as a literal.
                    // With no partner queued, treat it as end of
                    // stream.
                    match tx_fifo.pop() {
                        Some(b) => self.curr_out = b,
                        None => return None,
                    }
                } else if self.curr_out == HDLC_FLAG || self.curr_out == HDLC_RESET {
                    // Unescaped framing bytes go out unstuffed.
                    self.bit_stuff = false;
                }

                trace!("tx byte {:02x}, stuffing {}", self.curr_out, self.bit_stuff);
                self.tx_bit = 0x01;
            }

            if self.bit_stuff && self.stuff_cnt >= BIT_STUFF_LEN {
                // Five ones in a row: force a 0 before looking at the
                // next payload bit.
                self.stuff_cnt = 0;
                self.dds.switch_tone();
            } else {
                if self.curr_out & self.tx_bit != 0 {
                    // 1: stay on the tone.
                    self.stuff_cnt += 1;
                } else {
                    // 0: switch tone.
                    self.stuff_cnt = 0;
                    self.dds.switch_tone();
                }
                self.tx_bit <<= 1;
            }
            self.sample_count = self.dac_samples_per_bit;
        }

        self.sample_count -= 1;
        Some(self.dds.step())
    }
}
