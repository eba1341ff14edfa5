/*! AFSK receive pipeline.

One [`Demodulator::process`] call per ADC sample does the whole receive
chain: frequency discrimination, low-pass filtering, bit slicing, clock
recovery and NRZI decoding, handing decoded bits to the HDLC parser.

Frequency discrimination is a delay-line multiply: the newest sample
times the sample from half a bit ago. With a half-bit delay the product
averages negative on the 1200 Hz mark tone and positive on the 2200 Hz
space tone, so the sign after low-passing is the sliced bit. The filter
is a first order IIR at roughly 600 Hz whose feedback coefficient is
approximated with shifts and adds, so the whole chain runs without a
multiplier wider than 8x8.

Clock recovery is a counting loop nudged by signal edges: the phase
accumulator gains [`PHASE_BIT`] every sample and an extra ±1 toward the
midpoint whenever the sliced signal toggles. When it wraps, the bit
value is the majority vote of the three newest sliced samples.
*/
use crate::config::Filter;
use crate::fifo::Fifo;
use crate::hdlc::Parser;
use crate::{Result, SAMPLES_PER_BIT};

/// Phase accumulator units per ADC sample.
pub const PHASE_BIT: i16 = 8;

/// Phase nudge applied on a detected edge.
const PHASE_INC: i16 = 1;

/// Phase accumulator wrap point; one full bit period.
pub const PHASE_MAX: i16 = SAMPLES_PER_BIT as i16 * PHASE_BIT;

/// Nominal sampling point, the middle of the bit.
const PHASE_THRES: i16 = PHASE_MAX / 2;

/// Did the two newest bits of `bits` differ?
fn edge_found(bits: u8) -> bool {
    (bits ^ (bits >> 1)) & 0x01 != 0
}

/// Receive demodulator state. Owned exclusively by the ADC context.
#[derive(Debug)]
pub struct Demodulator {
    filter: Filter,
    /// Raw samples from half a bit ago.
    delay_fifo: Fifo<i8>,
    /// IIR input history.
    iir_x: [i16; 2],
    /// IIR output history.
    iir_y: [i16; 2],
    /// Sliced bits at the sample rate, newest in the LSB.
    sampled_bits: u8,
    /// Decided bits at the bit rate, newest in the LSB.
    found_bits: u8,
    /// Clock recovery phase, in `[0, PHASE_MAX)`.
    curr_phase: i16,
    hdlc: Parser,
}

impl Demodulator {
    /// Create a demodulator with the delay line primed with zeros.
    pub fn new(filter: Filter) -> Result<Self> {
        let delay_fifo = Fifo::with_capacity(SAMPLES_PER_BIT as usize / 2)?;
        for _ in 0..SAMPLES_PER_BIT / 2 {
            let ok = delay_fifo.push(0);
            debug_assert!(ok);
        }
        Ok(Self {
            filter,
            delay_fifo,
            iir_x: [0; 2],
            iir_y: [0; 2],
            sampled_bits: 0,
            found_bits: 0,
            curr_phase: 0,
            hdlc: Parser::new(),
        })
    }

    /// Process one signed, centered ADC sample.
    ///
    /// Recovered bytes land in `rx_fifo`. A sample is never dropped
    /// here; on FIFO overflow the HDLC parser abandons the frame
    /// instead.
    pub fn process(&mut self, curr_sample: i8, rx_fifo: &Fifo<u8>) {
        self.iir_x[0] = self.iir_x[1];

        let delayed = self.delay_fifo.pop().unwrap_or_default();
        self.iir_x[1] = (i16::from(delayed) * i16::from(curr_sample)) >> 2;

        self.iir_y[0] = self.iir_y[1];
        self.iir_y[1] = match self.filter {
            // y * 21/32 = y/2 + y/8 + y/32, close enough to the exact
            // 0.668 Butterworth feedback.
            Filter::Butterworth => {
                self.iir_x[0]
                    + self.iir_x[1]
                    + (self.iir_y[0] >> 1)
                    + (self.iir_y[0] >> 3)
                    + (self.iir_y[0] >> 5)
            }
            // y/2 approximates the exact 0.438 Chebyshev feedback.
            Filter::Chebyshev => self.iir_x[0] + self.iir_x[1] + (self.iir_y[0] >> 1),
        };

        self.sampled_bits <<= 1;
        if self.iir_y[1] > 0 {
            self.sampled_bits |= 1;
        }

        // Keep the delay line at exactly half a bit of history.
        let ok = self.delay_fifo.push(curr_sample);
        debug_assert!(ok);

        // An edge tells us where the bit boundary is; drag the sampling
        // point toward the middle. A phase exactly at the threshold
        // nudges downward.
        if edge_found(self.sampled_bits) {
            if self.curr_phase < PHASE_THRES {
                self.curr_phase += PHASE_INC;
            } else {
                self.curr_phase -= PHASE_INC;
            }
        }
        self.curr_phase += PHASE_BIT;

        if self.curr_phase >= PHASE_MAX {
            self.curr_phase %= PHASE_MAX;

            self.found_bits <<= 1;
            // Majority vote over the three newest sliced samples.
            if matches!(self.sampled_bits & 0x07, 0b111 | 0b110 | 0b101 | 0b011) {
                self.found_bits |= 1;
            }

            // NRZI: two equal bits in a row decode to 1, a transition
            // decodes to 0.
            self.hdlc.feed(!edge_found(self.found_bits), rx_fifo);
        }
    }

    #[cfg(test)]
    fn delay_len(&self) -> usize {
        self.delay_fifo.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;

    #[test]
    fn edge_detector() {
        assert!(!edge_found(0b00));
        assert!(!edge_found(0b11));
        assert!(edge_found(0b01));
        assert!(edge_found(0b10));
        assert!(edge_found(0b1110));
        assert!(!edge_found(0b1011));
    }

    #[test]
    fn delay_line_occupancy_is_constant() -> Result<()> {
        let rx = Fifo::with_capacity(32)?;
        let mut d = Demodulator::new(Filter::Butterworth)?;
        assert_eq!(d.delay_len(), SAMPLES_PER_BIT as usize / 2);
        for i in 0..1000 {
            d.process((i % 251) as i8, &rx);
            assert_eq!(d.delay_len(), SAMPLES_PER_BIT as usize / 2);
        }
        Ok(())
    }

    #[test]
    fn silence_produces_no_bytes() -> Result<()> {
        for filter in [Filter::Butterworth, Filter::Chebyshev] {
            let rx = Fifo::with_capacity(32)?;
            let mut d = Demodulator::new(filter)?;
            for _ in 0..10_000 {
                d.process(0, &rx);
            }
            assert!(rx.is_empty());
        }
        Ok(())
    }
}
