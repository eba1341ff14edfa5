/*! Modem configuration record.

All the knobs the original firmware exposed as build-time options,
bundled into one struct handed to the modem constructor and validated
there once. Defaults match the firmware's.
*/
use crate::{Error, Result, BIT_RATE};

/// Receive low-pass filter variant.
///
/// Both are first order IIRs around 600 Hz with shift-and-add feedback;
/// Butterworth has the flatter passband, Chebyshev the cheaper inner
/// loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    /// Feedback ≈ 0.668 (`y>>1 + y>>3 + y>>5`).
    #[default]
    Butterworth,
    /// Feedback ≈ 0.438 (`y>>1`).
    Chebyshev,
}

/// What `read` does when the receive FIFO is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RxTimeout {
    /// Return a short count immediately.
    #[default]
    NonBlocking,
    /// Wait forever.
    Infinite,
    /// Wait up to this many milliseconds per byte, then return short.
    Millis(u32),
}

/// Modem configuration.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Receive IIR variant.
    pub filter: Filter,
    /// Receive FIFO depth in bytes; power of two.
    pub rx_buflen: usize,
    /// Transmit FIFO depth in bytes; power of two.
    pub tx_buflen: usize,
    /// DAC sample rate in Hz; integer multiple of the bit rate.
    pub dac_sample_rate: u32,
    /// Flag fill ahead of the data, in milliseconds.
    pub preamble_ms: u32,
    /// Flag fill after the data, in milliseconds.
    pub trailer_ms: u32,
    /// Receive wait policy.
    pub rx_timeout: RxTimeout,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            filter: Filter::default(),
            rx_buflen: 32,
            tx_buflen: 32,
            dac_sample_rate: 9600,
            preamble_ms: 300,
            trailer_ms: 50,
            rx_timeout: RxTimeout::default(),
        }
    }
}

impl Config {
    /// Check the cross-field invariants.
    ///
    /// FIFO depths are validated where the FIFOs are built; this
    /// catches the rate relation the bit timing depends on.
    pub fn validate(&self) -> Result<()> {
        if self.dac_sample_rate == 0 || self.dac_sample_rate % BIT_RATE != 0 {
            return Err(Error::msg(format!(
                "DAC sample rate {} must be a nonzero multiple of {BIT_RATE}",
                self.dac_sample_rate
            )));
        }
        Ok(())
    }
}
