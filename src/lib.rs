/*! AFSK1200 software modem.

A full duplex [Bell 202][bell202] compatible modulator/demodulator for
1200 bps packet radio, framed with [HDLC][hdlc] and using the in-band
escape convention of the [AX.25][ax25] link layer above it.

On the transmit side a stream of octets is turned into a quantized
sinusoidal waveform, one 8 bit DAC sample at a time. On the receive side
periodic signed ADC samples are turned back into a recovered octet
stream.

# Architecture overview

Data flows through five pipeline stages:

```text
RX: ADC tick → Discriminator+IIR → Slicer+Clock recovery → NRZI decode
       → HDLC parser → RX FIFO → reader

TX: writer → TX FIFO → HDLC framer+Bit stuffer → NRZI+Tone select
       → DDS+Sine LUT → DAC tick
```

Three execution contexts share the modem on a single CPU: the foreground
(read/write/flush), an ADC-rate context and a DAC-rate context. The
contexts only meet at lock-free SPSC FIFOs and a couple of atomics; each
context owns its DSP state outright.

Hardware sits behind the [`platform::Platform`] trait: the ADC/DAC
drivers, interrupt control, debug strobe pins, the monotonic clock and
the `cpu_relax` idle hint are all collaborators supplied by the
embedder. The AX.25 packet layer (addressing, FCS, retransmission) is
layered above the byte stream this crate exposes and is not part of it.

# Example

```no_run
use std::sync::Arc;
use afsk1200::config::Config;
use afsk1200::modem::Afsk;
# struct Board;
# impl afsk1200::platform::Platform for Board {
#     fn adc_read(&self) -> i8 { 0 }
#     fn dac_write(&self, _: u8) {}
#     fn dac_irq_start(&self) {}
#     fn dac_irq_stop(&self) {}
#     fn clock(&self) -> afsk1200::platform::Ticks { 0 }
#     fn ms_to_ticks(&self, ms: u32) -> afsk1200::platform::Ticks { ms.into() }
#     fn cpu_relax(&self) {}
# }
let board = Arc::new(Board);
let (mut modem, mut adc, mut dac) = Afsk::new(Config::default(), board)?;
// Register `adc.tick()` and `dac.tick()` with the sample interrupts,
// then talk to the modem through the façade:
modem.write(&afsk1200::hdlc::escape(b"hello"));
modem.flush();
# Ok::<(), afsk1200::Error>(())
```

[bell202]: https://en.wikipedia.org/wiki/Bell_202_modem
[hdlc]: https://en.wikipedia.org/wiki/High-Level_Data_Link_Control
[ax25]: https://en.wikipedia.org/wiki/AX.25
 */

pub mod au;
pub mod config;
pub mod dds;
pub mod demod;
pub mod fifo;
pub mod hdlc;
pub mod modem;
pub mod modulator;
pub mod platform;

/// ADC sample rate, in Hz.
pub const SAMPLE_RATE: u32 = 9600;

/// Line bit rate, in bits per second.
pub const BIT_RATE: u32 = 1200;

/// ADC samples per bit.
pub const SAMPLES_PER_BIT: u32 = SAMPLE_RATE / BIT_RATE;

// The receive pipeline is designed for exactly this ratio.
const _: () = assert!(SAMPLE_RATE % BIT_RATE == 0);
const _: () = assert!(SAMPLES_PER_BIT == 8);

/// AFSK modem error.
#[derive(Debug, Clone)]
pub struct Error {
    msg: String,
}

impl Error {
    /// Create error from message.
    pub fn msg(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "afsk1200 error: {}", self.msg)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::msg(format!("IO error: {e}"))
    }
}

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;
