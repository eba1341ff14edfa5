//! AFSK1200 loopback demo.
//!
//! Modulates a message into the Bell 202 waveform, optionally writes
//! it out as a listenable .au file, then feeds the same samples back
//! through the demodulator and prints the recovered frames.
//!
//! ```text
//! loopback --message "hello world" --au packet.au -vv
//! ```
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Parser;
use log::{debug, info};

use afsk1200::au::AuWriter;
use afsk1200::config::Config;
use afsk1200::hdlc::{escape, Deframer};
use afsk1200::modem::Afsk;
use afsk1200::platform::{Platform, Ticks};

#[derive(clap::Parser, Debug)]
#[command(version, about)]
struct Opt {
    /// Verbosity level.
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Message to push through the loopback.
    #[arg(long, default_value = "The quick brown fox jumps over the lazy dog")]
    message: String,

    /// Write the transmitted waveform to this .au file.
    #[arg(long)]
    au: Option<std::path::PathBuf>,
}

/// In-memory "board": the DAC fills a sample buffer, the ADC drains
/// one.
#[derive(Default)]
struct MemoryBoard {
    dac_on: AtomicBool,
    samples: Mutex<Vec<u8>>,
    adc_queue: Mutex<VecDeque<i8>>,
}

impl Platform for MemoryBoard {
    fn adc_read(&self) -> i8 {
        self.adc_queue.lock().unwrap().pop_front().unwrap_or(0)
    }
    fn dac_write(&self, sample: u8) {
        self.samples.lock().unwrap().push(sample);
    }
    fn dac_irq_start(&self) {
        self.dac_on.store(true, Ordering::SeqCst);
    }
    fn dac_irq_stop(&self) {
        self.dac_on.store(false, Ordering::SeqCst);
    }
    fn clock(&self) -> Ticks {
        0
    }
    fn ms_to_ticks(&self, ms: u32) -> Ticks {
        ms.into()
    }
    fn cpu_relax(&self) {
        std::thread::yield_now();
    }
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    stderrlog::new()
        .module(module_path!())
        .module("afsk1200")
        .verbosity(usize::from(opt.verbose))
        .timestamp(stderrlog::Timestamp::Second)
        .init()?;

    let board = Arc::new(MemoryBoard::default());
    let config = Config {
        // Large enough that a whole message fits without blocking the
        // single-threaded writer.
        tx_buflen: 4096,
        rx_buflen: 4096,
        ..Config::default()
    };
    let (mut modem, mut adc, mut dac) = Afsk::new(config, board.clone())?;

    // Transmit.
    let escaped = escape(opt.message.as_bytes());
    info!("sending {} bytes ({} after escaping)", opt.message.len(), escaped.len());
    modem.write(&escaped);
    while board.dac_on.load(Ordering::SeqCst) {
        dac.tick();
    }
    modem.flush();
    let samples = board.samples.lock().unwrap().clone();
    info!(
        "transmission is {} samples ({} ms of audio)",
        samples.len(),
        samples.len() as u32 * 1000 / config.dac_sample_rate
    );

    if let Some(path) = &opt.au {
        let mut au = AuWriter::new(std::fs::File::create(path)?, config.dac_sample_rate)?;
        au.write_samples(&samples)?;
        au.finish()?;
        info!("wrote waveform to {}", path.display());
    }

    // Receive the same waveform.
    for &s in &samples {
        board
            .adc_queue
            .lock()
            .unwrap()
            .push_back((i16::from(s) - 128) as i8);
        adc.tick();
    }

    let mut buf = vec![0u8; samples.len()];
    let n = modem.read(&mut buf);
    debug!("recovered byte stream: {:02x?}", &buf[..n]);

    let mut deframer = Deframer::new();
    let mut frames = Vec::new();
    for &b in &buf[..n] {
        if let Some(frame) = deframer.push(b) {
            frames.push(frame);
        }
    }
    for (i, frame) in frames.iter().enumerate() {
        println!(
            "frame {i}: {} bytes: {}",
            frame.len(),
            String::from_utf8_lossy(frame)
        );
    }
    if frames.iter().any(|f| f.as_slice() == opt.message.as_bytes()) {
        println!("loopback OK");
    } else {
        anyhow::bail!("message did not survive the loopback");
    }
    Ok(())
}
