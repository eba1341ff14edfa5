//! End-to-end loopback: the modulator's DAC samples, recentered to
//! signed, are fed straight back into the demodulator, and the
//! recovered byte stream is checked against what was written.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;

use afsk1200::config::{Config, Filter};
use afsk1200::hdlc::{escape, Deframer, AX25_ESC, HDLC_FLAG};
use afsk1200::modem::Afsk;
use afsk1200::platform::{Platform, Ticks};

/// In-memory board: DAC samples pile up in a vec, the ADC drains a
/// queue preloaded by the test.
#[derive(Default)]
struct TestBoard {
    dac_on: AtomicBool,
    samples: Mutex<Vec<u8>>,
    adc_queue: Mutex<VecDeque<i8>>,
}

impl Platform for TestBoard {
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

fn roomy_config() -> Config {
    Config {
        rx_buflen: 4096,
        tx_buflen: 4096,
        ..Config::default()
    }
}

/// Transmit an already-escaped byte stream, return the waveform.
fn modulate(escaped: &[u8], config: Config) -> Result<Vec<u8>> {
    let board = Arc::new(TestBoard::default());
    let (mut modem, _adc, mut dac) = Afsk::new(config, board.clone())?;
    assert_eq!(modem.write(escaped), escaped.len());
    while board.dac_on.load(Ordering::SeqCst) {
        dac.tick();
    }
    // Quiescent: flush is instant, twice in a row, and the DAC
    // interrupt stays down.
    modem.flush();
    modem.flush();
    assert!(!board.dac_on.load(Ordering::SeqCst));
    let samples = board.samples.lock().unwrap().clone();
    Ok(samples)
}

/// Receive a waveform; return (de-escaped frames, raw escaped stream).
fn demodulate(samples: &[u8], config: Config) -> Result<(Vec<Vec<u8>>, Vec<u8>)> {
    let board = Arc::new(TestBoard::default());
    let (mut modem, mut adc, _dac) = Afsk::new(config, board.clone())?;
    for &s in samples {
        board
            .adc_queue
            .lock()
            .unwrap()
            .push_back((i16::from(s) - 128) as i8);
        adc.tick();
    }
    let mut buf = vec![0u8; samples.len()];
    let n = modem.read(&mut buf);
    let raw = buf[..n].to_vec();

    let mut deframer = Deframer::new();
    let mut frames = Vec::new();
    for &b in &raw {
        if let Some(frame) = deframer.push(b) {
            frames.push(frame);
        }
    }
    Ok((frames, raw))
}

fn loopback(escaped: &[u8], config: Config) -> Result<(Vec<Vec<u8>>, Vec<u8>)> {
    let samples = modulate(escaped, config)?;
    demodulate(&samples, config)
}

/// The noise-free round trips from the design's scenario table.
#[test]
fn scenario_payloads_survive_roundtrip() -> Result<()> {
    let config = roomy_config();
    for payload in [
        vec![0x55],
        vec![0x7E],
        vec![0xFF, 0xFF],
        vec![0x1B],
        vec![0x41],
        (0u8..=255).collect::<Vec<u8>>(),
    ] {
        let (frames, _raw) = loopback(&escape(&payload), config)?;
        assert_eq!(
            frames.last(),
            Some(&payload),
            "payload {payload:02x?} did not survive"
        );
    }
    Ok(())
}

#[test]
fn both_filters_decode() -> Result<()> {
    let payload = b"filter check".to_vec();
    for filter in [Filter::Butterworth, Filter::Chebyshev] {
        let config = Config {
            filter,
            ..roomy_config()
        };
        let (frames, _raw) = loopback(&escape(&payload), config)?;
        assert_eq!(frames.last(), Some(&payload), "{filter:?}");
    }
    Ok(())
}

/// A flag byte written as payload must come back escaped on the raw
/// stream, and bare after deframing.
#[test]
fn reserved_payload_is_escaped_on_the_stream() -> Result<()> {
    let config = roomy_config();
    let (frames, raw) = loopback(&escape(&[0x7E]), config)?;
    assert_eq!(frames.last(), Some(&vec![0x7E]));
    assert!(
        raw.windows(2).any(|w| w == [AX25_ESC, HDLC_FLAG]),
        "no escape pair in raw stream {raw:02x?}"
    );
    Ok(())
}

/// An escape pair around a byte that needs no escaping is tone-mapped
/// as the bare literal.
#[test]
fn gratuitous_escape_sends_the_literal() -> Result<()> {
    let config = roomy_config();
    let (frames, _raw) = loopback(&[AX25_ESC, 0x41], config)?;
    assert_eq!(frames.last(), Some(&vec![0x41]));
    Ok(())
}

/// Writing one byte produces exactly preamble flags, the byte, trailer
/// flags, then silence.
#[test]
fn one_byte_transmission_sample_count() -> Result<()> {
    let config = Config {
        // 13 ms of preamble rounds to 2 flag bytes, 7 ms of trailer
        // to 1.
        preamble_ms: 13,
        trailer_ms: 7,
        ..roomy_config()
    };
    let samples = modulate(&[0x55], config)?;
    // 4 bytes of 8 unstuffed bits at 8 samples per bit.
    assert_eq!(samples.len(), 4 * 8 * 8);
    Ok(())
}

/// A receiver that joins half a bit late still locks during the
/// preamble and decodes the payload.
#[test]
fn phase_offset_still_decodes() -> Result<()> {
    let config = roomy_config();
    let payload = b"offset tolerant".to_vec();
    let samples = modulate(&escape(&payload), config)?;
    let (frames, _raw) = demodulate(&samples[4..], config)?;
    assert!(frames.contains(&payload), "frames: {frames:02x?}");
    Ok(())
}

/// Foreground writer and DAC drain running concurrently across the
/// SPSC FIFO, with a transmit buffer much smaller than the message.
#[test]
fn concurrent_writer_and_dac_drain() -> Result<()> {
    let config = Config {
        tx_buflen: 8,
        rx_buflen: 4096,
        ..Config::default()
    };
    let payload = b"0123456789abcdefghijklmnopqrstuv".to_vec();
    let board = Arc::new(TestBoard::default());
    let (mut modem, mut adc, mut dac) = Afsk::new(config, board.clone())?;

    let done = Arc::new(AtomicBool::new(false));
    let drain = {
        let board = board.clone();
        let done = done.clone();
        std::thread::spawn(move || {
            while !done.load(Ordering::SeqCst) {
                if board.dac_on.load(Ordering::SeqCst) {
                    dac.tick();
                } else {
                    std::thread::yield_now();
                }
            }
        })
    };

    // Blocks whenever the 8-byte FIFO fills, resuming as the drain
    // thread makes room.
    assert_eq!(modem.write(&payload), payload.len());
    modem.flush();
    // The DAC interrupt dropping is the definitive end of key-down.
    while board.dac_on.load(Ordering::SeqCst) {
        std::thread::yield_now();
    }
    done.store(true, Ordering::SeqCst);
    drain.join().unwrap();
    assert!(!board.dac_on.load(Ordering::SeqCst));

    let samples = board.samples.lock().unwrap().clone();
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

    // If the drain ever outran the writer, the frame was split by
    // trailer flags; the payload bytes themselves must still arrive
    // intact and in order.
    let mut deframer = Deframer::new();
    let mut got = Vec::new();
    for &b in &buf[..n] {
        if let Some(frame) = deframer.push(b) {
            got.extend(frame);
        }
    }
    assert_eq!(got, payload);
    Ok(())
}

/// The transmission is a full-swing waveform centered at 128. The
/// coarsest phase step lands within 59 table entries of a peak, which
/// still reads at least 220, so both rails get close even when no
/// sample hits them exactly.
#[test]
fn waveform_swings_full_scale() -> Result<()> {
    let samples = modulate(&escape(b"range"), roomy_config())?;
    assert!(samples.len() > 1000);
    assert!(*samples.iter().max().unwrap() >= 220);
    assert!(*samples.iter().min().unwrap() <= 35);
    Ok(())
}

/// A transmission teed to disk is a well-formed .au file: 28 byte
/// header plus one big-endian PCM16 word per DAC sample.
#[test]
fn waveform_capture_to_au_file() -> Result<()> {
    use afsk1200::au::AuWriter;

    let samples = modulate(&escape(b"on disk"), roomy_config())?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("packet.au");
    let mut au = AuWriter::new(std::fs::File::create(&path)?, 9600)?;
    au.write_samples(&samples)?;
    au.finish()?;

    let bytes = std::fs::read(&path)?;
    assert_eq!(bytes.len(), 28 + 2 * samples.len());
    assert_eq!(&bytes[0..4], b".snd");
    assert_eq!(&bytes[16..20], &9600u32.to_be_bytes());
    Ok(())
}
