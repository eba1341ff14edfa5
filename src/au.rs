/*! Sun audio (.au) waveform capture.

The format is very simple, and is documented on
<https://en.wikipedia.org/wiki/Au_file_format>.

The benefit .au has over .wav is that .au can be written as a stream,
without seeking back to the file header to update data sizes, which is
handy for teeing a transmission to disk as it happens. Only 16 bit
linear PCM mono is implemented.
*/
use std::io::Write;

use crate::Result;

const MAGIC: u32 = 0x2e73_6e64; // ".snd"
const HEADER_LEN: u32 = 28;
const SIZE_UNKNOWN: u32 = 0xffff_ffff;
const ENCODING_PCM16: u32 = 3;

/// Streaming .au writer for DAC samples.
pub struct AuWriter<W: Write> {
    w: W,
}

impl<W: Write> AuWriter<W> {
    /// Write the header and return a writer ready for samples.
    pub fn new(mut w: W, sample_rate: u32) -> Result<Self> {
        let mut header = Vec::with_capacity(HEADER_LEN as usize);
        header.extend(MAGIC.to_be_bytes());
        header.extend(HEADER_LEN.to_be_bytes());
        header.extend(SIZE_UNKNOWN.to_be_bytes());
        header.extend(ENCODING_PCM16.to_be_bytes());
        header.extend(sample_rate.to_be_bytes());
        header.extend(1u32.to_be_bytes()); // mono
        header.extend([0, 0, 0, 0]); // minimum annotation field
        w.write_all(&header)?;
        Ok(Self { w })
    }

    /// Append one unsigned DAC sample, recentered and widened to PCM16.
    pub fn write_sample(&mut self, sample: u8) -> Result<()> {
        let pcm = (i16::from(sample) - 128) << 8;
        self.w.write_all(&pcm.to_be_bytes())?;
        Ok(())
    }

    /// Append many samples.
    pub fn write_samples(&mut self, samples: &[u8]) -> Result<()> {
        for &s in samples {
            self.write_sample(s)?;
        }
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.w.flush()?;
        Ok(self.w)
    }
}
