//! PCM sample buffers
//!
//! [`SampleBuffer`] is the in-memory form of a mono 16-bit recording: what
//! the WAV reader produces for playback and what the WAV writer consumes after
//! capture. [`CaptureChunks`] accumulates capture reads without reallocating
//! one growing buffer on every read.

use super::protocol::decode_be_samples;
use std::time::Duration;

/// Mono, signed 16-bit PCM plus its sample rate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBuffer {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Channel count carried by the protocol
    pub const CHANNELS: u16 = 1;

    /// Bytes per sample
    pub const SAMPLE_WIDTH: u16 = 2;

    /// Wrap decoded samples
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples in time order
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether there are no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Size of the raw PCM data in bytes (always `2 * len()`)
    pub fn byte_len(&self) -> usize {
        self.samples.len() * Self::SAMPLE_WIDTH as usize
    }

    /// Raw little-endian PCM, as stored in a WAV data chunk
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    /// Playback duration at the buffer's sample rate
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Append-only list of decoded capture chunks
///
/// Chunks are kept in arrival order and concatenated exactly once, when the
/// capture is handed off.
#[derive(Debug, Default)]
pub struct CaptureChunks {
    chunks: Vec<Vec<i16>>,
    carry: Option<u8>,
    sample_count: usize,
    byte_count: usize,
}

impl CaptureChunks {
    /// Empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one big-endian read and append it
    ///
    /// # Returns
    /// Number of whole samples appended
    pub fn push_bytes(&mut self, bytes: &[u8]) -> usize {
        self.byte_count += bytes.len();
        let chunk = decode_be_samples(bytes, &mut self.carry);
        let n = chunk.len();
        if n > 0 {
            self.sample_count += n;
            self.chunks.push(chunk);
        }
        n
    }

    /// Samples accumulated so far
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Non-empty chunks accumulated so far
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Raw bytes received so far
    pub fn byte_count(&self) -> usize {
        self.byte_count
    }

    /// Whether a half sample is waiting for its second byte
    pub fn has_partial_sample(&self) -> bool {
        self.carry.is_some()
    }

    /// Concatenate every chunk in arrival order
    ///
    /// A dangling half sample is dropped.
    pub fn into_buffer(self, sample_rate: u32) -> SampleBuffer {
        if self.carry.is_some() {
            tracing::warn!(
                bytes = self.byte_count,
                "capture ended on an odd byte, dropping half sample"
            );
        }
        SampleBuffer::new(self.chunks.concat(), sample_rate)
    }
}
