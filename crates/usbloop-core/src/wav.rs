//! WAV file I/O
//!
//! Playback input and capture output are mono, 16-bit integer PCM WAV files.
//! Anything else is rejected on read rather than converted.

use crate::stream::buffer::SampleBuffer;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;
use thiserror::Error;

/// Errors from reading or writing WAV files
#[derive(Error, Debug)]
pub enum WavError {
    #[error("WAV I/O failed: {0}")]
    Hound(#[from] hound::Error),

    #[error("unsupported WAV format: {channels} channel(s), {bits} bit {format}, expected mono 16-bit integer")]
    UnsupportedFormat {
        channels: u16,
        bits: u16,
        format: &'static str,
    },

    #[error("WAV sample rate must be non-zero")]
    ZeroSampleRate,
}

fn spec_for(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: SampleBuffer::CHANNELS,
        sample_rate,
        bits_per_sample: SampleBuffer::SAMPLE_WIDTH * 8,
        sample_format: SampleFormat::Int,
    }
}

/// Read a mono 16-bit WAV file
///
/// # Arguments
/// * `path` - WAV file to decode
///
/// # Returns
/// The samples in file order and the file's sample rate
pub fn read_wav(path: impl AsRef<Path>) -> Result<SampleBuffer, WavError> {
    let path = path.as_ref();
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    if spec.channels != SampleBuffer::CHANNELS
        || spec.bits_per_sample != SampleBuffer::SAMPLE_WIDTH * 8
        || spec.sample_format != SampleFormat::Int
    {
        return Err(WavError::UnsupportedFormat {
            channels: spec.channels,
            bits: spec.bits_per_sample,
            format: match spec.sample_format {
                SampleFormat::Int => "integer",
                SampleFormat::Float => "float",
            },
        });
    }
    if spec.sample_rate == 0 {
        return Err(WavError::ZeroSampleRate);
    }

    let samples = reader.samples::<i16>().collect::<Result<Vec<_>, _>>()?;

    tracing::info!(
        path = %path.display(),
        samples = samples.len(),
        sample_rate = spec.sample_rate,
        "WAV loaded"
    );
    Ok(SampleBuffer::new(samples, spec.sample_rate))
}

/// Write a mono 16-bit WAV file
pub fn write_wav(path: impl AsRef<Path>, buffer: &SampleBuffer) -> Result<(), WavError> {
    let path = path.as_ref();
    if buffer.sample_rate() == 0 {
        return Err(WavError::ZeroSampleRate);
    }

    let mut writer = WavWriter::create(path, spec_for(buffer.sample_rate()))?;
    for &sample in buffer.samples() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    tracing::info!(
        path = %path.display(),
        samples = buffer.len(),
        sample_rate = buffer.sample_rate(),
        "WAV saved"
    );
    Ok(())
}
