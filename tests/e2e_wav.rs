//! E2E tests for WAV playback and capture files
//!
//! A session reads its playback from a WAV file and the capture is written
//! back as mono 16-bit WAV at the playback rate.

use std::time::Duration;
use usbloop::analysis::tone;
use usbloop::wav::{read_wav, write_wav, WavError};
use usbloop::{sim, SampleBuffer, Session, SessionConfig};

fn sim_config() -> SessionConfig {
    SessionConfig {
        poll_timeout_ms: 1,
        arm_timeout_ms: 200,
        settle_ms: 20,
        ..SessionConfig::default()
    }
}

#[test]
fn test_wav_to_wav_session() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("tone.wav");
    let output = dir.path().join("output.wav");

    let played = tone::sine(44100, 440.0, Duration::from_millis(50), 0.5);
    write_wav(&input, &played).unwrap();

    let playback = read_wav(&input).unwrap();
    let (dac, adc) = sim::loopback(1 << 16);
    let outcome = Session::new(sim_config()).run(dac, adc, &playback).unwrap();
    write_wav(&output, &outcome.capture).unwrap();

    let captured = read_wav(&output).unwrap();
    assert_eq!(captured.sample_rate(), 44100);
    assert_eq!(captured.samples(), played.samples());

    let spec = hound::WavReader::open(&output).unwrap().spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
}

#[test]
fn test_wav_data_matches_raw_le_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("raw.wav");
    let buffer = SampleBuffer::new(vec![0x0102, -2, i16::MIN], 8000);
    write_wav(&path, &buffer).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    // The data chunk is the last chunk and holds little-endian PCM
    assert!(bytes.ends_with(&buffer.to_le_bytes()));
}

#[test]
fn test_stereo_playback_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stereo.wav");
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 48000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    writer.write_sample(1i16).unwrap();
    writer.write_sample(2i16).unwrap();
    writer.finalize().unwrap();

    assert!(matches!(
        read_wav(&path),
        Err(WavError::UnsupportedFormat { channels: 2, .. })
    ));
}
