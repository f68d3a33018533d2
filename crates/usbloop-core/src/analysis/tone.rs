//! Test tone generation

use crate::stream::buffer::SampleBuffer;
use std::f64::consts::PI;
use std::time::Duration;

/// Waveform of a generated tone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Sine,
    Square,
}

fn sample_count(sample_rate: u32, duration: Duration) -> usize {
    (sample_rate as f64 * duration.as_secs_f64()).round() as usize
}

fn scale(amplitude: f64) -> f64 {
    amplitude.clamp(0.0, 1.0) * i16::MAX as f64
}

/// Generate a sine tone starting at zero phase
///
/// `amplitude` is relative to full scale and clamped to `0.0..=1.0`.
pub fn sine(
    sample_rate: u32,
    frequency_hz: f64,
    duration: Duration,
    amplitude: f64,
) -> SampleBuffer {
    let peak = scale(amplitude);
    let step = 2.0 * PI * frequency_hz / sample_rate as f64;
    let samples = (0..sample_count(sample_rate, duration))
        .map(|i| (peak * (step * i as f64).sin()).round() as i16)
        .collect();
    SampleBuffer::new(samples, sample_rate)
}

/// Generate a square tone, high for the first half of each period
pub fn square(
    sample_rate: u32,
    frequency_hz: f64,
    duration: Duration,
    amplitude: f64,
) -> SampleBuffer {
    let peak = scale(amplitude).round() as i16;
    let period = sample_rate as f64 / frequency_hz;
    let samples = (0..sample_count(sample_rate, duration))
        .map(|i| {
            if (i as f64 % period) < period / 2.0 {
                peak
            } else {
                -peak
            }
        })
        .collect();
    SampleBuffer::new(samples, sample_rate)
}

/// Generate a tone of the given shape
pub fn generate(
    shape: Shape,
    sample_rate: u32,
    frequency_hz: f64,
    duration: Duration,
    amplitude: f64,
) -> SampleBuffer {
    match shape {
        Shape::Sine => sine(sample_rate, frequency_hz, duration, amplitude),
        Shape::Square => square(sample_rate, frequency_hz, duration, amplitude),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_length_and_peak() {
        let tone = sine(48000, 1000.0, Duration::from_millis(10), 1.0);
        assert_eq!(tone.len(), 480);
        assert_eq!(tone.sample_rate(), 48000);
        assert_eq!(tone.samples()[0], 0);
        // quarter period at 48 samples per cycle
        assert_eq!(tone.samples()[12], i16::MAX);
    }

    #[test]
    fn test_amplitude_clamped() {
        let tone = sine(8000, 2000.0, Duration::from_millis(1), 3.0);
        assert_eq!(*tone.samples().iter().max().unwrap(), i16::MAX);
    }

    #[test]
    fn test_square_alternates() {
        let tone = square(8000, 1000.0, Duration::from_millis(1), 0.5);
        let high = (0.5 * i16::MAX as f64).round() as i16;
        assert_eq!(&tone.samples()[..8], &[high, high, high, high, -high, -high, -high, -high]);
    }

    #[test]
    fn test_zero_duration() {
        assert!(generate(Shape::Sine, 48000, 440.0, Duration::ZERO, 0.5).is_empty());
    }
}
