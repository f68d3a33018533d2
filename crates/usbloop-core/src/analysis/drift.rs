//! Clock drift estimation
//!
//! The DAC and ADC run from independent oscillators. Playing a tone of known
//! frequency and measuring it in the capture reveals how far the two sample
//! clocks disagree:
//!
//! ```text
//! skew_ppm     = (f_measured - f_nominal) / f_nominal * 1e6
//! slip_period  = 1 / |f_measured - f_nominal|     (seconds per cycle slipped)
//! ```
//!
//! The fine estimate averages the spacing of rising zero crossings, each
//! located to a fraction of a sample by linear interpolation. An FFT peak
//! gives a coarse estimate when no nominal frequency is known.

use crate::stream::buffer::SampleBuffer;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

/// Drift of a captured tone against its nominal frequency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    /// Frequency the tone was generated at (Hz)
    pub nominal_hz: f64,
    /// Frequency measured in the capture (Hz)
    pub estimated_hz: f64,
    /// Relative clock skew in parts per million
    pub skew_ppm: f64,
    /// Seconds until the capture slips one full cycle; `None` without drift
    pub slip_period_secs: Option<f64>,
    /// Symmetric mismatch against a measured reference, see [`relative_mismatch`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_mismatch: Option<f64>,
}

impl DriftReport {
    /// Derive skew and slip period from a nominal and a measured frequency
    pub fn new(nominal_hz: f64, estimated_hz: f64) -> Self {
        let diff = estimated_hz - nominal_hz;
        Self {
            nominal_hz,
            estimated_hz,
            skew_ppm: diff / nominal_hz * 1_000_000.0,
            slip_period_secs: (diff != 0.0).then(|| 1.0 / diff.abs()),
            relative_mismatch: None,
        }
    }

    /// Mark the nominal frequency as measured from a played reference
    ///
    /// Both frequencies are then estimates, so the symmetric mismatch is
    /// reported alongside the skew.
    pub fn with_reference(mut self) -> Self {
        self.relative_mismatch = Some(relative_mismatch(self.nominal_hz, self.estimated_hz));
        self
    }
}

/// Symmetric relative difference between a sent and a received frequency
pub fn relative_mismatch(f_tx: f64, f_rx: f64) -> f64 {
    let ratio = f_tx / f_rx;
    (ratio - 1.0) * 2.0 / (ratio + 1.0)
}

fn remove_dc(samples: &[i16]) -> Vec<f64> {
    if samples.is_empty() {
        return Vec::new();
    }
    let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / samples.len() as f64;
    samples.iter().map(|&s| s as f64 - mean).collect()
}

/// Fractional sample positions of rising zero crossings
fn rising_crossings(signal: &[f64]) -> Vec<f64> {
    signal
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] < 0.0 && w[1] >= 0.0)
        .map(|(i, w)| i as f64 + (-w[0]) / (w[1] - w[0]))
        .collect()
}

/// Estimate the frequency of a periodic signal from its zero crossings
///
/// # Returns
/// `None` if fewer than two rising crossings are present
pub fn estimate_frequency(samples: &[i16], sample_rate: u32) -> Option<f64> {
    let crossings = rising_crossings(&remove_dc(samples));
    if crossings.len() < 2 {
        return None;
    }
    let span = crossings[crossings.len() - 1] - crossings[0];
    let period = span / (crossings.len() - 1) as f64;
    (period > 0.0).then(|| sample_rate as f64 / period)
}

/// Coarse frequency estimate from the FFT magnitude peak
///
/// Applies a Hann window and refines the peak bin by parabolic interpolation.
pub fn estimate_frequency_fft(samples: &[i16], sample_rate: u32) -> Option<f64> {
    let n = samples.len();
    if n < 4 {
        return None;
    }

    let signal = remove_dc(samples);
    let mut spectrum: Vec<Complex<f64>> = signal
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let w = 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / (n - 1) as f64).cos();
            Complex::new(x * w, 0.0)
        })
        .collect();

    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(n).process(&mut spectrum);

    let magnitudes: Vec<f64> = spectrum[..n / 2].iter().map(|c| c.norm()).collect();
    let (peak, &peak_mag) = magnitudes
        .iter()
        .enumerate()
        .skip(1)
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    if peak_mag <= 0.0 {
        return None;
    }

    let offset = match (magnitudes.get(peak - 1), magnitudes.get(peak + 1)) {
        (Some(&a), Some(&c)) => {
            let denom = a - 2.0 * peak_mag + c;
            if denom.abs() > f64::EPSILON {
                0.5 * (a - c) / denom
            } else {
                0.0
            }
        }
        _ => 0.0,
    };

    Some((peak as f64 + offset) * sample_rate as f64 / n as f64)
}

/// Frequency estimates over sliding windows of whole periods
///
/// # Arguments
/// * `nominal_hz` - Approximate tone frequency, sets the window length
/// * `periods_per_window` - Cycles covered by each window
/// * `step_ratio` - Window advance as a fraction of its length
///
/// Windows without two rising crossings yield `NaN`.
pub fn sliding_frequencies(
    samples: &[i16],
    sample_rate: u32,
    nominal_hz: f64,
    periods_per_window: usize,
    step_ratio: f64,
) -> Vec<f64> {
    if nominal_hz <= 0.0 || periods_per_window == 0 {
        return Vec::new();
    }
    let window = (sample_rate as f64 / nominal_hz * periods_per_window as f64) as usize;
    let step = ((window as f64 * step_ratio) as usize).max(1);
    if window == 0 || samples.len() <= window {
        return Vec::new();
    }

    (0..samples.len() - window)
        .step_by(step)
        .map(|start| {
            estimate_frequency(&samples[start..start + window], sample_rate).unwrap_or(f64::NAN)
        })
        .collect()
}

/// Measure the drift of a captured tone
///
/// Without a nominal frequency the FFT peak, rounded to the nearest hertz,
/// stands in for it.
pub fn analyze(capture: &SampleBuffer, nominal_hz: Option<f64>) -> Option<DriftReport> {
    let rate = capture.sample_rate();
    let estimated = estimate_frequency(capture.samples(), rate)?;
    let nominal = match nominal_hz {
        Some(f) if f > 0.0 => f,
        Some(_) => return None,
        None => estimate_frequency_fft(capture.samples(), rate)?.round(),
    };

    let report = DriftReport::new(nominal, estimated);
    tracing::info!(
        nominal_hz = report.nominal_hz,
        estimated_hz = report.estimated_hz,
        skew_ppm = report.skew_ppm,
        "drift measured"
    );
    Some(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tone;
    use approx::assert_relative_eq;
    use std::time::Duration;

    #[test]
    fn test_zero_crossing_estimate() {
        let tone = tone::sine(48000, 1000.0, Duration::from_millis(500), 0.8);
        let f = estimate_frequency(tone.samples(), 48000).unwrap();
        assert_relative_eq!(f, 1000.0, max_relative = 1e-5);
    }

    #[test]
    fn test_fft_estimate() {
        let tone = tone::sine(180_000, 18_000.0, Duration::from_millis(100), 0.5);
        let f = estimate_frequency_fft(tone.samples(), 180_000).unwrap();
        assert!((f - 18_000.0).abs() < 10.0, "got {f}");
    }

    #[test]
    fn test_silence_has_no_frequency() {
        let silence = vec![0i16; 1000];
        assert!(estimate_frequency(&silence, 48000).is_none());
        assert!(estimate_frequency_fft(&silence, 48000).is_none());
    }

    #[test]
    fn test_drift_report() {
        let report = DriftReport::new(18_000.0, 18_000.9);
        assert_relative_eq!(report.skew_ppm, 50.0, max_relative = 1e-6);
        assert_relative_eq!(report.slip_period_secs.unwrap(), 1.0 / 0.9, max_relative = 1e-6);

        let exact = DriftReport::new(1000.0, 1000.0);
        assert_eq!(exact.skew_ppm, 0.0);
        assert!(exact.slip_period_secs.is_none());
        assert!(exact.relative_mismatch.is_none());
    }

    #[test]
    fn test_report_with_reference() {
        let report = DriftReport::new(1000.0, 999.0).with_reference();
        assert_relative_eq!(
            report.relative_mismatch.unwrap(),
            relative_mismatch(1000.0, 999.0),
            epsilon = 1e-15
        );
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["relative_mismatch"].as_f64().unwrap() > 0.0);

        let plain = serde_json::to_value(DriftReport::new(1000.0, 999.0)).unwrap();
        assert!(plain.get("relative_mismatch").is_none());
    }

    #[test]
    fn test_detects_clock_skew() {
        // A tone generated at 1000.5 Hz reads as 500 ppm fast against 1000 Hz.
        let tone = tone::sine(48000, 1000.5, Duration::from_secs(1), 0.8);
        let report = analyze(&tone, Some(1000.0)).unwrap();
        assert_relative_eq!(report.skew_ppm, 500.0, epsilon = 5.0);
    }

    #[test]
    fn test_analyze_without_nominal() {
        let tone = tone::sine(48000, 1200.0, Duration::from_millis(250), 0.8);
        let report = analyze(&tone, None).unwrap();
        assert_eq!(report.nominal_hz, 1200.0);
        assert!(report.skew_ppm.abs() < 50.0);
    }

    #[test]
    fn test_relative_mismatch() {
        assert_eq!(relative_mismatch(1000.0, 1000.0), 0.0);
        assert!(relative_mismatch(1001.0, 1000.0) > 0.0);
        assert_relative_eq!(
            relative_mismatch(1001.0, 1000.0),
            -relative_mismatch(1000.0, 1001.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_sliding_windows() {
        let tone = tone::sine(12_000, 1000.0, Duration::from_millis(100), 0.8);
        let freqs = sliding_frequencies(tone.samples(), 12_000, 1000.0, 5, 0.5);
        // 1200 samples, 60-sample windows, 30-sample step
        assert_eq!(freqs.len(), 38);
        for f in freqs {
            assert!((f - 1000.0).abs() < 5.0, "got {f}");
        }
    }
}
