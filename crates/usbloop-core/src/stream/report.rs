//! Session results and the JSON session report

use super::adc::CaptureReport;
use super::buffer::SampleBuffer;
use super::dac::FeedReport;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Everything a completed duplex session produced
///
/// The capture buffer is handed off here exactly once; nothing in the
/// session touches it afterwards.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// Captured samples in arrival order
    pub capture: SampleBuffer,
    /// DAC feeder counters
    pub feed: FeedReport,
    /// ADC drainer counters
    pub capture_report: CaptureReport,
    /// Wall-clock start of the session
    pub started_at: DateTime<Utc>,
    /// Time from start until both tasks were joined
    pub elapsed: Duration,
}

impl SessionOutcome {
    /// Summary suitable for saving next to the capture
    pub fn report(&self) -> SessionReport {
        SessionReport {
            started_at: self.started_at,
            finished_at: self.started_at
                + chrono::Duration::from_std(self.elapsed)
                    .unwrap_or_else(|_| chrono::Duration::zero()),
            elapsed_ms: self.elapsed.as_millis() as u64,
            sample_rate: self.capture.sample_rate(),
            feed: self.feed.clone(),
            capture: self.capture_report.clone(),
        }
    }
}

/// Serializable summary of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub sample_rate: u32,
    pub feed: FeedReport,
    pub capture: CaptureReport,
}

impl SessionReport {
    /// Pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as JSON, creating parent directories if needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json_pretty()?)?;
        tracing::info!(path = %path.display(), "session report saved");
        Ok(())
    }
}
