//! Session coordination
//!
//! A session runs the ADC drainer and the DAC feeder on two named threads
//! that share nothing but the one-shot [`SessionSignals`]. Each task owns its
//! endpoint and its buffer outright, so no payload is ever locked.
//!
//! Ordering guarantees:
//! - the DAC sample-rate word is written only after `adc_ready` is set
//! - the ADC stop marker is written only after `dac_finished` is set
//!
//! A fatal fault in either task sets `abort`, which releases the other task
//! from its unbounded waits so both threads can be joined.

use super::adc::{AdcDrainer, CaptureReport};
use super::buffer::SampleBuffer;
use super::dac::{DacFeeder, FeedReport};
use super::endpoint::BulkEndpoint;
use super::error::{Side, StreamError};
use super::protocol::ADC_HALF_BUFFER_SIZE;
use super::report::SessionOutcome;
use super::signal::{SessionSignals, Signal};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

fn default_poll_timeout_ms() -> u64 {
    10
}

fn default_arm_timeout_ms() -> u64 {
    1000
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_capture_read_size() -> usize {
    ADC_HALF_BUFFER_SIZE
}

fn default_stale_reads() -> usize {
    2
}

/// Timing and sizing knobs for a streaming session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Steady-state read timeout in milliseconds
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// Timeout for the ADC arm acknowledgement in milliseconds
    #[serde(default = "default_arm_timeout_ms")]
    pub arm_timeout_ms: u64,
    /// Pause after the DAC completion byte before `dac_finished` is set
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Largest capture read in bytes (half the ADC double buffer)
    #[serde(default = "default_capture_read_size")]
    pub capture_read_size: usize,
    /// Reads spent discarding stale ADC data before arming
    #[serde(default = "default_stale_reads")]
    pub stale_reads: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: default_poll_timeout_ms(),
            arm_timeout_ms: default_arm_timeout_ms(),
            settle_ms: default_settle_ms(),
            capture_read_size: default_capture_read_size(),
            stale_reads: default_stale_reads(),
        }
    }
}

impl SessionConfig {
    /// Steady-state read timeout
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Arm acknowledgement timeout
    pub fn arm_timeout(&self) -> Duration {
        Duration::from_millis(self.arm_timeout_ms)
    }

    /// Settle pause after DAC completion
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Runs one task, turning its failure or panic into an `abort` for the other
fn supervise<T>(
    side: Side,
    signals: &SessionSignals,
    task: impl FnOnce() -> Result<T, StreamError>,
) -> Result<T, StreamError> {
    let result = match catch_unwind(AssertUnwindSafe(task)) {
        Ok(result) => result,
        Err(panic_info) => {
            let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            tracing::error!(%side, panic = %msg, "session task PANICKED");
            Err(StreamError::TaskPanicked { side })
        }
    };

    if let Err(e) = &result {
        if !e.is_aborted() {
            tracing::warn!(%side, error = %e, "aborting session");
            signals.abort.set();
        }
    }
    result
}

/// Pick the error to report: a root cause beats an abort caused by it
fn root_cause(dac: StreamError, adc: StreamError) -> StreamError {
    if dac.is_aborted() {
        adc
    } else {
        dac
    }
}

/// Coordinates the DAC feeder and ADC drainer for one playback/capture run
#[derive(Debug, Clone, Default)]
pub struct Session {
    config: SessionConfig,
}

impl Session {
    /// Create a session coordinator
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Play `playback` through `dac` while capturing from `adc`
    ///
    /// The ADC is armed at the playback buffer's sample rate. Blocks until
    /// both tasks have finished.
    ///
    /// # Returns
    /// The captured samples plus the counters of both tasks
    pub fn run<D, A>(
        &self,
        dac: D,
        adc: A,
        playback: &SampleBuffer,
    ) -> Result<SessionOutcome, StreamError>
    where
        D: BulkEndpoint + Send,
        A: BulkEndpoint + Send,
    {
        let sample_rate = playback.sample_rate();
        if sample_rate == 0 {
            return Err(StreamError::InvalidSampleRate);
        }

        let signals = SessionSignals::new();
        let started_at = chrono::Utc::now();
        let started = Instant::now();
        tracing::info!(
            samples = playback.len(),
            sample_rate,
            "starting duplex session"
        );

        let config = &self.config;
        let signals_ref = &signals;
        let (feed, capture) = std::thread::scope(|s| {
            let adc_task = std::thread::Builder::new()
                .name("adc-drainer".into())
                .spawn_scoped(s, move || {
                    supervise(Side::Adc, signals_ref, || {
                        AdcDrainer::new(adc, sample_rate, config).run(signals_ref)
                    })
                });
            let adc_task = match adc_task {
                Ok(handle) => handle,
                Err(e) => {
                    tracing::error!(error = %e, "failed to spawn ADC task");
                    return (
                        Err(StreamError::Aborted { side: Side::Dac }),
                        Err(StreamError::SpawnFailed { side: Side::Adc }),
                    );
                }
            };

            let dac_task = std::thread::Builder::new()
                .name("dac-feeder".into())
                .spawn_scoped(s, move || {
                    supervise(Side::Dac, signals_ref, || {
                        DacFeeder::new(dac, playback, config).run(signals_ref)
                    })
                });
            let feed = match dac_task {
                Ok(handle) => handle
                    .join()
                    .unwrap_or(Err(StreamError::TaskPanicked { side: Side::Dac })),
                Err(e) => {
                    tracing::error!(error = %e, "failed to spawn DAC task");
                    signals_ref.abort.set();
                    Err(StreamError::SpawnFailed { side: Side::Dac })
                }
            };
            let capture = adc_task
                .join()
                .unwrap_or(Err(StreamError::TaskPanicked { side: Side::Adc }));
            (feed, capture)
        });

        let elapsed = started.elapsed();
        match (feed, capture) {
            (Ok(feed), Ok((capture, capture_report))) => {
                tracing::info!(
                    sent = feed.bytes_sent,
                    captured = capture_report.samples_captured,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "session complete"
                );
                Ok(SessionOutcome {
                    capture,
                    feed,
                    capture_report,
                    started_at,
                    elapsed,
                })
            }
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
            (Err(dac), Err(adc)) => Err(root_cause(dac, adc)),
        }
    }

    /// Play `playback` through `dac` with no capture side
    ///
    /// `adc_ready` starts out set, so the feeder begins immediately.
    pub fn run_playback<D: BulkEndpoint>(
        &self,
        dac: D,
        playback: &SampleBuffer,
    ) -> Result<FeedReport, StreamError> {
        if playback.sample_rate() == 0 {
            return Err(StreamError::InvalidSampleRate);
        }
        let signals = SessionSignals {
            adc_ready: Signal::preset("adc_ready"),
            ..SessionSignals::new()
        };
        DacFeeder::new(dac, playback, &self.config).run(&signals)
    }

    /// Capture at least `max_samples` from `adc` with no playback side
    ///
    /// Nothing sets `dac_finished`, so the sample limit ends the capture.
    pub fn run_capture<A: BulkEndpoint>(
        &self,
        adc: A,
        sample_rate: u32,
        max_samples: usize,
    ) -> Result<(SampleBuffer, CaptureReport), StreamError> {
        if sample_rate == 0 {
            return Err(StreamError::InvalidSampleRate);
        }
        let signals = SessionSignals::new();
        AdcDrainer::new(adc, sample_rate, &self.config)
            .with_limit(max_samples)
            .run(&signals)
    }
}
