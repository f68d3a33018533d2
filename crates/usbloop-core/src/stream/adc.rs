//! ADC drain task
//!
//! Arms the ADC peripheral, releases the DAC feeder, and accumulates every
//! capture read until the feeder reports that playback has finished.
//!
//! ```text
//! DrainStale -> SendRate -> AwaitArmAck -> Armed -> CaptureLoop
//!     -> Stop -> Flush -> DrainTail -> Done
//! ```

use super::buffer::{CaptureChunks, SampleBuffer};
use super::endpoint::{BulkEndpoint, TransferError};
use super::error::{Side, StreamError};
use super::protocol::{encode_sample_rate, ControlByte, PACKET_SIZE};
use super::session::SessionConfig;
use super::signal::SessionSignals;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// ADC drainer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    /// Discarding residue from a previous session
    DrainStale,
    /// Writing the sample-rate word
    SendRate,
    /// Waiting (long timeout) for the capture timer acknowledgement
    AwaitArmAck,
    /// Acknowledged; `adc_ready` is being set
    Armed,
    /// Reading samples until `dac_finished`
    CaptureLoop,
    /// Writing the stop marker
    Stop,
    /// Concatenating chunks into the capture buffer
    Flush,
    /// Discarding anything emitted after the stop marker
    DrainTail,
    /// Capture handed off
    Done,
}

/// Counters from one capture run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureReport {
    /// Samples in the capture buffer
    pub samples_captured: usize,
    /// Non-empty reads accumulated
    pub chunks: usize,
    /// Raw bytes received during capture
    pub bytes_received: usize,
    /// Residue discarded before arming
    pub stale_bytes_discarded: usize,
    /// Bytes discarded after the stop marker
    pub tail_bytes_discarded: usize,
    /// First byte of the arm acknowledgement
    pub arm_ack: Option<u8>,
}

/// Captures samples from the ADC peripheral
pub struct AdcDrainer<E> {
    endpoint: E,
    sample_rate: u32,
    poll_timeout: Duration,
    arm_timeout: Duration,
    read_size: usize,
    stale_reads: usize,
    max_samples: Option<usize>,
    state: DrainState,
}

impl<E: BulkEndpoint> AdcDrainer<E> {
    /// Create a drainer that arms the ADC at `sample_rate`
    pub fn new(endpoint: E, sample_rate: u32, config: &SessionConfig) -> Self {
        Self {
            endpoint,
            sample_rate,
            poll_timeout: config.poll_timeout(),
            arm_timeout: config.arm_timeout(),
            read_size: config.capture_read_size.max(2),
            stale_reads: config.stale_reads,
            max_samples: None,
            state: DrainState::DrainStale,
        }
    }

    /// Also stop capturing once `max_samples` have been accumulated
    ///
    /// Used when no DAC feeder will ever set `dac_finished`. The last read
    /// is kept whole, so the capture may run slightly past the limit.
    pub fn with_limit(mut self, max_samples: usize) -> Self {
        self.max_samples = Some(max_samples);
        self
    }

    /// Current state
    pub fn state(&self) -> DrainState {
        self.state
    }

    fn enter(&mut self, state: DrainState) {
        tracing::trace!(from = ?self.state, to = ?state, "adc state");
        self.state = state;
    }

    fn fault(&self, err: TransferError) -> StreamError {
        tracing::error!(state = ?self.state, error = %err, "ADC transport fault");
        StreamError::transport(Side::Adc, err)
    }

    fn limit_reached(&self, chunks: &CaptureChunks) -> bool {
        self.max_samples
            .is_some_and(|max| chunks.sample_count() >= max)
    }

    /// Run the capture to completion
    ///
    /// # Returns
    /// The captured samples (at the drainer's sample rate) and counters
    pub fn run(
        mut self,
        signals: &SessionSignals,
    ) -> Result<(SampleBuffer, CaptureReport), StreamError> {
        let mut report = CaptureReport::default();

        for _ in 0..self.stale_reads {
            match self.endpoint.read(self.read_size, self.poll_timeout) {
                Ok(bytes) => report.stale_bytes_discarded += bytes.len(),
                Err(TransferError::Timeout) => break,
                Err(e) => return Err(self.fault(e)),
            }
        }
        if report.stale_bytes_discarded > 0 {
            tracing::info!(
                bytes = report.stale_bytes_discarded,
                "ADC discarded stale data"
            );
        }

        self.enter(DrainState::SendRate);
        self.endpoint
            .write(&encode_sample_rate(self.sample_rate))
            .map_err(|e| self.fault(e))?;

        self.enter(DrainState::AwaitArmAck);
        let ack = match self.endpoint.read(PACKET_SIZE, self.arm_timeout) {
            Ok(bytes) => bytes,
            Err(TransferError::Timeout) => {
                tracing::error!(
                    timeout_ms = self.arm_timeout.as_millis() as u64,
                    "ADC never armed"
                );
                return Err(StreamError::ArmTimeout {
                    timeout_ms: self.arm_timeout.as_millis() as u64,
                });
            }
            Err(e) => return Err(self.fault(e)),
        };
        report.arm_ack = ack.first().copied();
        if !report
            .arm_ack
            .and_then(ControlByte::from_byte)
            .is_some_and(ControlByte::is_ready)
        {
            tracing::debug!(ack = ?report.arm_ack, "ADC acknowledged with an unexpected byte");
        }

        self.enter(DrainState::Armed);
        tracing::info!(sample_rate = self.sample_rate, "ADC ready");
        signals.adc_ready.set();

        self.enter(DrainState::CaptureLoop);
        let mut chunks = CaptureChunks::new();
        while !signals.dac_finished.is_set()
            && !signals.abort.is_set()
            && !self.limit_reached(&chunks)
        {
            match self.endpoint.read(self.read_size, self.poll_timeout) {
                Ok(bytes) => {
                    chunks.push_bytes(&bytes);
                }
                Err(TransferError::Timeout) => {
                    tracing::trace!(samples = chunks.sample_count(), "ADC capture poll timed out")
                }
                Err(e) => return Err(self.fault(e)),
            }
        }

        self.enter(DrainState::Stop);
        self.endpoint
            .write(&[ControlByte::Stop.as_byte()])
            .map_err(|e| self.fault(e))?;

        self.enter(DrainState::Flush);
        report.chunks = chunks.chunk_count();
        report.bytes_received = chunks.byte_count();
        let capture = chunks.into_buffer(self.sample_rate);
        report.samples_captured = capture.len();
        tracing::info!(
            samples = report.samples_captured,
            bytes = report.bytes_received,
            chunks = report.chunks,
            "ADC recording completed"
        );

        self.enter(DrainState::DrainTail);
        loop {
            match self.endpoint.read(self.read_size, self.poll_timeout) {
                Ok(bytes) => report.tail_bytes_discarded += bytes.len(),
                Err(TransferError::Timeout) => break,
                Err(e) => return Err(self.fault(e)),
            }
        }
        self.enter(DrainState::Done);

        if signals.abort.is_set() && !signals.dac_finished.is_set() {
            return Err(StreamError::Aborted { side: Side::Adc });
        }

        Ok((capture, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Script, ScriptedEndpoint};

    fn fast_config() -> SessionConfig {
        SessionConfig {
            poll_timeout_ms: 1,
            arm_timeout_ms: 20,
            settle_ms: 0,
            ..SessionConfig::default()
        }
    }

    fn be_bytes(range: std::ops::Range<i16>) -> Vec<u8> {
        range.flat_map(|s| s.to_be_bytes()).collect()
    }

    #[test]
    fn test_three_chunks_in_order() {
        let mut endpoint = ScriptedEndpoint::new([
            Script::Timeout,
            Script::bytes(b"1"),
            Script::Bytes(be_bytes(0..100)),
            Script::Timeout,
            Script::Bytes(be_bytes(100..250)),
            Script::Bytes(be_bytes(250..256)),
        ]);
        let signals = SessionSignals::new();

        let (capture, report) = std::thread::scope(|s| {
            let drainer =
                s.spawn(|| AdcDrainer::new(&mut endpoint, 96000, &fast_config()).run(&signals));
            signals.adc_ready.wait();
            std::thread::sleep(Duration::from_millis(100));
            signals.dac_finished.set();
            drainer.join().unwrap().unwrap()
        });

        assert_eq!(capture.len(), (200 + 300 + 12) / 2);
        assert!(capture.samples().iter().copied().eq(0..256i16));
        assert_eq!(capture.sample_rate(), 96000);
        assert_eq!(report.chunks, 3);
        assert_eq!(report.arm_ack, Some(b'1'));

        let writes = endpoint.writes();
        assert_eq!(writes.first().unwrap(), &96000u32.to_le_bytes());
        assert_eq!(writes.last().unwrap(), &vec![b'e']);
    }

    #[test]
    fn test_discards_stale_and_tail() {
        let mut endpoint = ScriptedEndpoint::new([
            Script::Bytes(vec![9; 30]),
            Script::Bytes(vec![9; 10]),
            Script::bytes(b"1"),
        ]);
        let signals = SessionSignals::new();
        signals.dac_finished.set();
        endpoint.push(Script::Bytes(vec![5; 64]));

        let (capture, report) = AdcDrainer::new(&mut endpoint, 8000, &fast_config())
            .run(&signals)
            .unwrap();

        assert!(capture.is_empty());
        assert_eq!(report.stale_bytes_discarded, 40);
        assert_eq!(report.tail_bytes_discarded, 64);
        assert!(signals.adc_ready.is_set());
    }

    #[test]
    fn test_missing_ack_is_fatal() {
        let mut endpoint = ScriptedEndpoint::new([]);
        let signals = SessionSignals::new();

        let err = AdcDrainer::new(&mut endpoint, 8000, &fast_config())
            .run(&signals)
            .unwrap_err();

        assert_eq!(err, StreamError::ArmTimeout { timeout_ms: 20 });
        assert!(!signals.adc_ready.is_set());
        assert_eq!(endpoint.writes().len(), 1);
    }

    #[test]
    fn test_loop_runs_until_finished() {
        let mut endpoint = ScriptedEndpoint::new([Script::Timeout, Script::bytes(b"1")]);
        let signals = SessionSignals::new();

        std::thread::scope(|s| {
            let drainer =
                s.spawn(|| AdcDrainer::new(&mut endpoint, 8000, &fast_config()).run(&signals));
            signals.adc_ready.wait();
            // Nothing arrives; the loop must keep polling.
            std::thread::sleep(Duration::from_millis(50));
            assert!(!drainer.is_finished());
            signals.dac_finished.set();
            let (capture, _) = drainer.join().unwrap().unwrap();
            assert!(capture.is_empty());
        });
    }

    #[test]
    fn test_limit_ends_capture() {
        let mut endpoint = ScriptedEndpoint::new([
            Script::Timeout,
            Script::bytes(b"1"),
            Script::Bytes(be_bytes(0..50)),
            Script::Bytes(be_bytes(50..100)),
            Script::Bytes(be_bytes(100..150)),
        ]);
        let signals = SessionSignals::new();

        let (capture, report) = AdcDrainer::new(&mut endpoint, 8000, &fast_config())
            .with_limit(80)
            .run(&signals)
            .unwrap();

        assert_eq!(capture.len(), 100);
        assert_eq!(report.tail_bytes_discarded, 100);
    }

    #[test]
    fn test_abort_still_stops_adc() {
        let mut endpoint = ScriptedEndpoint::new([Script::Timeout, Script::bytes(b"1")]);
        let signals = SessionSignals::new();
        signals.abort.set();

        let err = AdcDrainer::new(&mut endpoint, 8000, &fast_config())
            .run(&signals)
            .unwrap_err();

        assert_eq!(err, StreamError::Aborted { side: Side::Adc });
        assert_eq!(endpoint.writes().last().unwrap(), &vec![b'e']);
    }
}
