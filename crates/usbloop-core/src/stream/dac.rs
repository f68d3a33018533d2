//! DAC feed task
//!
//! Drains the playback buffer into the DAC peripheral one packet per request.
//!
//! ```text
//! WaitAdcReady -> SendRate -> AwaitRequest <-> SendPacket
//!                                  |
//!                      (terminal packet sent)
//!                                  v
//!                            AwaitComplete -> Done
//! ```
//!
//! The peripheral asks for data by sending `'S'` whenever its local buffer
//! has room. While the buffer is full nothing arrives and every read times
//! out; that is expected and the feeder simply polls again.

use super::buffer::SampleBuffer;
use super::endpoint::{BulkEndpoint, TransferError};
use super::error::{Side, StreamError};
use super::protocol::{encode_sample_rate, ControlByte, PacketCursor, PACKET_SIZE};
use super::session::SessionConfig;
use super::signal::{Signal, SessionSignals};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// DAC feeder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    /// Blocked until the ADC has armed
    WaitAdcReady,
    /// Writing the sample-rate word
    SendRate,
    /// Polling for a request byte
    AwaitRequest,
    /// Writing the next packet
    SendPacket,
    /// Terminal packet sent, polling for the completion byte
    AwaitComplete,
    /// Completion observed and `dac_finished` set
    Done,
}

/// Counters from one feed run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedReport {
    /// Payload bytes written, padding included
    pub bytes_sent: usize,
    /// Payload writes issued
    pub packets_sent: usize,
    /// Request bytes observed
    pub requests_observed: usize,
    /// Reads whose leading byte was not the expected marker
    pub ignored_reads: usize,
    /// Whether two bytes of padding were appended
    pub padded: bool,
}

/// Feeds a playback buffer to the DAC peripheral
pub struct DacFeeder<'a, E> {
    endpoint: E,
    playback: &'a SampleBuffer,
    poll_timeout: Duration,
    settle: Duration,
    state: FeedState,
}

impl<'a, E: BulkEndpoint> DacFeeder<'a, E> {
    /// Create a feeder for `playback` over `endpoint`
    pub fn new(endpoint: E, playback: &'a SampleBuffer, config: &SessionConfig) -> Self {
        Self {
            endpoint,
            playback,
            poll_timeout: config.poll_timeout(),
            settle: config.settle(),
            state: FeedState::WaitAdcReady,
        }
    }

    /// Current state
    pub fn state(&self) -> FeedState {
        self.state
    }

    fn enter(&mut self, state: FeedState) {
        tracing::trace!(from = ?self.state, to = ?state, "dac state");
        self.state = state;
    }

    fn fault(&self, err: TransferError) -> StreamError {
        tracing::error!(state = ?self.state, error = %err, "DAC transport fault");
        StreamError::transport(Side::Dac, err)
    }

    /// Run the feed to completion
    ///
    /// Blocks until `adc_ready` is set, streams the whole buffer, waits for
    /// the completion byte, then sets `dac_finished`. Returns
    /// [`StreamError::Aborted`] if `abort` is observed first.
    pub fn run(mut self, signals: &SessionSignals) -> Result<FeedReport, StreamError> {
        let mut cursor = PacketCursor::new(self.playback.to_le_bytes());
        let mut report = FeedReport {
            padded: cursor.total_len() != self.playback.byte_len(),
            ..FeedReport::default()
        };
        tracing::info!(
            bytes = cursor.total_len(),
            padded = report.padded,
            "DAC waiting for ADC to be ready"
        );

        Signal::wait_either(&signals.adc_ready, &signals.abort);
        if !signals.adc_ready.is_set() {
            return Err(StreamError::Aborted { side: Side::Dac });
        }

        self.enter(FeedState::SendRate);
        let rate = self.playback.sample_rate();
        self.endpoint
            .write(&encode_sample_rate(rate))
            .map_err(|e| self.fault(e))?;
        tracing::info!(sample_rate = rate, "DAC sample rate sent, streaming");

        self.enter(FeedState::AwaitRequest);
        while self.state == FeedState::AwaitRequest {
            if signals.abort.is_set() {
                return Err(StreamError::Aborted { side: Side::Dac });
            }

            let bytes = match self.endpoint.read(PACKET_SIZE, self.poll_timeout) {
                Ok(bytes) => bytes,
                Err(TransferError::Timeout) => {
                    tracing::trace!("DAC request poll timed out");
                    continue;
                }
                Err(e) => return Err(self.fault(e)),
            };

            if bytes.first().copied().and_then(ControlByte::from_byte) != Some(ControlByte::Request)
            {
                report.ignored_reads += 1;
                tracing::debug!(
                    first = ?bytes.first(),
                    len = bytes.len(),
                    "DAC ignoring non-request read"
                );
                continue;
            }
            report.requests_observed += 1;

            self.enter(FeedState::SendPacket);
            let Some((packet, last)) = cursor.next_packet() else {
                break;
            };
            let sent = packet.len();
            self.endpoint.write(packet).map_err(|e| self.fault(e))?;
            report.packets_sent += 1;
            report.bytes_sent += sent;

            if last {
                tracing::info!(
                    bytes_sent = report.bytes_sent,
                    packets = report.packets_sent,
                    "DAC sent all samples"
                );
                self.enter(FeedState::AwaitComplete);
            } else {
                self.enter(FeedState::AwaitRequest);
            }
        }

        loop {
            if signals.abort.is_set() {
                return Err(StreamError::Aborted { side: Side::Dac });
            }

            match self.endpoint.read(PACKET_SIZE, self.poll_timeout) {
                Ok(bytes) if bytes.contains(&ControlByte::Complete.as_byte()) => break,
                Ok(_) => report.ignored_reads += 1,
                Err(TransferError::Timeout) => tracing::trace!("DAC completion poll timed out"),
                Err(e) => return Err(self.fault(e)),
            }
        }

        tracing::info!(settle_ms = self.settle.as_millis() as u64, "DAC timer ended");
        if signals.abort.wait_timeout(self.settle) {
            return Err(StreamError::Aborted { side: Side::Dac });
        }
        signals.dac_finished.set();
        self.enter(FeedState::Done);

        Ok(report)
    }
}
