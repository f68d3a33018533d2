//! Behavioural DAC and ADC firmware models
//!
//! [`loopback`] returns a DAC and an ADC whose only connection is a heap
//! ring of samples: whatever the DAC "plays" becomes available to the ADC.
//! The models follow the firmware side of the protocol closely enough to
//! exercise every state of the host tasks:
//!
//! - the DAC wants the rate word first, then answers every full packet with
//!   `'S'` and the terminal short packet with `'E'`
//! - the ADC wants the rate word, answers `'1'`, streams big-endian samples
//!   until it receives `'e'`, then optionally emits a few tail bytes

use crate::stream::endpoint::{BulkEndpoint, TransferError};
use crate::stream::protocol::{decode_sample_rate, ControlByte, PACKET_SIZE};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Granularity of the ADC model's wait for samples
const ADC_POLL_STEP: Duration = Duration::from_millis(1);

/// Observable firmware events, in the order they happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    /// ADC received its sample rate
    AdcRateReceived(u32),
    /// ADC acknowledgement handed to the host
    AdcAcked,
    /// DAC received its sample rate
    DacRateReceived(u32),
    /// DAC accepted a payload packet of this many bytes
    DacPacket(usize),
    /// DAC reported completion
    DacCompleted,
    /// ADC received the stop marker
    AdcStopped,
}

/// Shared, append-only event log
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<SimEvent>>>,
}

impl EventLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, event: SimEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }

    /// Snapshot of every event so far
    pub fn events(&self) -> Vec<SimEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Position of the first event matching `pred`
    pub fn position(&self, pred: impl Fn(&SimEvent) -> bool) -> Option<usize> {
        self.events().iter().position(pred)
    }
}

/// Build a DAC/ADC pair joined by a loop holding up to `capacity` samples
pub fn loopback(capacity: usize) -> (SimDac, SimAdc) {
    let (producer, consumer) = HeapRb::<i16>::new(capacity.max(1)).split();
    let events = EventLog::new();
    let dac = SimDac {
        link: producer,
        overruns: Arc::new(AtomicU64::new(0)),
        rate: None,
        outbox: VecDeque::new(),
        request_delay: Duration::ZERO,
        finished: false,
        events: events.clone(),
    };
    let adc = SimAdc {
        link: consumer,
        rate: None,
        ack_pending: false,
        stopped: false,
        stale: Vec::new(),
        tail: Vec::new(),
        events,
    };
    (dac, adc)
}

fn wait_out(timeout: Duration) -> TransferError {
    std::thread::sleep(timeout);
    TransferError::Timeout
}

/// Simulated DAC peripheral
pub struct SimDac {
    link: HeapProd<i16>,
    overruns: Arc<AtomicU64>,
    rate: Option<u32>,
    /// Control bytes for the host and when each becomes visible
    outbox: VecDeque<(Instant, u8)>,
    request_delay: Duration,
    finished: bool,
    events: EventLog,
}

impl SimDac {
    /// Delay every request after the first, as if the local buffer were full
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Event log shared with the paired ADC
    pub fn events(&self) -> EventLog {
        self.events.clone()
    }

    /// Counter of samples dropped because the loop was full
    pub fn overruns(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.overruns)
    }

    /// Sample rate received from the host, if any
    pub fn sample_rate(&self) -> Option<u32> {
        self.rate
    }

    fn queue(&mut self, byte: ControlByte, delay: Duration) {
        self.outbox.push_back((Instant::now() + delay, byte.as_byte()));
    }

    fn play(&mut self, payload: &[u8]) {
        let samples: Vec<i16> = payload
            .chunks_exact(2)
            .map(|p| i16::from_le_bytes([p[0], p[1]]))
            .collect();
        let pushed = self.link.push_slice(&samples);
        if pushed < samples.len() {
            let dropped = (samples.len() - pushed) as u64;
            self.overruns.fetch_add(dropped, Ordering::Relaxed);
            tracing::warn!(dropped, "simulated loop overrun");
        }
    }
}

impl BulkEndpoint for SimDac {
    fn read(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransferError> {
        let deadline = Instant::now() + timeout;
        let Some(&(ready_at, byte)) = self.outbox.front() else {
            return Err(wait_out(timeout));
        };
        if ready_at > deadline || max_len == 0 {
            return Err(wait_out(timeout));
        }
        std::thread::sleep(ready_at.saturating_duration_since(Instant::now()));
        self.outbox.pop_front();
        Ok(vec![byte])
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransferError> {
        let Some(rate) = self.rate else {
            let rate = decode_sample_rate(data)
                .ok_or_else(|| TransferError::Fault("DAC expected a sample-rate word".into()))?;
            self.rate = Some(rate);
            self.events.record(SimEvent::DacRateReceived(rate));
            self.queue(ControlByte::Request, Duration::ZERO);
            return Ok(());
        };

        if self.finished {
            return Err(TransferError::Fault("DAC stream already complete".into()));
        }
        if data.len() > PACKET_SIZE {
            return Err(TransferError::Fault(format!(
                "DAC packet of {} bytes exceeds {} at {} Hz",
                data.len(),
                PACKET_SIZE,
                rate
            )));
        }

        self.play(data);
        self.events.record(SimEvent::DacPacket(data.len()));
        if data.len() < PACKET_SIZE {
            self.finished = true;
            self.events.record(SimEvent::DacCompleted);
            self.queue(ControlByte::Complete, Duration::ZERO);
        } else {
            self.queue(ControlByte::Request, self.request_delay);
        }
        Ok(())
    }
}

/// Simulated ADC peripheral
pub struct SimAdc {
    link: HeapCons<i16>,
    rate: Option<u32>,
    ack_pending: bool,
    stopped: bool,
    stale: Vec<u8>,
    tail: Vec<u8>,
    events: EventLog,
}

impl SimAdc {
    /// Leave residue from an earlier session in the output queue
    pub fn with_stale(mut self, bytes: Vec<u8>) -> Self {
        self.stale = bytes;
        self
    }

    /// Emit these bytes after the stop marker
    pub fn with_tail(mut self, bytes: Vec<u8>) -> Self {
        self.tail = bytes;
        self
    }

    /// Event log shared with the paired DAC
    pub fn events(&self) -> EventLog {
        self.events.clone()
    }

    /// Whether the stop marker has been received
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn take_front(buf: &mut Vec<u8>, max_len: usize) -> Vec<u8> {
        let n = max_len.min(buf.len());
        buf.drain(..n).collect()
    }
}

impl BulkEndpoint for SimAdc {
    fn read(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransferError> {
        if self.rate.is_none() {
            if self.stale.is_empty() {
                return Err(wait_out(timeout));
            }
            return Ok(Self::take_front(&mut self.stale, max_len));
        }

        if self.ack_pending {
            self.ack_pending = false;
            self.events.record(SimEvent::AdcAcked);
            return Ok(vec![ControlByte::ReadyAlt.as_byte()]);
        }

        if self.stopped {
            if self.tail.is_empty() {
                return Err(wait_out(timeout));
            }
            return Ok(Self::take_front(&mut self.tail, max_len));
        }

        let deadline = Instant::now() + timeout;
        while self.link.occupied_len() == 0 {
            let now = Instant::now();
            if now >= deadline {
                return Err(TransferError::Timeout);
            }
            std::thread::sleep(ADC_POLL_STEP.min(deadline - now));
        }

        let mut samples = vec![0i16; (max_len / 2).min(self.link.occupied_len())];
        let n = self.link.pop_slice(&mut samples);
        samples.truncate(n);
        Ok(samples.iter().flat_map(|s| s.to_be_bytes()).collect())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransferError> {
        if self.rate.is_none() {
            let rate = decode_sample_rate(data)
                .ok_or_else(|| TransferError::Fault("ADC expected a sample-rate word".into()))?;
            self.rate = Some(rate);
            self.ack_pending = true;
            self.events.record(SimEvent::AdcRateReceived(rate));
            return Ok(());
        }

        if data == [ControlByte::Stop.as_byte()] {
            self.stopped = true;
            self.events.record(SimEvent::AdcStopped);
            return Ok(());
        }

        Err(TransferError::Fault(format!(
            "ADC got unexpected {} byte write",
            data.len()
        )))
    }
}
