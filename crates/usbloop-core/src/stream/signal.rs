//! One-shot cross-thread signals
//!
//! A [`Signal`] starts unset, is set at most once by its owning task and is
//! then observed as set forever by any number of observers. It is built on a
//! zero-capacity crossbeam channel whose only sender is dropped by
//! [`Signal::set`]: every blocked or future `recv` on the receiver returns
//! immediately with a disconnection, which makes waiting a real block rather
//! than a spin.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Mutex;
use std::time::Duration;

/// Set-once, never-cleared event observable from many threads
#[derive(Debug)]
pub struct Signal {
    name: &'static str,
    /// Dropped on `set()`; `None` afterwards
    trigger: Mutex<Option<Sender<()>>>,
    observer: Receiver<()>,
}

impl Signal {
    /// Create an unset signal
    ///
    /// # Arguments
    /// * `name` - Label used in log output
    pub fn new(name: &'static str) -> Self {
        let (trigger, observer) = crossbeam_channel::bounded(0);
        Self {
            name,
            trigger: Mutex::new(Some(trigger)),
            observer,
        }
    }

    /// Create a signal that is already set
    pub fn preset(name: &'static str) -> Self {
        let signal = Self::new(name);
        signal.set();
        signal
    }

    /// Signal label
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Set the signal, waking every waiter. Setting twice is a no-op.
    pub fn set(&self) {
        let mut trigger = self.trigger.lock().unwrap_or_else(|e| e.into_inner());
        if trigger.take().is_some() {
            tracing::debug!(signal = self.name, "signal set");
        }
    }

    /// Whether the signal has been set
    pub fn is_set(&self) -> bool {
        matches!(self.observer.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Block until the signal is set
    pub fn wait(&self) {
        // Nothing is ever sent; recv only returns once the sender is gone.
        let _ = self.observer.recv();
    }

    /// Block until the signal is set or `timeout` elapses
    ///
    /// # Returns
    /// `true` if the signal is set
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        matches!(
            self.observer.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }

    /// Block until either signal is set
    ///
    /// # Returns
    /// The signal that was observed set first (`first` wins ties)
    pub fn wait_either<'a>(first: &'a Signal, second: &'a Signal) -> &'a Signal {
        crossbeam_channel::select! {
            recv(first.observer) -> _ => {},
            recv(second.observer) -> _ => {},
        }
        if first.is_set() {
            first
        } else {
            second
        }
    }
}

/// The signals shared by the two tasks of a session
///
/// Owned by the session coordinator and lent to each task by reference.
#[derive(Debug)]
pub struct SessionSignals {
    /// Set by the ADC drainer once the capture timer has started
    pub adc_ready: Signal,
    /// Set by the DAC feeder after the peripheral reported completion
    pub dac_finished: Signal,
    /// Set by whichever task hits a fatal fault, releasing the other one
    pub abort: Signal,
}

impl SessionSignals {
    /// Fresh, all-unset signals for a duplex session
    pub fn new() -> Self {
        Self {
            adc_ready: Signal::new("adc_ready"),
            dac_finished: Signal::new("dac_finished"),
            abort: Signal::new("abort"),
        }
    }
}

impl Default for SessionSignals {
    fn default() -> Self {
        Self::new()
    }
}
