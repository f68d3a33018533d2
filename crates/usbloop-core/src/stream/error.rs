//! Session errors

use super::endpoint::TransferError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which peripheral a task talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Playback peripheral
    Dac,
    /// Capture peripheral
    Adc,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Dac => f.write_str("DAC"),
            Side::Adc => f.write_str("ADC"),
        }
    }
}

/// Errors that end a streaming session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("{side} transport failed: {source}")]
    Transport {
        side: Side,
        #[source]
        source: TransferError,
    },

    #[error("ADC did not acknowledge the sample rate within {timeout_ms} ms")]
    ArmTimeout { timeout_ms: u64 },

    #[error("{side} task aborted after a fault on the other side")]
    Aborted { side: Side },

    #[error("{side} task panicked")]
    TaskPanicked { side: Side },

    #[error("failed to start {side} task")]
    SpawnFailed { side: Side },

    #[error("sample rate must be non-zero")]
    InvalidSampleRate,
}

impl StreamError {
    /// Wrap a non-timeout transfer error for `side`
    pub fn transport(side: Side, source: TransferError) -> Self {
        StreamError::Transport { side, source }
    }

    /// Whether this error only reflects the other task's failure
    pub fn is_aborted(&self) -> bool {
        matches!(self, StreamError::Aborted { .. })
    }
}
