//! Scripted bulk endpoint

use crate::stream::endpoint::{BulkEndpoint, TransferError};
use std::collections::VecDeque;
use std::time::Duration;

/// One scripted read outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Return these bytes (split across reads if longer than requested)
    Bytes(Vec<u8>),
    /// Wait out the read timeout, then time out
    Timeout,
    /// Fail with a transport fault
    Fault(String),
}

impl Script {
    /// Shorthand for [`Script::Bytes`]
    pub fn bytes(bytes: &[u8]) -> Self {
        Script::Bytes(bytes.to_vec())
    }
}

/// Endpoint that replays scripted reads and records writes
///
/// Once the script runs out every read times out.
#[derive(Debug, Default)]
pub struct ScriptedEndpoint {
    reads: VecDeque<Script>,
    writes: Vec<Vec<u8>>,
}

impl ScriptedEndpoint {
    /// Create an endpoint with the given read script
    pub fn new(script: impl IntoIterator<Item = Script>) -> Self {
        Self {
            reads: script.into_iter().collect(),
            writes: Vec::new(),
        }
    }

    /// Append a read outcome to the script
    pub fn push(&mut self, script: Script) {
        self.reads.push_back(script);
    }

    /// Every write so far, in order
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// Scripted reads not yet consumed
    pub fn remaining(&self) -> usize {
        self.reads.len()
    }
}

impl BulkEndpoint for ScriptedEndpoint {
    fn read(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransferError> {
        match self.reads.pop_front() {
            Some(Script::Bytes(mut bytes)) => {
                if bytes.len() > max_len {
                    let rest = bytes.split_off(max_len);
                    self.reads.push_front(Script::Bytes(rest));
                }
                Ok(bytes)
            }
            Some(Script::Fault(reason)) => Err(TransferError::Fault(reason)),
            Some(Script::Timeout) | None => {
                std::thread::sleep(timeout);
                Err(TransferError::Timeout)
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransferError> {
        self.writes.push(data.to_vec());
        Ok(())
    }
}
