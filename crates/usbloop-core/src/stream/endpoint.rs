//! Bulk endpoint abstraction
//!
//! The streaming core never talks to a USB stack directly. It consumes an
//! opened, configured bidirectional bulk channel to one peripheral through
//! [`BulkEndpoint`]. Reads are always timeout-bounded; a timeout is reported
//! as [`TransferError::Timeout`] and is a normal polling outcome, while any
//! other failure is a [`TransferError::Fault`] and ends the session.

use std::time::Duration;
use thiserror::Error;

/// Errors reported by a bulk endpoint
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// No data arrived before the read timeout elapsed
    #[error("transfer timed out")]
    Timeout,

    /// Any other transport failure (device gone, pipe error, ...)
    #[error("transport fault: {0}")]
    Fault(String),
}

impl TransferError {
    /// Whether this error is the expected polling timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransferError::Timeout)
    }
}

/// An opened bidirectional bulk channel to one peripheral
///
/// Control bytes and payload share the same channel: the host writes the
/// sample-rate word, payload packets and the stop marker on the OUT side and
/// reads control bytes (DAC) or captured samples (ADC) on the IN side.
pub trait BulkEndpoint {
    /// Read at most `max_len` bytes, waiting no longer than `timeout`
    ///
    /// Returns [`TransferError::Timeout`] if nothing arrived in time.
    fn read(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransferError>;

    /// Write all of `data` to the peripheral
    fn write(&mut self, data: &[u8]) -> Result<(), TransferError>;
}

impl<T: BulkEndpoint + ?Sized> BulkEndpoint for &mut T {
    fn read(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransferError> {
        (**self).read(max_len, timeout)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransferError> {
        (**self).write(data)
    }
}

impl<T: BulkEndpoint + ?Sized> BulkEndpoint for Box<T> {
    fn read(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransferError> {
        (**self).read(max_len, timeout)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransferError> {
        (**self).write(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo {
        last: Vec<u8>,
    }

    impl BulkEndpoint for Echo {
        fn read(&mut self, max_len: usize, _timeout: Duration) -> Result<Vec<u8>, TransferError> {
            if self.last.is_empty() {
                return Err(TransferError::Timeout);
            }
            let n = max_len.min(self.last.len());
            Ok(self.last.drain(..n).collect())
        }

        fn write(&mut self, data: &[u8]) -> Result<(), TransferError> {
            self.last.extend_from_slice(data);
            Ok(())
        }
    }

    #[test]
    fn test_timeout_is_distinguishable() {
        assert!(TransferError::Timeout.is_timeout());
        assert!(!TransferError::Fault("pipe".into()).is_timeout());
    }

    fn write_then_read<E: BulkEndpoint>(mut endpoint: E) -> Vec<u8> {
        endpoint.write(b"abc").unwrap();
        endpoint.read(2, Duration::ZERO).unwrap()
    }

    #[test]
    fn test_mut_ref_forwards() {
        let mut echo = Echo { last: Vec::new() };
        assert_eq!(write_then_read(&mut echo), b"ab");
        assert_eq!(echo.last, b"c");
    }

    #[test]
    fn test_boxed_forwards() {
        let mut boxed: Box<dyn BulkEndpoint> = Box::new(Echo { last: Vec::new() });
        assert_eq!(
            boxed.read(1, Duration::ZERO).unwrap_err(),
            TransferError::Timeout
        );
        boxed.write(&[1]).unwrap();
        assert_eq!(boxed.read(8, Duration::ZERO).unwrap(), vec![1]);
    }
}
