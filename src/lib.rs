//! usbloop - Full-duplex USB bulk streaming for DAC/ADC loopback rigs
//!
//! This library re-exports the streaming core, WAV I/O and analysis from
//! `usbloop-core` and adds the persistent application configuration used by
//! the `usbloop` command line tool.

pub mod config;

pub use usbloop_core::{analysis, sim, stream, wav};

pub use usbloop_core::{
    BulkEndpoint, SampleBuffer, Session, SessionConfig, Signal, StreamError, TransferError,
    BUILD_DATE, VERSION,
};
