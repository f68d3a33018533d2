//! usbloop Core - Duplex USB streaming, WAV I/O, and drift analysis
//!
//! This library drives two USB bulk peripherals at once: a DAC that plays a
//! waveform fed packet by packet from the host, and an ADC that captures the
//! looped-back waveform. Capture is armed before playback starts and stops
//! exactly when playback finishes.

pub mod analysis;
pub mod sim;
pub mod stream;
pub mod wav;

pub use stream::{
    buffer::SampleBuffer,
    endpoint::{BulkEndpoint, TransferError},
    error::StreamError,
    session::{Session, SessionConfig},
    signal::Signal,
};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Date this library was built (UTC, `YYYY-MM-DD`)
pub const BUILD_DATE: &str = env!("BUILD_DATE");
