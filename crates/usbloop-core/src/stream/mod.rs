//! Duplex streaming module
//!
//! This module contains the host side of the DAC/ADC streaming protocol:
//! - Bulk endpoint abstraction ([`endpoint`])
//! - One-shot cross-thread signals ([`signal`])
//! - Wire constants, control bytes and packetization ([`protocol`])
//! - PCM sample buffers and capture accumulation ([`buffer`])
//! - DAC feed task ([`dac`]) and ADC drain task ([`adc`])
//! - Session coordination ([`session`]) and reporting ([`report`])

pub mod adc;
pub mod buffer;
pub mod dac;
pub mod endpoint;
pub mod error;
pub mod protocol;
pub mod report;
pub mod session;
pub mod signal;
