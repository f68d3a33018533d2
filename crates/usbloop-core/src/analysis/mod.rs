//! Offline analysis of captured audio
//!
//! - Frequency and clock-drift estimation ([`drift`])
//! - Test tone generation ([`tone`])

pub mod drift;
pub mod tone;

pub use drift::{analyze, DriftReport};
