//! Simulated peripherals
//!
//! Stand-ins for the DAC and ADC firmware so sessions can run without
//! hardware:
//! - [`firmware`]: behavioural DAC/ADC models joined by a ring buffer that
//!   plays the part of the analog loop
//! - [`scripted`]: an endpoint that replays a fixed list of read outcomes
//!   and records every write, for protocol-level tests

pub mod firmware;
pub mod scripted;

pub use firmware::{loopback, EventLog, SimAdc, SimDac, SimEvent};
pub use scripted::{Script, ScriptedEndpoint};
