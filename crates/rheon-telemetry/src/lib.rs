//! # rheon-telemetry
//!
//! Event bus for simulation telemetry. Drivers emit structured events
//! (physical steps, solves, convergence checks, clamping, phase-ratio
//! corrections) that pluggable sinks consume.
//!
//! ## Key Types
//!
//! - [`SimulationEvent`] / [`EventKind`] — Serializable event records
//! - [`EventBus`] — Channel-backed dispatch to sinks
//! - [`EventSink`] — Consumer trait ([`VecSink`], [`SharedVecSink`], [`TracingSink`])

pub mod bus;
pub mod events;
pub mod sinks;

pub use bus::{EventBus, EventEmitter};
pub use events::{EventKind, SimulationEvent};
pub use sinks::{EventSink, SharedVecSink, TracingSink, VecSink};
