//! Pluggable event sinks.

use std::sync::{Arc, Mutex};

use tracing::Level;

use crate::events::{EventKind, SimulationEvent};

/// Trait for event consumers.
///
/// # Implementations
/// - [`VecSink`] — Collects events in memory
/// - [`SharedVecSink`] — Collects events behind a shared handle
/// - [`TracingSink`] — Forwards events to `tracing`
pub trait EventSink: Send {
    /// Process a single event.
    fn handle(&mut self, event: &SimulationEvent);

    /// Called when the run ends.
    fn finalize(&mut self) {}

    /// Returns a human-readable name for this sink.
    fn name(&self) -> &str;
}

/// Collects events in a `Vec`.
#[derive(Default)]
pub struct VecSink {
    pub events: Vec<SimulationEvent>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for VecSink {
    fn handle(&mut self, event: &SimulationEvent) {
        self.events.push(event.clone());
    }

    fn name(&self) -> &str {
        "vec_sink"
    }
}

/// Collects events into a vector the caller keeps a handle to, so the
/// events can be read after the sink is boxed into a bus.
#[derive(Clone, Default)]
pub struct SharedVecSink {
    events: Arc<Mutex<Vec<SimulationEvent>>>,
}

impl SharedVecSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event received so far.
    pub fn snapshot(&self) -> Vec<SimulationEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for SharedVecSink {
    fn handle(&mut self, event: &SimulationEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }

    fn name(&self) -> &str {
        "shared_vec_sink"
    }
}

/// Forwards events to `tracing`.
///
/// Convergence checks log at `DEBUG`, failed solves and clamping at
/// `WARN`, everything else at `INFO`. Events more verbose than
/// `max_level` are skipped.
pub struct TracingSink {
    max_level: Level,
}

impl TracingSink {
    pub fn new(max_level: Level) -> Self {
        Self { max_level }
    }

    fn level_of(event: &SimulationEvent) -> Level {
        if event.is_warning() {
            Level::WARN
        } else if matches!(event.kind, EventKind::ConvergenceCheck { .. }) {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}

impl EventSink for TracingSink {
    fn handle(&mut self, event: &SimulationEvent) {
        let level = Self::level_of(event);
        if level > self.max_level {
            return;
        }
        let label = event.label();
        if level == Level::WARN {
            tracing::warn!(timestep = event.timestep, event = ?event.kind, "{}", label);
        } else if level == Level::DEBUG {
            tracing::debug!(timestep = event.timestep, event = ?event.kind, "{}", label);
        } else {
            tracing::info!(timestep = event.timestep, event = ?event.kind, "{}", label);
        }
    }

    fn name(&self) -> &str {
        "tracing_sink"
    }
}
