//! Event bus: producer-side emit, consumer-side flush into sinks.
//!
//! Events travel over a `std::sync::mpsc` channel. Producers on other
//! threads get their own [`EventEmitter`]; sinks only run when the
//! owner of the bus calls [`EventBus::flush`].

use std::sync::mpsc;

use crate::events::{EventKind, SimulationEvent};
use crate::sinks::EventSink;

/// Cloneable producer handle for a bus.
///
/// Inherits the bus's enabled flag at creation.
#[derive(Clone)]
pub struct EventEmitter {
    sender: mpsc::Sender<SimulationEvent>,
    enabled: bool,
}

impl EventEmitter {
    /// Sends an event. Dropped silently once the bus is gone.
    pub fn emit(&self, event: SimulationEvent) {
        if self.enabled {
            let _ = self.sender.send(event);
        }
    }

    pub fn emit_kind(&self, timestep: u32, kind: EventKind) {
        self.emit(SimulationEvent::new(timestep, kind));
    }
}

/// Event bus for simulation telemetry.
pub struct EventBus {
    sender: mpsc::Sender<SimulationEvent>,
    receiver: mpsc::Receiver<SimulationEvent>,
    sinks: Vec<Box<dyn EventSink>>,
    /// Disabled bus drops events at the producer.
    enabled: bool,
    delivered: usize,
}

impl EventBus {
    /// Creates a new event bus with no sinks.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            sinks: Vec::new(),
            enabled: true,
            delivered: 0,
        }
    }

    /// Registers a sink to receive events.
    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// A producer handle for another thread.
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            sender: self.sender.clone(),
            enabled: self.enabled,
        }
    }

    /// Emits an event. No-op when the bus is disabled.
    pub fn emit(&self, event: SimulationEvent) {
        if self.enabled {
            let _ = self.sender.send(event);
        }
    }

    /// Shorthand for `emit(SimulationEvent::new(timestep, kind))`.
    pub fn emit_kind(&self, timestep: u32, kind: EventKind) {
        self.emit(SimulationEvent::new(timestep, kind));
    }

    /// Delivers every pending event to every sink, in emission order.
    ///
    /// Returns the number of events delivered by this call.
    pub fn flush(&mut self) -> usize {
        let mut count = 0;
        while let Ok(event) = self.receiver.try_recv() {
            for sink in &mut self.sinks {
                sink.handle(&event);
            }
            count += 1;
        }
        self.delivered += count;
        count
    }

    /// Flushes, then lets every sink finalize.
    pub fn finish(&mut self) {
        self.flush();
        for sink in &mut self.sinks {
            sink.finalize();
        }
    }

    /// Total events delivered since creation.
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
