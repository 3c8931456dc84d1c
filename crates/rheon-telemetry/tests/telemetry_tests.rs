//! Integration tests for rheon-telemetry.

use rheon_telemetry::{
    EventBus, EventKind, EventSink, SharedVecSink, SimulationEvent, TracingSink, VecSink,
};

fn solve_end(converged: bool) -> EventKind {
    EventKind::SolveEnd {
        solver: "stokes_apt".into(),
        iterations: 1200,
        residual: 3.5e-9,
        converged,
        wall_time: 0.25,
    }
}

#[test]
fn emit_and_flush_in_order() {
    let mut bus = EventBus::new();
    let sink = SharedVecSink::new();
    bus.add_sink(Box::new(sink.clone()));

    bus.emit_kind(0, EventKind::StepBegin { time: 0.0, dt: 1.0 });
    bus.emit_kind(0, EventKind::SolveBegin { solver: "stokes_apt".into() });
    bus.emit_kind(0, solve_end(true));
    bus.emit_kind(0, EventKind::StepEnd { wall_time: 0.3 });
    assert!(sink.snapshot().is_empty());

    assert_eq!(bus.flush(), 4);
    let labels: Vec<String> = sink.snapshot().iter().map(|e| e.label().to_string()).collect();
    assert_eq!(labels, ["step_begin", "solve_begin", "solve_end", "step_end"]);
    assert_eq!(bus.flush(), 0);
    assert_eq!(bus.delivered(), 4);
}

#[test]
fn disabled_bus_drops_events() {
    let mut bus = EventBus::new();
    let sink = SharedVecSink::new();
    bus.add_sink(Box::new(sink.clone()));
    bus.set_enabled(false);
    assert!(!bus.is_enabled());
    bus.emit_kind(0, EventKind::StepBegin { time: 0.0, dt: 1.0 });
    assert_eq!(bus.flush(), 0);
    assert!(sink.snapshot().is_empty());
}

#[test]
fn every_sink_sees_every_event() {
    let mut bus = EventBus::new();
    let a = SharedVecSink::new();
    let b = SharedVecSink::new();
    bus.add_sink(Box::new(a.clone()));
    bus.add_sink(Box::new(b.clone()));
    bus.add_sink(Box::new(TracingSink::new(tracing::Level::DEBUG)));
    assert_eq!(bus.sink_count(), 3);

    bus.emit_kind(2, EventKind::ViscosityClamped { count: 7 });
    bus.finish();
    assert_eq!(a.snapshot(), b.snapshot());
    assert_eq!(a.snapshot().len(), 1);
}

#[test]
fn emitter_follows_disabled_bus() {
    let mut bus = EventBus::new();
    let sink = SharedVecSink::new();
    bus.add_sink(Box::new(sink.clone()));
    bus.set_enabled(false);
    let muted = bus.emitter();
    bus.set_enabled(true);
    let live = bus.emitter();

    muted.emit_kind(0, EventKind::ViscosityClamped { count: 1 });
    live.emit_kind(1, EventKind::ViscosityClamped { count: 2 });
    bus.flush();
    let events = sink.snapshot();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].timestep, 1);
}

#[test]
fn emitter_works_across_threads() {
    let mut bus = EventBus::new();
    let sink = SharedVecSink::new();
    bus.add_sink(Box::new(sink.clone()));

    let handles: Vec<_> = (0..4u32)
        .map(|rank| {
            let emitter = bus.emitter();
            std::thread::spawn(move || {
                emitter.emit(SimulationEvent::new(
                    0,
                    EventKind::ConvergenceCheck {
                        solver: format!("rank{rank}"),
                        iteration: 100,
                        residual: 1.0,
                    },
                ));
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    bus.flush();
    assert_eq!(sink.snapshot().len(), 4);
}

#[test]
fn warnings_are_classified() {
    assert!(SimulationEvent::new(0, solve_end(false)).is_warning());
    assert!(!SimulationEvent::new(0, solve_end(true)).is_warning());
    assert!(SimulationEvent::new(0, EventKind::ViscosityClamped { count: 1 }).is_warning());
    let custom = SimulationEvent::new(
        0,
        EventKind::Custom {
            label: "marker_reseed".into(),
            payload: "{}".into(),
        },
    );
    assert_eq!(custom.label(), "marker_reseed");
}

#[test]
fn vec_sink_collects() {
    let mut sink = VecSink::new();
    sink.handle(&SimulationEvent::new(1, EventKind::StepEnd { wall_time: 0.1 }));
    sink.finalize();
    assert_eq!(sink.events.len(), 1);
    assert_eq!(sink.name(), "vec_sink");
}

#[test]
fn event_serialization() {
    let event = SimulationEvent::new(
        5,
        EventKind::PhaseRatioCorrection {
            max_correction: 2.5e-7,
            filled_bins: 12,
        },
    );
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("\"event\":\"phase_ratio_correction\""));
    let recovered: SimulationEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(recovered, event);
}
