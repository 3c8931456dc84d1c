//! # rheon-bench
//!
//! Benchmark suite for the Rheon solvers.
//!
//! Provides 5 procedural scenarios with known qualitative answers, a
//! runner that drives them over physical steps while emitting
//! telemetry, and CSV/JSON export for regression tracking.

pub mod metrics;
pub mod runner;
pub mod scenarios;

pub use metrics::BenchmarkMetrics;
pub use runner::BenchmarkRunner;
pub use scenarios::{seed_markers, Scenario, ScenarioKind, StokesSetup, ThermalSetup};
