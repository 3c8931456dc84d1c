//! Simulation event types.
//!
//! Structured events emitted by a driver around each physical step and
//! each pseudo-transient solve. Events are plain values that carry just
//! enough data to follow a run or reconstruct its convergence history.

use serde::{Deserialize, Serialize};

/// A simulation event, tagged with the physical step it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationEvent {
    /// Physical step number (0-indexed).
    pub timestep: u32,
    /// Event payload.
    pub kind: EventKind,
}

/// Event payload variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    /// Physical step started.
    StepBegin {
        /// Physical time at the start of the step (s).
        time: f64,
        /// Physical step length (s). Infinite for steady problems.
        dt: f64,
    },

    /// Physical step committed.
    StepEnd {
        /// Wall-clock time for the whole step (s).
        wall_time: f64,
    },

    /// A pseudo-transient solve started.
    SolveBegin {
        /// Solver name (e.g. "stokes_apt").
        solver: String,
    },

    /// A global convergence check was taken.
    ConvergenceCheck {
        solver: String,
        /// Pseudo-transient iteration of the check.
        iteration: u32,
        /// Largest residual norm.
        residual: f64,
    },

    /// A pseudo-transient solve returned.
    SolveEnd {
        solver: String,
        iterations: u32,
        /// Largest residual norm at the last check.
        residual: f64,
        converged: bool,
        /// Wall-clock time of the solve (s).
        wall_time: f64,
    },

    /// Effective viscosities were clamped to the cutoffs.
    ViscosityClamped {
        /// Number of clamped points in the last evaluation.
        count: u64,
    },

    /// Phase ratios were rebuilt from markers.
    PhaseRatioCorrection {
        /// Largest deviation of a ratio sum from one before rescaling.
        max_correction: f64,
        /// Empty bins filled from a neighbour.
        filled_bins: u64,
    },

    /// Custom event for extensibility.
    Custom {
        /// Arbitrary label.
        label: String,
        /// JSON-encoded payload.
        payload: String,
    },
}

impl SimulationEvent {
    /// Creates a new event for the given physical step.
    pub fn new(timestep: u32, kind: EventKind) -> Self {
        Self { timestep, kind }
    }

    /// Returns true for events that signal a problem with the run.
    pub fn is_warning(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SolveEnd {
                converged: false,
                ..
            } | EventKind::ViscosityClamped { .. }
        )
    }

    /// Short, stable name of the event kind.
    pub fn label(&self) -> &str {
        match &self.kind {
            EventKind::StepBegin { .. } => "step_begin",
            EventKind::StepEnd { .. } => "step_end",
            EventKind::SolveBegin { .. } => "solve_begin",
            EventKind::ConvergenceCheck { .. } => "convergence_check",
            EventKind::SolveEnd { .. } => "solve_end",
            EventKind::ViscosityClamped { .. } => "viscosity_clamped",
            EventKind::PhaseRatioCorrection { .. } => "phase_ratio_correction",
            EventKind::Custom { label, .. } => label.as_str(),
        }
    }
}
