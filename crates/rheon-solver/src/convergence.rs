//! Global residual norms and the stop/continue decision.
//!
//! Norms are always reduced across every rank before they are compared
//! with a tolerance, so all ranks take the same decision.

use rheon_backend::{ExecutionContext, ReduceOp};
use rheon_grid::{Field, IndexRange};
use rheon_types::RheonResult;

use crate::config::{NormKind, SolverConfig};
use crate::strategy::ResidualState;

/// Global norm of `field` over `range` (owned points of this rank).
///
/// L2 is the root-mean-square: the sum of squares and the point count
/// are reduced separately. An empty global range has norm zero.
pub fn residual_norm(
    ctx: &ExecutionContext,
    field: &Field,
    range: &IndexRange,
    kind: NormKind,
) -> RheonResult<f64> {
    match kind {
        NormKind::Max => ctx.reduce_global(range, ReduceOp::Max, |p| field.at(p).abs()),
        NormKind::L2 => {
            let sum = ctx.reduce_global(range, ReduceOp::Sum, |p| {
                let v = field.at(p);
                v * v
            })?;
            let count = ctx.comm.reduce(range.len() as f64, ReduceOp::Sum)?;
            Ok(if count > 0.0 { (sum / count).sqrt() } else { 0.0 })
        }
    }
}

/// Verdict of one convergence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Converged,
    Continue,
}

/// Tracks residual history over one solve call.
#[derive(Debug, Clone)]
pub struct ConvergenceMonitor {
    abs_tol: f64,
    rel_tol: f64,
    reference: Option<ResidualState>,
    history: Vec<ResidualState>,
    increases: u32,
}

impl ConvergenceMonitor {
    pub fn new(config: &SolverConfig) -> Self {
        Self {
            abs_tol: config.abs_tol,
            rel_tol: config.rel_tol,
            reference: None,
            history: Vec::new(),
            increases: 0,
        }
    }

    /// Records `state` and decides whether every norm meets
    /// `max(abs_tol, rel_tol * reference)`.
    ///
    /// The first recorded state becomes the reference scale.
    pub fn check(&mut self, state: ResidualState) -> Decision {
        let reference = *self.reference.get_or_insert(state);

        if let Some(prev) = self.history.last() {
            if state.max() > prev.max() {
                self.increases += 1;
            }
        }
        self.history.push(state);

        let converged = state
            .components()
            .iter()
            .zip(reference.components())
            .all(|(&norm, scale)| norm.is_finite() && norm <= self.abs_tol.max(self.rel_tol * scale));

        if converged {
            Decision::Converged
        } else {
            Decision::Continue
        }
    }

    /// Every recorded state, in check order.
    pub fn history(&self) -> &[ResidualState] {
        &self.history
    }

    /// Latest recorded state (zeros before the first check).
    pub fn last(&self) -> ResidualState {
        self.history.last().copied().unwrap_or_default()
    }

    /// Number of checks whose largest norm exceeded the previous one.
    pub fn increases(&self) -> u32 {
        self.increases
    }

    /// Consumes the monitor, returning the history.
    pub fn into_history(self) -> Vec<ResidualState> {
        self.history
    }
}
