//! Pseudo-transient solver trait and solve reports.
//!
//! Both iterators implement [`PtSolver`], so a driver can run them
//! without knowing which equation they relax.

use serde::{Deserialize, Serialize};
use rheon_grid::FieldStore;
use rheon_types::RheonResult;

/// Residual norms at one convergence check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResidualState {
    /// Iteration at which the norms were taken.
    pub iteration: u32,
    /// Momentum residual per velocity component (zero on inactive axes).
    pub momentum: [f64; 3],
    /// Continuity (pressure) residual.
    pub continuity: f64,
    /// Energy (temperature) residual.
    pub energy: f64,
}

impl ResidualState {
    /// All norms as one array: `[mx, my, mz, continuity, energy]`.
    pub fn components(&self) -> [f64; 5] {
        [
            self.momentum[0],
            self.momentum[1],
            self.momentum[2],
            self.continuity,
            self.energy,
        ]
    }

    /// Largest of all norms.
    pub fn max(&self) -> f64 {
        self.components().iter().copied().fold(0.0, f64::max)
    }
}

/// Outcome of a solve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    /// Every residual met its tolerance.
    Converged,
    /// The iteration budget ran out first. The fields hold the last
    /// iterate with boundary conditions applied.
    NonConvergence,
}

/// Result of a solve call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveReport {
    pub status: SolveStatus,
    /// Number of iterations actually performed.
    pub iterations: u32,
    /// Norms at the last check.
    pub residual: ResidualState,
    /// Norms at every check, in order.
    pub history: Vec<ResidualState>,
    /// Checks at which the largest norm grew.
    pub increases: u32,
    /// Points clamped to the viscosity cutoffs at the last evaluation.
    pub clamped_viscosity: usize,
    /// Wall-clock time for this solve (seconds).
    pub wall_time: f64,
}

impl SolveReport {
    #[inline]
    pub fn converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}

/// Trait for pseudo-transient iterators.
///
/// ```text
/// let report = solver.solve(&mut store, dt)?;
/// if report.converged() {
///     store.commit_step(dt);
/// }
/// ```
///
/// # Implementations
///
/// - [`StokesSolver`](crate::stokes::StokesSolver) — velocity and pressure
/// - [`ThermalSolver`](crate::thermal::ThermalSolver) — temperature and heat flux
pub trait PtSolver {
    /// Relaxes the fields of `store` toward the solution for physical step `dt`.
    ///
    /// Non-convergence is reported in the returned status, never as an
    /// error. Errors are structural (grid, halo or configuration
    /// inconsistencies).
    fn solve(&mut self, store: &mut FieldStore, dt: f64) -> RheonResult<SolveReport>;

    /// Returns the solver's name.
    fn name(&self) -> &str;
}
