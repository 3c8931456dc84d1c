//! # rheon-solver
//!
//! Accelerated pseudo-transient solvers for multi-phase Stokes flow and
//! heat diffusion on staggered grids.
//!
//! ## Key Types
//!
//! - [`StokesSolver`] — Velocity/pressure relaxation with visco-elasto-plastic rheology
//! - [`ThermalSolver`] — Temperature/heat-flux relaxation with heat sources
//! - [`PtSolver`] — Common solver trait returning a [`SolveReport`]
//! - [`RheologyEngine`] — Phase mixing, cutoffs, thermal coefficients
//! - [`PhaseRatioInterpolator`] — Markers to per-cell/per-vertex phase fractions
//! - [`BoundaryApplicator`] — Velocity, temperature and scalar ghost conditions
//! - [`ConvergenceMonitor`] — Globally reduced residual norms
//! - [`SolverConfig`] — Tolerances, budgets, cutoffs, PT constants

pub mod boundary;
pub mod config;
pub mod convergence;
pub mod phase_ratio;
pub mod pt_coefficients;
pub mod rheology;
pub mod stokes;
pub mod strategy;
pub mod thermal;

pub use boundary::{
    BoundaryApplicator, TemperatureBoundary, TemperatureSide, VelocityBoundary, VelocitySide,
};
pub use config::{Averaging, NormKind, PtParams, SolverConfig, StokesConfig, ThermalConfig, ViscosityCutoffs};
pub use convergence::{residual_norm, ConvergenceMonitor, Decision};
pub use phase_ratio::{Marker, PhaseRatioInterpolator, PhaseRatioReport};
pub use pt_coefficients::{StokesPseudoSteps, ThermalPseudoSteps};
pub use rheology::{RheologyEngine, StokesCoefficients, ThermalCoefficients};
pub use stokes::StokesSolver;
pub use strategy::{PtSolver, ResidualState, SolveReport, SolveStatus};
pub use thermal::ThermalSolver;
