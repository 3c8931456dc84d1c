//! Solver configuration.
//!
//! Parameters that control the pseudo-transient iterations: tolerances,
//! iteration budget, check cadence, viscosity cutoffs and the numerical
//! relaxation constants. A config is immutable for one solve call.

use serde::{Deserialize, Serialize};
use rheon_types::constants::{
    DEFAULT_CHECK_INTERVAL, DEFAULT_MAX_ITERATIONS, DEFAULT_STOKES_R, DEFAULT_STOKES_RE, GRAVITY,
};
use rheon_types::{RheonError, RheonResult};

/// Residual norm used by the convergence monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormKind {
    /// Root-mean-square over owned points.
    L2,
    /// Largest absolute value.
    Max,
}

/// Phase-mixing rule for viscosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Averaging {
    Arithmetic,
    Harmonic,
    Geometric,
}

/// Effective viscosity bounds (Pa·s), applied after phase mixing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViscosityCutoffs {
    pub min: f64,
    pub max: f64,
}

impl Default for ViscosityCutoffs {
    fn default() -> Self {
        Self {
            min: 1.0e-30,
            max: 1.0e30,
        }
    }
}

/// Numerical constants of the accelerated pseudo-transient scheme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PtParams {
    /// Courant fraction of `min(dx)`. `None` selects `0.9 / sqrt(ndim)`.
    #[serde(default)]
    pub cfl: Option<f64>,
    /// Numerical Reynolds number of the Stokes relaxation.
    pub reynolds: f64,
    /// Pseudo bulk-to-shear modulus ratio.
    pub r: f64,
}

impl Default for PtParams {
    fn default() -> Self {
        Self {
            cfl: None,
            reynolds: DEFAULT_STOKES_RE,
            r: DEFAULT_STOKES_R,
        }
    }
}

impl PtParams {
    /// Courant fraction for a grid with `ndim` active axes.
    pub fn cfl_for(&self, ndim: usize) -> f64 {
        self.cfl.unwrap_or(0.9 / (ndim as f64).sqrt())
    }
}

/// Configuration shared by the Stokes and thermal iterations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Absolute residual tolerance.
    pub abs_tol: f64,

    /// Relative tolerance, against each residual's norm at the first check.
    pub rel_tol: f64,

    /// Maximum pseudo-transient iterations per solve.
    pub max_iterations: u32,

    /// Iterations between global convergence checks.
    pub check_interval: u32,

    /// Norm used by the convergence monitor.
    pub norm: NormKind,

    /// Viscosity bounds.
    pub cutoffs: ViscosityCutoffs,

    /// Phase-mixing rule for viscosity.
    pub averaging: Averaging,

    /// Pseudo-transient constants.
    pub pt: PtParams,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            abs_tol: 1e-8,
            rel_tol: 1e-6,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            check_interval: DEFAULT_CHECK_INTERVAL,
            norm: NormKind::L2,
            cutoffs: ViscosityCutoffs::default(),
            averaging: Averaging::Harmonic,
            pt: PtParams::default(),
        }
    }
}

impl SolverConfig {
    /// Creates a config for debugging (few iterations, loose tolerance).
    pub fn debug() -> Self {
        Self {
            abs_tol: 1e-4,
            rel_tol: 1e-3,
            max_iterations: 2_000,
            check_interval: 50,
            ..Default::default()
        }
    }

    /// Creates a high-quality config (tight tolerance, max norm).
    pub fn high_quality() -> Self {
        Self {
            abs_tol: 1e-12,
            rel_tol: 1e-10,
            max_iterations: 500_000,
            norm: NormKind::Max,
            ..Default::default()
        }
    }

    /// Checks ranges of every parameter.
    pub fn validate(&self) -> RheonResult<()> {
        let fail = |msg: String| Err(RheonError::InvalidConfig(msg));
        if self.abs_tol < 0.0 || self.rel_tol < 0.0 || self.abs_tol.is_nan() || self.rel_tol.is_nan() {
            return fail(format!(
                "tolerances must be non-negative, got abs = {}, rel = {}",
                self.abs_tol, self.rel_tol
            ));
        }
        if self.max_iterations == 0 || self.check_interval == 0 {
            return fail("max_iterations and check_interval must be positive".into());
        }
        if !(self.cutoffs.min > 0.0 && self.cutoffs.min <= self.cutoffs.max) {
            return fail(format!(
                "viscosity cutoffs must satisfy 0 < min <= max, got [{}, {}]",
                self.cutoffs.min, self.cutoffs.max
            ));
        }
        if let Some(cfl) = self.pt.cfl {
            if !(cfl > 0.0 && cfl < 1.0) {
                return fail(format!("cfl must lie in (0, 1), got {}", cfl));
            }
        }
        if !(self.pt.reynolds > 0.0) || !(self.pt.r > 0.0) {
            return fail("reynolds and r must be positive".into());
        }
        Ok(())
    }
}

/// Configuration of the Stokes iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StokesConfig {
    pub solver: SolverConfig,

    /// Gravity vector (m/s²).
    pub gravity: [f64; 3],

    /// Physical bulk modulus (Pa). `None` means incompressible.
    #[serde(default)]
    pub bulk_modulus: Option<f64>,

    /// Re-evaluate viscosity inside the iteration (strain-rate or
    /// stress dependent rheology).
    pub nonlinear: bool,

    /// Iterations between viscosity updates when `nonlinear`.
    pub viscosity_update_interval: u32,

    /// Log-space blend of new and previous viscosity, in (0, 1].
    pub viscosity_relaxation: f64,
}

impl Default for StokesConfig {
    fn default() -> Self {
        Self {
            solver: SolverConfig::default(),
            gravity: [0.0, -GRAVITY, 0.0],
            bulk_modulus: None,
            nonlinear: false,
            viscosity_update_interval: 1,
            viscosity_relaxation: 1.0,
        }
    }
}

impl StokesConfig {
    pub fn validate(&self) -> RheonResult<()> {
        self.solver.validate()?;
        if let Some(k) = self.bulk_modulus {
            if !(k > 0.0) {
                return Err(RheonError::InvalidConfig(format!(
                    "bulk modulus must be positive, got {}",
                    k
                )));
            }
        }
        if self.viscosity_update_interval == 0 {
            return Err(RheonError::InvalidConfig(
                "viscosity_update_interval must be positive".into(),
            ));
        }
        if !(self.viscosity_relaxation > 0.0 && self.viscosity_relaxation <= 1.0) {
            return Err(RheonError::InvalidConfig(format!(
                "viscosity_relaxation must lie in (0, 1], got {}",
                self.viscosity_relaxation
            )));
        }
        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err(RheonError::InvalidConfig("gravity must be finite".into()));
        }
        Ok(())
    }
}

/// Configuration of the thermal iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermalConfig {
    pub solver: SolverConfig,

    /// Gravity vector (m/s²), for adiabatic heating.
    pub gravity: [f64; 3],

    /// Fraction of deviatoric work converted to heat (0 disables).
    pub shear_heating: f64,

    /// Include adiabatic heating `α T ρ (g·V)`.
    pub adiabatic_heating: bool,

    /// Include latent heat through an effective heat capacity.
    pub latent_heat: bool,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            solver: SolverConfig {
                rel_tol: 1e-8,
                ..SolverConfig::default()
            },
            gravity: [0.0, -GRAVITY, 0.0],
            shear_heating: 0.0,
            adiabatic_heating: false,
            latent_heat: false,
        }
    }
}

impl ThermalConfig {
    pub fn validate(&self) -> RheonResult<()> {
        self.solver.validate()?;
        if !(0.0..=1.0).contains(&self.shear_heating) {
            return Err(RheonError::InvalidConfig(format!(
                "shear_heating efficiency must lie in [0, 1], got {}",
                self.shear_heating
            )));
        }
        Ok(())
    }
}
