//! Physical constants and solver defaults.

/// Gravitational acceleration at the Earth's surface (m/s²).
pub const GRAVITY: f64 = 9.81;

/// Universal gas constant (J/(mol·K)).
pub const GAS_CONSTANT: f64 = 8.314;

/// Default ghost-layer width on every active axis.
pub const GHOST_WIDTH: usize = 1;

/// Default maximum number of pseudo-transient iterations per solve.
pub const DEFAULT_MAX_ITERATIONS: u32 = 50_000;

/// Default convergence-check cadence (iterations between global norms).
pub const DEFAULT_CHECK_INTERVAL: u32 = 100;

/// Default numerical Reynolds number of the Stokes relaxation (3π).
pub const DEFAULT_STOKES_RE: f64 = 3.0 * std::f64::consts::PI;

/// Default pseudo bulk-to-shear modulus ratio of the Stokes relaxation.
pub const DEFAULT_STOKES_R: f64 = 0.7;

/// Tolerance on the sum of phase ratios at a grid location.
pub const PHASE_RATIO_EPSILON: f64 = 1.0e-10;

/// Renormalization magnitude above which a phase-ratio correction is logged.
pub const PHASE_RATIO_WARN_THRESHOLD: f64 = 1.0e-6;
