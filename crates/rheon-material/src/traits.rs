//! Rheology provider trait — the material-law abstraction.
//!
//! The solver never evaluates constitutive laws itself. It asks a
//! provider for the response of one phase at one point, then mixes the
//! per-phase responses by volume fraction.

use rheon_types::PhaseId;

/// Local state at one grid point, as seen by a material law.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointState {
    /// Second invariant of the deviatoric strain rate (1/s).
    pub strain_rate_ii: f64,
    /// Second invariant of the committed deviatoric stress (Pa).
    pub stress_ii_old: f64,
    /// Pressure (Pa).
    pub pressure: f64,
    /// Temperature (K).
    pub temperature: f64,
    /// Physical time step (s). Infinite for steady problems.
    pub dt: f64,
}

impl Default for PointState {
    fn default() -> Self {
        Self {
            strain_rate_ii: 0.0,
            stress_ii_old: 0.0,
            pressure: 0.0,
            temperature: 273.0,
            dt: f64::INFINITY,
        }
    }
}

/// Response of one phase at one point.
///
/// `shear_modulus` and `yield_stress` are infinite for phases without
/// elasticity or plasticity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialResponse {
    /// Viscous (creep) viscosity (Pa·s).
    pub viscosity: f64,
    /// Yield stress (Pa).
    pub yield_stress: f64,
    /// Elastic shear modulus (Pa).
    pub shear_modulus: f64,
    /// Density (kg/m³).
    pub density: f64,
    /// Thermal conductivity (W/(m·K)).
    pub conductivity: f64,
    /// Specific heat capacity (J/(kg·K)).
    pub heat_capacity: f64,
    /// Volumetric radiogenic heat production (W/m³).
    pub radiogenic_heat: f64,
    /// Thermal expansivity (1/K).
    pub expansivity: f64,
    /// Melt fraction in [0, 1].
    pub melt_fraction: f64,
    /// Temperature derivative of the melt fraction (1/K).
    pub melt_fraction_dt: f64,
    /// Latent heat of melting (J/kg).
    pub latent_heat: f64,
}

/// Trait for rheology providers (material behaviour per phase).
///
/// # Implementations
/// - [`PhaseTable`](crate::table::PhaseTable) — Table of per-phase laws
pub trait RheologyProvider: Send + Sync {
    /// Number of phases this provider knows.
    fn nphases(&self) -> usize;

    /// Evaluates `phase` at `state`.
    fn evaluate(&self, phase: PhaseId, state: &PointState) -> MaterialResponse;

    /// Returns the name of this provider.
    fn name(&self) -> &str;
}
