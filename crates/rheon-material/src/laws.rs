//! Reference constitutive laws.
//!
//! | Law | Quantity |
//! |---|---|
//! | [`CreepLaw`] | viscosity from strain rate, pressure, temperature |
//! | [`DruckerPrager`] | pressure-dependent yield stress |
//! | [`MeltingLaw`] | melt fraction between solidus and liquidus |
//! | [`DensityLaw`] | thermal expansion and compressibility |

use serde::{Deserialize, Serialize};
use rheon_types::constants::GAS_CONSTANT;
use rheon_types::{RheonError, RheonResult};

/// Smallest strain rate fed to non-Newtonian creep (1/s).
pub const MIN_STRAIN_RATE: f64 = 1.0e-20;

/// Viscous creep law.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CreepLaw {
    /// Newtonian, temperature-independent.
    Constant { viscosity: f64 },
    /// Power-law creep `ε̇ = A τⁿ exp(−(E + P V) / (R T))`.
    ///
    /// Effective viscosity
    /// `η = ½ A^(−1/n) ε̇^((1−n)/n) exp((E + P V) / (n R T))`.
    Arrhenius {
        /// Pre-exponential factor `A` (Pa⁻ⁿ s⁻¹).
        prefactor: f64,
        /// Stress exponent `n`.
        stress_exponent: f64,
        /// Activation energy `E` (J/mol).
        activation_energy: f64,
        /// Activation volume `V` (m³/mol).
        activation_volume: f64,
    },
}

impl CreepLaw {
    /// Effective viscosity (Pa·s).
    pub fn viscosity(&self, strain_rate_ii: f64, pressure: f64, temperature: f64) -> f64 {
        match *self {
            CreepLaw::Constant { viscosity } => viscosity,
            CreepLaw::Arrhenius {
                prefactor,
                stress_exponent: n,
                activation_energy,
                activation_volume,
            } => {
                let e = strain_rate_ii.max(MIN_STRAIN_RATE);
                let t = temperature.max(1.0);
                let enthalpy = activation_energy + pressure.max(0.0) * activation_volume;
                0.5 * prefactor.powf(-1.0 / n)
                    * e.powf((1.0 - n) / n)
                    * (enthalpy / (n * GAS_CONSTANT * t)).exp()
            }
        }
    }

    pub fn validate(&self) -> RheonResult<()> {
        match *self {
            CreepLaw::Constant { viscosity } => {
                if !(viscosity > 0.0 && viscosity.is_finite()) {
                    return Err(RheonError::InvalidMaterial(format!(
                        "viscosity must be positive, got {}",
                        viscosity
                    )));
                }
            }
            CreepLaw::Arrhenius {
                prefactor,
                stress_exponent,
                activation_energy,
                activation_volume,
            } => {
                if prefactor <= 0.0 || stress_exponent < 1.0 {
                    return Err(RheonError::InvalidMaterial(format!(
                        "power-law creep needs A > 0 and n >= 1, got A = {}, n = {}",
                        prefactor, stress_exponent
                    )));
                }
                if activation_energy < 0.0 || activation_volume < 0.0 {
                    return Err(RheonError::InvalidMaterial(
                        "activation energy and volume must be non-negative".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Drucker–Prager yield criterion `τ_y = C cos φ + P sin φ`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DruckerPrager {
    /// Cohesion `C` (Pa).
    pub cohesion: f64,
    /// Friction angle `φ` (degrees).
    pub friction_angle: f64,
}

impl DruckerPrager {
    /// Yield stress at `pressure` (Pa), never negative.
    pub fn yield_stress(&self, pressure: f64) -> f64 {
        let phi = self.friction_angle.to_radians();
        (self.cohesion * phi.cos() + pressure * phi.sin()).max(0.0)
    }

    pub fn validate(&self) -> RheonResult<()> {
        if self.cohesion < 0.0 || !(0.0..90.0).contains(&self.friction_angle) {
            return Err(RheonError::InvalidMaterial(format!(
                "Drucker-Prager needs C >= 0 and 0 <= phi < 90, got C = {}, phi = {}",
                self.cohesion, self.friction_angle
            )));
        }
        Ok(())
    }
}

/// Linear melting between solidus and liquidus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeltingLaw {
    /// Solidus temperature (K).
    pub solidus: f64,
    /// Liquidus temperature (K).
    pub liquidus: f64,
    /// Latent heat (J/kg).
    pub latent_heat: f64,
}

impl MeltingLaw {
    /// Melt fraction and its temperature derivative at `temperature`.
    pub fn melt_fraction(&self, temperature: f64) -> (f64, f64) {
        let span = self.liquidus - self.solidus;
        if temperature <= self.solidus {
            (0.0, 0.0)
        } else if temperature >= self.liquidus {
            (1.0, 0.0)
        } else {
            ((temperature - self.solidus) / span, 1.0 / span)
        }
    }

    pub fn validate(&self) -> RheonResult<()> {
        if !(self.liquidus > self.solidus) || self.latent_heat < 0.0 {
            return Err(RheonError::InvalidMaterial(format!(
                "melting needs liquidus > solidus and L >= 0, got [{}, {}], L = {}",
                self.solidus, self.liquidus, self.latent_heat
            )));
        }
        Ok(())
    }
}

/// Linearized equation of state `ρ = ρ₀ (1 − α (T − T₀) + β P)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensityLaw {
    /// Reference density `ρ₀` (kg/m³).
    pub reference: f64,
    /// Thermal expansivity `α` (1/K).
    pub expansivity: f64,
    /// Compressibility `β` (1/Pa).
    pub compressibility: f64,
    /// Reference temperature `T₀` (K).
    pub reference_temperature: f64,
}

impl DensityLaw {
    /// Incompressible, temperature-independent density.
    pub fn constant(reference: f64) -> Self {
        Self {
            reference,
            expansivity: 0.0,
            compressibility: 0.0,
            reference_temperature: 273.0,
        }
    }

    pub fn density(&self, pressure: f64, temperature: f64) -> f64 {
        self.reference
            * (1.0 - self.expansivity * (temperature - self.reference_temperature)
                + self.compressibility * pressure)
    }

    pub fn validate(&self) -> RheonResult<()> {
        if !(self.reference >= 0.0) || self.expansivity < 0.0 || self.compressibility < 0.0 {
            return Err(RheonError::InvalidMaterial(format!(
                "density law needs non-negative coefficients, got rho0 = {}",
                self.reference
            )));
        }
        Ok(())
    }
}
