//! Physical properties of one material phase.
//!
//! Each field maps onto one output of the rheology provider:
//!
//! | Property | Response field |
//! |---|---|
//! | `creep` | `viscosity` |
//! | `plasticity` | `yield_stress` |
//! | `shear_modulus` | `shear_modulus` |
//! | `density` | `density`, `expansivity` |
//! | `conductivity`, `heat_capacity` | `conductivity`, `heat_capacity` |
//! | `radiogenic_heat` | `radiogenic_heat` |
//! | `melting` | `melt_fraction`, `melt_fraction_dt`, `latent_heat` |

use serde::{Deserialize, Serialize};
use rheon_types::{RheonError, RheonResult};

use crate::laws::{CreepLaw, DensityLaw, DruckerPrager, MeltingLaw};
use crate::traits::{MaterialResponse, PointState};

/// Physical properties of a material phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseProperties {
    /// Human-readable name (e.g., "upper_mantle").
    pub name: String,

    /// Equation of state.
    pub density: DensityLaw,

    /// Viscous creep law.
    pub creep: CreepLaw,

    /// Plastic yield criterion. `None` means the phase never yields.
    #[serde(default)]
    pub plasticity: Option<DruckerPrager>,

    /// Elastic shear modulus (Pa). `None` means purely viscous.
    #[serde(default)]
    pub shear_modulus: Option<f64>,

    /// Thermal conductivity (W/(m·K)).
    pub conductivity: f64,

    /// Specific heat capacity (J/(kg·K)).
    pub heat_capacity: f64,

    /// Volumetric radiogenic heat production (W/m³).
    #[serde(default)]
    pub radiogenic_heat: f64,

    /// Melting behaviour. `None` means the phase never melts.
    #[serde(default)]
    pub melting: Option<MeltingLaw>,
}

impl PhaseProperties {
    /// An isoviscous, incompressible phase with unit thermal properties.
    pub fn newtonian(name: &str, viscosity: f64, density: f64) -> Self {
        Self {
            name: name.to_string(),
            density: DensityLaw::constant(density),
            creep: CreepLaw::Constant { viscosity },
            plasticity: None,
            shear_modulus: None,
            conductivity: 1.0,
            heat_capacity: 1.0,
            radiogenic_heat: 0.0,
            melting: None,
        }
    }

    /// Evaluates every law of this phase at `state`.
    pub fn response(&self, state: &PointState) -> MaterialResponse {
        let (melt_fraction, melt_fraction_dt) = self
            .melting
            .map(|m| m.melt_fraction(state.temperature))
            .unwrap_or((0.0, 0.0));
        MaterialResponse {
            viscosity: self
                .creep
                .viscosity(state.strain_rate_ii, state.pressure, state.temperature),
            yield_stress: self
                .plasticity
                .map(|p| p.yield_stress(state.pressure))
                .unwrap_or(f64::INFINITY),
            shear_modulus: self.shear_modulus.unwrap_or(f64::INFINITY),
            density: self.density.density(state.pressure, state.temperature),
            conductivity: self.conductivity,
            heat_capacity: self.heat_capacity,
            radiogenic_heat: self.radiogenic_heat,
            expansivity: self.density.expansivity,
            melt_fraction,
            melt_fraction_dt,
            latent_heat: self.melting.map(|m| m.latent_heat).unwrap_or(0.0),
        }
    }

    /// Validates every parameter of this phase.
    pub fn validate(&self) -> RheonResult<()> {
        let fail = |what: &str| {
            Err(RheonError::InvalidMaterial(format!("{}: {}", self.name, what)))
        };
        self.density.validate()?;
        self.creep.validate()?;
        if let Some(p) = &self.plasticity {
            p.validate()?;
        }
        if let Some(m) = &self.melting {
            m.validate()?;
        }
        if let Some(g) = self.shear_modulus {
            if !(g > 0.0) {
                return fail("shear modulus must be positive");
            }
        }
        if !(self.conductivity > 0.0) || !(self.heat_capacity > 0.0) {
            return fail("conductivity and heat capacity must be positive");
        }
        if self.radiogenic_heat < 0.0 {
            return fail("radiogenic heat must be non-negative");
        }
        Ok(())
    }
}
