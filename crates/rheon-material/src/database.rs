//! Material database with geodynamic phase presets.
//!
//! Creep parameters are laboratory flow laws converted to SI units
//! (Pa⁻ⁿ s⁻¹); thermal parameters are typical lithospheric values.

use std::collections::HashMap;

use crate::laws::{CreepLaw, DensityLaw, DruckerPrager, MeltingLaw};
use crate::properties::PhaseProperties;

/// A named collection of phase presets.
///
/// Materials are looked up by name (e.g., "upper_mantle", "sticky_air").
/// Custom materials can be registered at runtime.
#[derive(Debug, Clone)]
pub struct MaterialDatabase {
    materials: HashMap<String, PhaseProperties>,
}

impl MaterialDatabase {
    /// Creates a new database with the 6 built-in presets.
    pub fn with_defaults() -> Self {
        let mut db = Self::empty();

        db.register(upper_mantle());
        db.register(continental_crust());
        db.register(oceanic_lithosphere());
        db.register(weak_inclusion());
        db.register(sticky_air());
        db.register(magma());

        db
    }

    /// Creates an empty database.
    pub fn empty() -> Self {
        Self {
            materials: HashMap::new(),
        }
    }

    /// Registers a material. Overwrites if the name already exists.
    pub fn register(&mut self, props: PhaseProperties) {
        self.materials.insert(props.name.clone(), props);
    }

    /// Looks up a material by name. Returns `None` if not found.
    pub fn get(&self, name: &str) -> Option<&PhaseProperties> {
        self.materials.get(name)
    }

    /// Returns all registered material names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.materials.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered materials.
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Returns true if the database is empty.
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

impl Default for MaterialDatabase {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ─── Built-in Presets ─────────────────────────────────────────────────

/// Dry olivine dislocation creep with frictional plasticity.
fn upper_mantle() -> PhaseProperties {
    PhaseProperties {
        name: "upper_mantle".into(),
        density: DensityLaw {
            reference: 3300.0,
            expansivity: 3.0e-5,
            compressibility: 0.0,
            reference_temperature: 273.0,
        },
        creep: CreepLaw::Arrhenius {
            prefactor: 1.1e-16,
            stress_exponent: 3.5,
            activation_energy: 530.0e3,
            activation_volume: 1.3e-5,
        },
        plasticity: Some(DruckerPrager {
            cohesion: 20.0e6,
            friction_angle: 30.0,
        }),
        shear_modulus: Some(7.0e10),
        conductivity: 3.0,
        heat_capacity: 1250.0,
        radiogenic_heat: 2.0e-8,
        melting: Some(MeltingLaw {
            solidus: 1373.0,
            liquidus: 2073.0,
            latent_heat: 4.0e5,
        }),
    }
}

/// Wet quartzite creep, radiogenic, melts at crustal temperatures.
fn continental_crust() -> PhaseProperties {
    PhaseProperties {
        name: "continental_crust".into(),
        density: DensityLaw {
            reference: 2700.0,
            expansivity: 3.0e-5,
            compressibility: 0.0,
            reference_temperature: 273.0,
        },
        creep: CreepLaw::Arrhenius {
            prefactor: 5.0e-18,
            stress_exponent: 2.3,
            activation_energy: 154.0e3,
            activation_volume: 0.0,
        },
        plasticity: Some(DruckerPrager {
            cohesion: 20.0e6,
            friction_angle: 30.0,
        }),
        shear_modulus: Some(3.0e10),
        conductivity: 2.5,
        heat_capacity: 1000.0,
        radiogenic_heat: 1.0e-6,
        melting: Some(MeltingLaw {
            solidus: 973.0,
            liquidus: 1473.0,
            latent_heat: 3.0e5,
        }),
    }
}

/// Stiff, brittle oceanic plate.
fn oceanic_lithosphere() -> PhaseProperties {
    PhaseProperties {
        name: "oceanic_lithosphere".into(),
        density: DensityLaw {
            reference: 3300.0,
            expansivity: 3.0e-5,
            compressibility: 0.0,
            reference_temperature: 273.0,
        },
        creep: CreepLaw::Constant { viscosity: 1.0e23 },
        plasticity: Some(DruckerPrager {
            cohesion: 10.0e6,
            friction_angle: 20.0,
        }),
        shear_modulus: Some(5.0e10),
        conductivity: 3.0,
        heat_capacity: 1250.0,
        radiogenic_heat: 0.0,
        melting: None,
    }
}

/// Low-viscosity seed used to localize deformation.
fn weak_inclusion() -> PhaseProperties {
    PhaseProperties {
        name: "weak_inclusion".into(),
        density: DensityLaw::constant(3200.0),
        creep: CreepLaw::Constant { viscosity: 1.0e19 },
        plasticity: None,
        shear_modulus: Some(5.0e10),
        conductivity: 3.0,
        heat_capacity: 1250.0,
        radiogenic_heat: 0.0,
        melting: None,
    }
}

/// Low-density, low-viscosity layer approximating a free surface.
fn sticky_air() -> PhaseProperties {
    PhaseProperties {
        name: "sticky_air".into(),
        density: DensityLaw::constant(1.0),
        creep: CreepLaw::Constant { viscosity: 1.0e19 },
        plasticity: None,
        shear_modulus: None,
        conductivity: 3.0,
        heat_capacity: 1000.0,
        radiogenic_heat: 0.0,
        melting: None,
    }
}

/// Partially molten mush with a narrow melting interval.
fn magma() -> PhaseProperties {
    PhaseProperties {
        name: "magma".into(),
        density: DensityLaw {
            reference: 2800.0,
            expansivity: 5.0e-5,
            compressibility: 0.0,
            reference_temperature: 273.0,
        },
        creep: CreepLaw::Constant { viscosity: 1.0e16 },
        plasticity: None,
        shear_modulus: None,
        conductivity: 1.5,
        heat_capacity: 1200.0,
        radiogenic_heat: 0.0,
        melting: Some(MeltingLaw {
            solidus: 1100.0,
            liquidus: 1400.0,
            latent_heat: 4.0e5,
        }),
    }
}
