//! Integration tests for rheon-material.

use rheon_material::{
    CreepLaw, DensityLaw, DruckerPrager, MaterialDatabase, MeltingLaw, PhaseProperties,
    PhaseTable, PointState, RheologyProvider,
};
use rheon_types::{PhaseId, RheonError};

// ─── Law Tests ────────────────────────────────────────────────

#[test]
fn constant_creep_ignores_state() {
    let law = CreepLaw::Constant { viscosity: 1e21 };
    assert_eq!(law.viscosity(1e-15, 1e9, 1600.0), 1e21);
    assert_eq!(law.viscosity(0.0, 0.0, 300.0), 1e21);
}

#[test]
fn linear_arrhenius_reduces_to_inverse_prefactor() {
    let law = CreepLaw::Arrhenius {
        prefactor: 1e-20,
        stress_exponent: 1.0,
        activation_energy: 0.0,
        activation_volume: 0.0,
    };
    let eta = law.viscosity(1e-14, 0.0, 1000.0);
    assert!((eta / 5e19 - 1.0).abs() < 1e-12);
}

#[test]
fn power_law_viscosity_reproduces_flow_law() {
    let a = 1e-16;
    let n = 3.5;
    let law = CreepLaw::Arrhenius {
        prefactor: a,
        stress_exponent: n,
        activation_energy: 0.0,
        activation_volume: 0.0,
    };
    let e = 1e-15;
    let tau = 2.0 * law.viscosity(e, 0.0, 1500.0) * e;
    let e_back = a * tau.powf(n);
    assert!((e_back / e - 1.0).abs() < 1e-10);
}

#[test]
fn arrhenius_weakens_with_temperature() {
    let law = CreepLaw::Arrhenius {
        prefactor: 1.1e-16,
        stress_exponent: 3.5,
        activation_energy: 530e3,
        activation_volume: 0.0,
    };
    assert!(law.viscosity(1e-15, 0.0, 1600.0) < law.viscosity(1e-15, 0.0, 1200.0));
    // Zero strain rate is floored, not infinite.
    assert!(law.viscosity(0.0, 0.0, 1600.0).is_finite());
}

#[test]
fn drucker_prager_yield_stress() {
    let dp = DruckerPrager {
        cohesion: 10e6,
        friction_angle: 30.0,
    };
    let expected = 10e6 * 30f64.to_radians().cos() + 100e6 * 0.5;
    assert!((dp.yield_stress(100e6) - expected).abs() < 1e-3);
    assert_eq!(dp.yield_stress(-1e12), 0.0);
}

#[test]
fn linear_melting() {
    let m = MeltingLaw {
        solidus: 1000.0,
        liquidus: 1200.0,
        latent_heat: 4e5,
    };
    assert_eq!(m.melt_fraction(900.0), (0.0, 0.0));
    assert_eq!(m.melt_fraction(1100.0), (0.5, 1.0 / 200.0));
    assert_eq!(m.melt_fraction(1300.0), (1.0, 0.0));
}

#[test]
fn density_law_expands_with_temperature() {
    let d = DensityLaw {
        reference: 3300.0,
        expansivity: 3e-5,
        compressibility: 0.0,
        reference_temperature: 273.0,
    };
    assert_eq!(d.density(0.0, 273.0), 3300.0);
    assert!(d.density(0.0, 1273.0) < 3300.0);
}

#[test]
fn invalid_laws_are_rejected() {
    assert!(CreepLaw::Constant { viscosity: -1.0 }.validate().is_err());
    assert!(CreepLaw::Arrhenius {
        prefactor: 1.0,
        stress_exponent: 0.5,
        activation_energy: 0.0,
        activation_volume: 0.0,
    }
    .validate()
    .is_err());
    let m = MeltingLaw {
        solidus: 1200.0,
        liquidus: 1000.0,
        latent_heat: 0.0,
    };
    assert!(matches!(m.validate(), Err(RheonError::InvalidMaterial(_))));
}

// ─── PhaseProperties Tests ────────────────────────────────────

#[test]
fn newtonian_response() {
    let p = PhaseProperties::newtonian("matrix", 1.0, 2.0);
    let r = p.response(&PointState::default());
    assert_eq!(r.viscosity, 1.0);
    assert_eq!(r.density, 2.0);
    assert_eq!(r.yield_stress, f64::INFINITY);
    assert_eq!(r.shear_modulus, f64::INFINITY);
    assert_eq!(r.melt_fraction, 0.0);
    assert!(p.validate().is_ok());
}

#[test]
fn properties_validate_thermal_parameters() {
    let mut p = PhaseProperties::newtonian("bad", 1.0, 1.0);
    p.conductivity = 0.0;
    assert!(p.validate().is_err());
    let mut p = PhaseProperties::newtonian("bad", 1.0, 1.0);
    p.shear_modulus = Some(-3.0);
    assert!(p.validate().is_err());
}

#[test]
fn properties_from_toml() {
    let text = r#"
        name = "slab"
        conductivity = 3.0
        heat_capacity = 1250.0
        shear_modulus = 5e10

        [density]
        reference = 3300.0
        expansivity = 3e-5
        compressibility = 0.0
        reference_temperature = 273.0

        [creep]
        kind = "constant"
        viscosity = 1e23

        [plasticity]
        cohesion = 1e7
        friction_angle = 20.0
    "#;
    let p: PhaseProperties = toml::from_str(text).unwrap();
    assert_eq!(p.creep, CreepLaw::Constant { viscosity: 1e23 });
    assert_eq!(p.shear_modulus, Some(5e10));
    assert!(p.melting.is_none());
    assert_eq!(p.radiogenic_heat, 0.0);
    assert!(p.validate().is_ok());
}

#[test]
fn properties_serde_json_roundtrip() {
    let db = MaterialDatabase::with_defaults();
    let mantle = db.get("upper_mantle").unwrap();
    let json = serde_json::to_string(mantle).unwrap();
    let back: PhaseProperties = serde_json::from_str(&json).unwrap();
    assert_eq!(&back, mantle);
}

// ─── MaterialDatabase Tests ──────────────────────────────────

#[test]
fn default_database_has_six_materials() {
    let db = MaterialDatabase::with_defaults();
    assert_eq!(db.len(), 6);
    assert_eq!(
        db.names(),
        vec![
            "continental_crust",
            "magma",
            "oceanic_lithosphere",
            "sticky_air",
            "upper_mantle",
            "weak_inclusion"
        ]
    );
}

#[test]
fn all_presets_validate() {
    let db = MaterialDatabase::with_defaults();
    for name in db.names() {
        assert!(db.get(name).unwrap().validate().is_ok(), "{name} failed validation");
    }
}

#[test]
fn register_custom_material() {
    let mut db = MaterialDatabase::empty();
    assert!(db.is_empty());
    db.register(PhaseProperties::newtonian("custom", 5.0, 1.0));
    assert_eq!(db.get("custom").unwrap().creep, CreepLaw::Constant { viscosity: 5.0 });
    assert!(db.get("missing").is_none());
}

// ─── PhaseTable Tests ─────────────────────────────────────────

#[test]
fn table_evaluates_each_phase() {
    let table = PhaseTable::new(vec![
        PhaseProperties::newtonian("a", 1.0, 10.0),
        PhaseProperties::newtonian("b", 100.0, 20.0),
    ])
    .unwrap();
    let s = PointState::default();
    assert_eq!(table.nphases(), 2);
    assert_eq!(table.evaluate(PhaseId(0), &s).viscosity, 1.0);
    assert_eq!(table.evaluate(PhaseId(1), &s).density, 20.0);
    assert_eq!(table.name(), "phase_table");
}

#[test]
fn table_from_database() {
    let db = MaterialDatabase::with_defaults();
    let table = PhaseTable::from_database(&db, &["upper_mantle", "magma"]).unwrap();
    let hot = PointState {
        temperature: 1250.0,
        ..PointState::default()
    };
    let r = table.evaluate(PhaseId(1), &hot);
    assert!((r.melt_fraction - 0.5).abs() < 1e-12);
    assert_eq!(r.latent_heat, 4e5);
    assert!(PhaseTable::from_database(&db, &["unobtainium"]).is_err());
}

#[test]
fn table_rejects_empty_and_invalid() {
    assert!(PhaseTable::new(Vec::new()).is_err());
    let bad = PhaseProperties::newtonian("bad", -1.0, 1.0);
    assert!(PhaseTable::new(vec![bad]).is_err());
}
