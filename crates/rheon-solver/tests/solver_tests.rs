//! Integration tests for rheon-solver.

use std::sync::Arc;

use rheon_backend::{ExecutionContext, SerialBackend, ThreadGroup};
use rheon_grid::{decompose, Field, FieldStore, Grid, Location, Side};
use rheon_material::{
    DensityLaw, DruckerPrager, MaterialResponse, MeltingLaw, PhaseProperties, PhaseTable,
    PointState, RheologyProvider,
};
use rheon_solver::config::{Averaging, NormKind, SolverConfig, StokesConfig, ThermalConfig};
use rheon_solver::convergence::{residual_norm, ConvergenceMonitor, Decision};
use rheon_solver::phase_ratio::{Marker, PhaseRatioInterpolator};
use rheon_solver::rheology::{mix, vep_viscosity, RheologyEngine, StokesCoefficients, ThermalCoefficients};
use rheon_solver::{
    BoundaryApplicator, PtParams, ResidualState, StokesPseudoSteps, TemperatureBoundary,
    TemperatureSide, VelocityBoundary, VelocitySide, ViscosityCutoffs,
};
use rheon_types::{PhaseId, RheonError};

fn grid_2d() -> Grid {
    Grid::new_2d([6, 4], [1.5, 1.0]).unwrap()
}

fn table(phases: Vec<PhaseProperties>) -> Arc<dyn RheologyProvider> {
    Arc::new(PhaseTable::new(phases).unwrap())
}

/// A field whose every stored value differs.
fn patterned(grid: &Grid, location: Location) -> Field {
    let mut f = Field::new(grid, location);
    for (i, v) in f.data.iter_mut().enumerate() {
        *v = ((i * 37 % 101) as f64 - 50.0) * 0.01;
    }
    f
}

// ─── Config Tests ─────────────────────────────────────────────

#[test]
fn config_defaults_validate() {
    assert!(SolverConfig::default().validate().is_ok());
    assert!(StokesConfig::default().validate().is_ok());
    assert!(ThermalConfig::default().validate().is_ok());
    assert_eq!(SolverConfig::default().norm, NormKind::L2);
}

#[test]
fn config_presets() {
    let debug = SolverConfig::debug();
    assert_eq!(debug.max_iterations, 2_000);
    assert!(debug.abs_tol > SolverConfig::default().abs_tol);
    let hq = SolverConfig::high_quality();
    assert_eq!(hq.norm, NormKind::Max);
    assert!(hq.rel_tol < SolverConfig::default().rel_tol);
}

#[test]
fn config_toml_roundtrip() {
    let config = StokesConfig {
        bulk_modulus: Some(1e11),
        nonlinear: true,
        ..StokesConfig::default()
    };
    let text = toml::to_string(&config).unwrap();
    let back: StokesConfig = toml::from_str(&text).unwrap();
    assert_eq!(back.bulk_modulus, Some(1e11));
    assert!(back.nonlinear);
    assert_eq!(back.solver.max_iterations, config.solver.max_iterations);
    assert_eq!(back.solver.pt, PtParams::default());
}

#[test]
fn config_rejects_bad_values() {
    let mut c = SolverConfig::default();
    c.check_interval = 0;
    assert!(matches!(c.validate(), Err(RheonError::InvalidConfig(_))));

    let mut c = SolverConfig::default();
    c.cutoffs = ViscosityCutoffs { min: 10.0, max: 1.0 };
    assert!(c.validate().is_err());

    let mut c = SolverConfig::default();
    c.pt.cfl = Some(1.5);
    assert!(c.validate().is_err());

    let s = StokesConfig {
        viscosity_relaxation: 0.0,
        ..StokesConfig::default()
    };
    assert!(s.validate().is_err());

    let t = ThermalConfig {
        shear_heating: 2.0,
        ..ThermalConfig::default()
    };
    assert!(t.validate().is_err());
}

#[test]
fn default_cfl_depends_on_dimension() {
    let pt = PtParams::default();
    assert!((pt.cfl_for(2) - 0.9 / 2f64.sqrt()).abs() < 1e-15);
    assert!((pt.cfl_for(3) - 0.9 / 3f64.sqrt()).abs() < 1e-15);
}

// ─── Convergence Tests ────────────────────────────────────────

fn residual(iteration: u32, continuity: f64) -> ResidualState {
    ResidualState {
        iteration,
        momentum: [continuity, continuity, 0.0],
        continuity,
        energy: 0.0,
    }
}

#[test]
fn monitor_uses_first_check_as_reference() {
    let config = SolverConfig {
        abs_tol: 1e-12,
        rel_tol: 0.5,
        ..SolverConfig::default()
    };
    let mut monitor = ConvergenceMonitor::new(&config);
    assert_eq!(monitor.check(residual(100, 1.0)), Decision::Continue);
    assert_eq!(monitor.check(residual(200, 0.6)), Decision::Continue);
    assert_eq!(monitor.check(residual(300, 0.4)), Decision::Converged);
    assert_eq!(monitor.history().len(), 3);
    assert_eq!(monitor.last().iteration, 300);
    assert_eq!(monitor.increases(), 0);
}

#[test]
fn monitor_counts_increases_and_rejects_nan() {
    let config = SolverConfig {
        abs_tol: 1e-3,
        rel_tol: 0.0,
        ..SolverConfig::default()
    };
    let mut monitor = ConvergenceMonitor::new(&config);
    monitor.check(residual(1, 1.0));
    monitor.check(residual(2, 2.0));
    monitor.check(residual(3, 0.5));
    monitor.check(residual(4, 0.7));
    assert_eq!(monitor.increases(), 2);
    assert_eq!(monitor.check(residual(5, f64::NAN)), Decision::Continue);
    assert_eq!(monitor.check(residual(6, 1e-4)), Decision::Converged);
}

#[test]
fn residual_norms() {
    let g = grid_2d();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let mut f = Field::new(&g, Location::CENTER);
    f.fill_with(|p| if p == [1, 1, 0] { -4.0 } else { 0.0 });
    f.set([0, 0, 0], 100.0); // ghost, ignored
    let range = f.interior_range();
    let max = residual_norm(&ctx, &f, &range, NormKind::Max).unwrap();
    let l2 = residual_norm(&ctx, &f, &range, NormKind::L2).unwrap();
    assert_eq!(max, 4.0);
    assert!((l2 - (16.0f64 / 24.0).sqrt()).abs() < 1e-14);
}

// ─── Rheology Tests ───────────────────────────────────────────

#[test]
fn mixing_rules() {
    let terms = || [(0.5, 1.0), (0.5, 100.0)].into_iter();
    assert!((mix(Averaging::Arithmetic, terms()) - 50.5).abs() < 1e-12);
    assert!((mix(Averaging::Harmonic, terms()) - 1.0 / 0.505).abs() < 1e-12);
    assert!((mix(Averaging::Geometric, terms()) - 10.0).abs() < 1e-12);
    // Absent phases do not poison the means.
    let absent = [(1.0, 3.0), (0.0, f64::INFINITY)].into_iter();
    assert_eq!(mix(Averaging::Harmonic, absent), 3.0);
    let absent = [(1.0, 3.0), (0.0, 0.0)].into_iter();
    assert!((mix(Averaging::Geometric, absent) - 3.0).abs() < 1e-12);
}

fn response(viscosity: f64, yield_stress: f64, shear_modulus: f64) -> MaterialResponse {
    let base = PhaseProperties::newtonian("x", viscosity, 1.0).response(&PointState::default());
    MaterialResponse {
        yield_stress,
        shear_modulus,
        ..base
    }
}

#[test]
fn vep_viscosity_caps_stress_at_yield() {
    let state = PointState {
        strain_rate_ii: 1.0,
        ..PointState::default()
    };
    // Viscous trial stress 2000 exceeds yield 1.
    let eta = vep_viscosity(&response(1e3, 1.0, f64::INFINITY), &state);
    assert!((eta - 0.5).abs() < 1e-12);
    // Below yield the creep viscosity is returned.
    let eta = vep_viscosity(&response(0.1, 1.0, f64::INFINITY), &state);
    assert_eq!(eta, 0.1);
}

#[test]
fn vep_viscosity_with_elasticity_lands_on_yield_surface() {
    let state = PointState {
        strain_rate_ii: 1.0,
        stress_ii_old: 0.5,
        dt: 1.0,
        ..PointState::default()
    };
    let (g, tau_y) = (10.0, 1.0);
    let eta = vep_viscosity(&response(1e3, tau_y, g), &state);
    // Visco-elastic stress with the returned viscosity equals the yield stress.
    let eta_ve = 1.0 / (1.0 / eta + 1.0 / (g * state.dt));
    let e_eff = state.strain_rate_ii + state.stress_ii_old / (2.0 * g * state.dt);
    assert!((2.0 * eta_ve * e_eff - tau_y).abs() < 1e-12);
    assert!(eta < 1e3);
}

#[test]
fn engine_clamps_and_counts() {
    let g = Grid::new_2d([4, 4], [1.0, 1.0]).unwrap();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let store = FieldStore::new(g.clone(), 1).unwrap();
    let cutoffs = ViscosityCutoffs { min: 1.0, max: 1e3 };
    let mut engine = RheologyEngine::new(
        ctx,
        table(vec![PhaseProperties::newtonian("soft", 1e-5, 1.0)]),
        cutoffs,
        Averaging::Harmonic,
        1.0,
    );
    let mut coeffs = StokesCoefficients::new(&g);
    let clamped = engine.update_stokes(&store, f64::INFINITY, &mut coeffs).unwrap();
    assert_eq!(clamped, 16 + 25);
    assert!(coeffs.viscosity.data.iter().all(|&v| v == 1.0));
    let edge = &coeffs.viscosity_edge[0];
    assert!(edge.interior_range().positions().all(|p| edge.at(p) == 1.0));
    assert!(coeffs.shear_modulus.data.iter().all(|v| v.is_infinite()));
    assert!(coeffs.density.data.iter().all(|&v| v == 1.0));
}

#[test]
fn engine_mixes_two_phases_at_centers() {
    let g = Grid::new_2d([4, 4], [1.0, 1.0]).unwrap();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let mut store = FieldStore::new(g.clone(), 2).unwrap();
    for f in store.phases.center.iter_mut().chain(store.phases.vertex.iter_mut()) {
        f.fill(0.5);
    }
    let mut engine = RheologyEngine::new(
        ctx,
        table(vec![
            PhaseProperties::newtonian("a", 1.0, 1.0),
            PhaseProperties::newtonian("b", 100.0, 3.0),
        ]),
        ViscosityCutoffs::default(),
        Averaging::Arithmetic,
        1.0,
    );
    let mut coeffs = StokesCoefficients::new(&g);
    assert_eq!(engine.update_stokes(&store, f64::INFINITY, &mut coeffs).unwrap(), 0);
    assert!((coeffs.viscosity.at([2, 2, 0]) - 50.5).abs() < 1e-12);
    assert!((coeffs.density.at([2, 2, 0]) - 2.0).abs() < 1e-12);
}

#[test]
fn engine_rejects_phase_count_mismatch() {
    let g = Grid::new_2d([4, 4], [1.0, 1.0]).unwrap();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let store = FieldStore::new(g.clone(), 3).unwrap();
    let mut engine = RheologyEngine::new(
        ctx,
        table(vec![PhaseProperties::newtonian("a", 1.0, 1.0)]),
        ViscosityCutoffs::default(),
        Averaging::Harmonic,
        1.0,
    );
    let mut coeffs = StokesCoefficients::new(&g);
    assert!(matches!(
        engine.update_stokes(&store, 1.0, &mut coeffs),
        Err(RheonError::InvalidConfig(_))
    ));
}

#[test]
fn latent_heat_raises_effective_heat_capacity() {
    let g = Grid::new_2d([4, 4], [1.0, 1.0]).unwrap();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let mut store = FieldStore::new(g.clone(), 1).unwrap();
    store.thermal.temperature.fill(1100.0);

    let mut rock = PhaseProperties::newtonian("rock", 1.0, 1000.0);
    rock.density = DensityLaw::constant(1000.0);
    rock.heat_capacity = 1000.0;
    rock.melting = Some(MeltingLaw {
        solidus: 1000.0,
        liquidus: 1200.0,
        latent_heat: 4e5,
    });
    let mut engine = RheologyEngine::new(
        ctx,
        table(vec![rock]),
        ViscosityCutoffs::default(),
        Averaging::Harmonic,
        1.0,
    );
    let mut coeffs = ThermalCoefficients::new(&g);
    engine.update_thermal(&store, false, &mut coeffs).unwrap();
    assert!((coeffs.rho_cp.at([2, 2, 0]) - 1e6).abs() < 1e-6);
    engine.update_thermal(&store, true, &mut coeffs).unwrap();
    assert!((coeffs.rho_cp.at([2, 2, 0]) - 3e6).abs() < 1e-6);
}

#[test]
fn plastic_phase_weakens_under_fast_strain() {
    let g = Grid::new_2d([4, 4], [1.0, 1.0]).unwrap();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let mut store = FieldStore::new(g.clone(), 1).unwrap();
    store.stokes.strain_diag[0].fill(1.0);
    store.stokes.strain_diag[1].fill(-1.0);

    let mut weak = PhaseProperties::newtonian("weak", 1e3, 1.0);
    weak.plasticity = Some(DruckerPrager {
        cohesion: 2.0,
        friction_angle: 0.0,
    });
    let mut engine = RheologyEngine::new(
        ctx,
        table(vec![weak]),
        ViscosityCutoffs::default(),
        Averaging::Harmonic,
        1.0,
    );
    let mut coeffs = StokesCoefficients::new(&g);
    engine.update_stokes(&store, f64::INFINITY, &mut coeffs).unwrap();
    // ε̇II = sqrt(½ (1 + 1)) = 1, so η = τy / (2 ε̇II) = 1.
    assert!((coeffs.viscosity.at([2, 2, 0]) - 1.0).abs() < 1e-12);
}

// ─── PT Coefficient Tests ─────────────────────────────────────

#[test]
fn stokes_pseudo_steps_for_uniform_viscosity() {
    let g = grid_2d();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let eta = Field::filled(&g, Location::CENTER, 2.0);
    let params = PtParams::default();
    let mut steps = StokesPseudoSteps::new(&g);
    steps.update(&ctx, &params, &eta).unwrap();

    let vpdtau = 0.9 / 2f64.sqrt() * 0.25;
    assert!((steps.vpdtau - vpdtau).abs() < 1e-15);
    assert_eq!(steps.length, 1.5);
    let theta = 1.5 * (params.r + 2.0) / (params.reynolds * vpdtau);
    assert!((steps.theta - theta).abs() < 1e-12);
    let dtau = vpdtau * 1.5 / params.reynolds / 2.0;
    for f in &steps.dtau_v {
        for p in f.interior_range().positions() {
            assert!((f.at(p) - dtau).abs() < 1e-15);
        }
    }
    assert!((steps.pseudo_bulk(2.0) - params.r * 2.0 / theta).abs() < 1e-12);
}

#[test]
fn pseudo_steps_follow_local_maximum() {
    let g = Grid::new_2d([8, 8], [1.0, 1.0]).unwrap();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let mut eta = Field::filled(&g, Location::CENTER, 1.0);
    eta.set([4, 4, 0], 100.0);
    let mut steps = StokesPseudoSteps::new(&g);
    steps.update(&ctx, &PtParams::default(), &eta).unwrap();
    // Diagonal neighbour sees the stiff cell.
    assert_eq!(steps.max_viscosity.at([5, 5, 0]), 100.0);
    assert_eq!(steps.max_viscosity.at([7, 7, 0]), 1.0);
    let far = steps.dtau_v[0].at([8, 8, 0]);
    let near = steps.dtau_v[0].at([5, 4, 0]);
    assert!((far / near - 100.0).abs() < 1e-9);
}

// ─── Boundary Tests ───────────────────────────────────────────

fn velocity_kinds() -> Vec<VelocitySide> {
    vec![
        VelocitySide::FREE_SLIP,
        VelocitySide::FreeSlip {
            normal_velocity: 0.3,
        },
        VelocitySide::NoSlip,
        VelocitySide::Velocity {
            value: [1.0, -2.0, 0.0],
        },
        VelocitySide::Displacement {
            value: [0.5, 0.25, 0.0],
        },
    ]
}

#[test]
fn velocity_conditions_are_idempotent() {
    let g = grid_2d();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let app = BoundaryApplicator::new(ctx);
    for kind in velocity_kinds() {
        let bc = VelocityBoundary::free_slip()
            .with_side(1, Side::High, kind)
            .with_side(0, Side::Low, kind);
        let mut v: Vec<Field> = (0..2).map(|a| patterned(&g, Location::face(a))).collect();
        app.apply_velocity(&mut v, &bc, 2.0).unwrap();
        let once = v.clone();
        app.apply_velocity(&mut v, &bc, 2.0).unwrap();
        assert_eq!(v, once, "{kind:?} is not idempotent");
    }
}

#[test]
fn periodic_velocity_is_idempotent() {
    let g = grid_2d();
    let ctx = ExecutionContext::serial(&g, [true, false, false]).unwrap();
    let app = BoundaryApplicator::new(ctx);
    let bc = VelocityBoundary::no_slip().with_periodic(0);
    app.check_periodicity(bc.periodic()).unwrap();
    let mut v: Vec<Field> = (0..2).map(|a| patterned(&g, Location::face(a))).collect();
    app.apply_velocity(&mut v, &bc, 1.0).unwrap();
    let once = v.clone();
    app.apply_velocity(&mut v, &bc, 1.0).unwrap();
    assert_eq!(v, once);
    // Vy wraps: ghost column 0 holds the last interior column.
    assert_eq!(v[1].at([0, 2, 0]), v[1].at([6, 2, 0]));
    assert_eq!(v[1].at([7, 2, 0]), v[1].at([1, 2, 0]));
    // Vx boundary nodes coincide.
    assert_eq!(v[0].at([7, 2, 0]), v[0].at([1, 2, 0]));
}

#[test]
fn free_slip_mirrors_tangential_velocity() {
    let g = grid_2d();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let app = BoundaryApplicator::new(ctx);
    let mut v: Vec<Field> = (0..2).map(|a| patterned(&g, Location::face(a))).collect();
    let interior = v[0].at([3, 2, 0]);
    app.apply_velocity(&mut v, &VelocityBoundary::free_slip(), 1.0).unwrap();
    // Interior untouched, zero normal derivative of tangential Vx at the bottom.
    assert_eq!(v[0].at([3, 2, 0]), interior);
    assert_eq!(v[0].at([3, 0, 0]), v[0].at([3, 1, 0]));
    // Normal velocity zero on the walls.
    assert_eq!(v[0].at([1, 2, 0]), 0.0);
    assert_eq!(v[1].at([3, 5, 0]), 0.0);
}

#[test]
fn no_slip_and_lid_set_wall_values() {
    let g = grid_2d();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let app = BoundaryApplicator::new(ctx);
    let bc = VelocityBoundary::no_slip().with_side(
        1,
        Side::High,
        VelocitySide::Velocity {
            value: [1.0, 0.0, 0.0],
        },
    );
    let mut v: Vec<Field> = (0..2).map(|a| patterned(&g, Location::face(a))).collect();
    app.apply_velocity(&mut v, &bc, 1.0).unwrap();
    // Wall value is the mean of ghost and first interior value.
    let bottom = 0.5 * (v[0].at([3, 0, 0]) + v[0].at([3, 1, 0]));
    let lid = 0.5 * (v[0].at([3, 4, 0]) + v[0].at([3, 5, 0]));
    assert!(bottom.abs() < 1e-15);
    assert!((lid - 1.0).abs() < 1e-15);
}

#[test]
fn displacement_becomes_velocity() {
    let g = grid_2d();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let app = BoundaryApplicator::new(ctx);
    let bc = VelocityBoundary::free_slip().with_side(
        0,
        Side::High,
        VelocitySide::Displacement {
            value: [0.5, 0.0, 0.0],
        },
    );
    let mut v: Vec<Field> = (0..2).map(|a| Field::new(&g, Location::face(a))).collect();
    app.apply_velocity(&mut v, &bc, 2.0).unwrap();
    assert_eq!(v[0].at([7, 2, 0]), 0.25);
}

#[test]
fn one_sided_periodicity_is_rejected() {
    let bc = VelocityBoundary::free_slip().with_side(0, Side::Low, VelocitySide::Periodic);
    assert!(bc.validate().is_err());
    let t = TemperatureBoundary::insulated().with_side(1, Side::High, TemperatureSide::Periodic);
    assert!(t.validate().is_err());

    let g = grid_2d();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let app = BoundaryApplicator::new(ctx);
    let periodic = VelocityBoundary::free_slip().with_periodic(0);
    assert!(app.check_periodicity(periodic.periodic()).is_err());
}

#[test]
fn temperature_conditions_are_idempotent() {
    let g = grid_2d();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let app = BoundaryApplicator::new(ctx);
    for kind in [
        TemperatureSide::Fixed(300.0),
        TemperatureSide::ZeroFlux,
        TemperatureSide::Flux(0.05),
    ] {
        let bc = TemperatureBoundary::insulated().with_side(1, Side::Low, kind);
        let mut t = patterned(&g, Location::CENTER);
        app.apply_temperature(&mut t, &bc).unwrap();
        let once = t.clone();
        app.apply_temperature(&mut t, &bc).unwrap();
        assert_eq!(t, once);
    }

    let ctx = ExecutionContext::serial(&g, [true, false, false]).unwrap();
    let app = BoundaryApplicator::new(ctx);
    let bc = TemperatureBoundary::fixed_along(1, 1.0, 0.0).with_periodic(0);
    let mut t = patterned(&g, Location::CENTER);
    app.apply_temperature(&mut t, &bc).unwrap();
    let once = t.clone();
    app.apply_temperature(&mut t, &bc).unwrap();
    assert_eq!(t, once);
    assert_eq!(t.at([0, 2, 0]), t.at([6, 2, 0]));
}

#[test]
fn fixed_temperature_mirrors_about_wall() {
    let g = grid_2d();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let app = BoundaryApplicator::new(ctx);
    let bc = TemperatureBoundary::fixed_along(1, 1000.0, 0.0);
    let mut t = patterned(&g, Location::CENTER);
    app.apply_temperature(&mut t, &bc).unwrap();
    assert!((0.5 * (t.at([3, 0, 0]) + t.at([3, 1, 0])) - 1000.0).abs() < 1e-9);
    assert!((0.5 * (t.at([3, 4, 0]) + t.at([3, 5, 0]))).abs() < 1e-12);
}

#[test]
fn heat_flux_walls() {
    let g = grid_2d();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let app = BoundaryApplicator::new(ctx);
    let bc = TemperatureBoundary::insulated().with_side(1, Side::High, TemperatureSide::Flux(-0.06));
    let mut qy = patterned(&g, Location::face(1));
    app.apply_heat_flux(&mut qy, 1, &bc);
    assert_eq!(qy.at([3, 1, 0]), 0.0);
    assert_eq!(qy.at([3, 5, 0]), -0.06);
}

#[test]
fn scalar_refresh_is_zero_gradient_and_idempotent() {
    let g = grid_2d();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let app = BoundaryApplicator::new(ctx);
    let mut p = patterned(&g, Location::CENTER);
    app.refresh_scalar(&mut p).unwrap();
    assert_eq!(p.at([0, 2, 0]), p.at([1, 2, 0]));
    assert_eq!(p.at([7, 2, 0]), p.at([6, 2, 0]));
    assert_eq!(p.at([0, 0, 0]), p.at([1, 1, 0]));
    let once = p.clone();
    app.refresh_scalar(&mut p).unwrap();
    assert_eq!(p, once);

    let mut v = patterned(&g, Location::vertex(2));
    app.refresh_scalar(&mut v).unwrap();
    assert_eq!(v.at([0, 2, 0]), v.at([2, 2, 0]));
    let once = v.clone();
    app.refresh_scalar(&mut v).unwrap();
    assert_eq!(v, once);
}

#[test]
fn boundary_serde_roundtrip() {
    let bc = VelocityBoundary::free_slip().with_side(
        1,
        Side::High,
        VelocitySide::Velocity {
            value: [1.0, 0.0, 0.0],
        },
    );
    let json = serde_json::to_string(&bc).unwrap();
    assert_eq!(serde_json::from_str::<VelocityBoundary>(&json).unwrap(), bc);

    let t = TemperatureBoundary::fixed_along(1, 1600.0, 273.0)
        .with_side(0, Side::Low, TemperatureSide::Flux(0.03));
    let json = serde_json::to_string(&t).unwrap();
    assert!(json.contains("\"kind\":\"fixed\""));
    assert_eq!(serde_json::from_str::<TemperatureBoundary>(&json).unwrap(), t);
}

// ─── Phase Ratio Tests ────────────────────────────────────────

fn markers_per_cell(g: &Grid, per_axis: usize, phase_at: impl Fn([f64; 3]) -> PhaseId) -> Vec<Marker> {
    let mut markers = Vec::new();
    let n = [g.cells[0] * per_axis, g.cells[1] * per_axis];
    for j in 0..n[1] {
        for i in 0..n[0] {
            let x = [
                (i as f64 + 0.5) * g.spacing[0] / per_axis as f64,
                (j as f64 + 0.5) * g.spacing[1] / per_axis as f64,
                0.0,
            ];
            markers.push(Marker::new(x, phase_at(x)));
        }
    }
    markers
}

#[test]
fn ratios_sum_to_one_for_mixed_cells() {
    let g = grid_2d();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let mut store = FieldStore::new(g.clone(), 3).unwrap();
    let markers = markers_per_cell(&g, 3, |x| PhaseId(((x[0] * 7.3 + x[1] * 3.1) as u16) % 3));
    let report = PhaseRatioInterpolator::new(ctx)
        .interpolate(&mut store, &markers)
        .unwrap();
    assert_eq!(report.markers_used, markers.len());
    assert!(store.phases.max_sum_error() < 1e-10);
    assert!(store.phases.check_sums().is_ok());
    for fields in [&store.phases.center, &store.phases.vertex] {
        for f in fields.iter() {
            assert!(f.data.iter().all(|&r| (0.0..=1.0).contains(&r)));
        }
    }
}

#[test]
fn ratios_follow_marker_counts() {
    let g = Grid::new_2d([2, 2], [1.0, 1.0]).unwrap();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let mut store = FieldStore::new(g.clone(), 2).unwrap();
    // Three phase-0 markers and one phase-1 marker in every cell.
    let markers = markers_per_cell(&g, 2, |x| {
        let fx = (x[0] * 4.0) as usize % 2;
        let fy = (x[1] * 4.0) as usize % 2;
        PhaseId(u16::from(fx == 1 && fy == 1))
    });
    PhaseRatioInterpolator::new(ctx)
        .interpolate(&mut store, &markers)
        .unwrap();
    assert!((store.phases.at_center(0, [1, 1, 0]) - 0.75).abs() < 1e-15);
    assert!((store.phases.at_center(1, [2, 2, 0]) - 0.25).abs() < 1e-15);
}

#[test]
fn empty_cells_inherit_nearest_ratios() {
    let g = Grid::new_2d([4, 4], [1.0, 1.0]).unwrap();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let mut store = FieldStore::new(g.clone(), 2).unwrap();
    let markers = vec![
        Marker::new([0.1, 0.1, 0.0], PhaseId(1)),
        Marker::new([0.9, 0.9, 0.0], PhaseId(0)),
    ];
    let report = PhaseRatioInterpolator::new(ctx)
        .interpolate(&mut store, &markers)
        .unwrap();
    assert!(report.filled_bins > 0);
    assert!(store.phases.check_sums().is_ok());
    // Cells next to each marker take its phase.
    assert_eq!(store.phases.at_center(1, [2, 1, 0]), 1.0);
    assert_eq!(store.phases.at_center(0, [3, 4, 0]), 1.0);
}

/// Vertex ratios of phase 1 keyed by global storage position.
fn vertex_ratios(store: &FieldStore, offset: [usize; 3]) -> Vec<([usize; 3], f64)> {
    let f = &store.phases.vertex[1];
    f.interior_range()
        .positions()
        .map(|p| ([p[0] + offset[0], p[1] + offset[1], p[2] + offset[2]], f.at(p)))
        .collect()
}

fn check_interpolation_split(dims: [usize; 3], periodic: [bool; 3]) {
    let global = Grid::new_2d([8, 8], [1.0, 1.0]).unwrap();
    let markers = markers_per_cell(&global, 4, |x| PhaseId(u16::from(x[0] > 0.5 || x[1] > 0.5)));

    let ctx = ExecutionContext::serial(&global, periodic).unwrap();
    let mut serial = FieldStore::new(global.clone(), 2).unwrap();
    PhaseRatioInterpolator::new(ctx)
        .interpolate(&mut serial, &markers)
        .unwrap();

    let parts = decompose(&global, dims, periodic).unwrap();
    let results = ThreadGroup::new(parts)
        .run(|comm| {
            let ctx = ExecutionContext::new(Arc::new(SerialBackend::new()), Arc::new(comm));
            let offset = ctx.subdomain().offset;
            let mut store = FieldStore::new(ctx.grid().clone(), 2)?;
            // Each rank ignores markers outside its own cells.
            let report = PhaseRatioInterpolator::new(ctx).interpolate(&mut store, &markers)?;
            Ok((report.markers_used, vertex_ratios(&store, offset)))
        })
        .unwrap();

    let used: usize = results.iter().map(|(u, _)| u).sum();
    assert_eq!(used, markers.len());
    for (_, ratios) in &results {
        for &(p, r) in ratios {
            let expected = serial.phases.vertex[1].at(p);
            assert!(
                (r - expected).abs() < 1e-14,
                "dims {:?} vertex {:?}: {} vs serial {}",
                dims,
                p,
                r,
                expected
            );
        }
    }
}

#[test]
fn interface_vertex_ratios_match_serial() {
    check_interpolation_split([2, 1, 1], [false; 3]);
    check_interpolation_split([1, 2, 1], [false; 3]);
    check_interpolation_split([2, 2, 1], [false; 3]);
}

#[test]
fn periodic_interface_vertex_ratios_match_serial() {
    check_interpolation_split([2, 1, 1], [true, false, false]);
}

#[test]
fn periodic_seam_vertices_count_both_sides() {
    let g = Grid::new_2d([8, 8], [1.0, 1.0]).unwrap();
    let ctx = ExecutionContext::serial(&g, [true, false, false]).unwrap();
    let mut store = FieldStore::new(g.clone(), 2).unwrap();
    let markers = markers_per_cell(&g, 4, |x| PhaseId(u16::from(x[0] > 0.5)));
    PhaseRatioInterpolator::new(ctx)
        .interpolate(&mut store, &markers)
        .unwrap();

    let ratio = &store.phases.vertex[1];
    for j in 1..=9 {
        // x = 0 and x = 1 are the same node; x = 0.5 is the phase boundary.
        assert_eq!(ratio.at([1, j, 0]), 0.5, "x = 0, row {}", j);
        assert_eq!(ratio.at([9, j, 0]), 0.5, "x = 1, row {}", j);
        assert_eq!(ratio.at([5, j, 0]), 0.5, "x = 0.5, row {}", j);
        assert_eq!(ratio.at([3, j, 0]), 0.0);
        assert_eq!(ratio.at([7, j, 0]), 1.0);
    }
    assert!(store.phases.check_sums().is_ok());
}

#[test]
fn no_markers_is_an_error() {
    let g = grid_2d();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let mut store = FieldStore::new(g.clone(), 1).unwrap();
    let outside = vec![Marker::new([10.0, 10.0, 0.0], PhaseId(0))];
    let interp = PhaseRatioInterpolator::new(ctx);
    assert!(matches!(
        interp.interpolate(&mut store, &outside),
        Err(RheonError::InvalidConfig(_))
    ));
    let bad = vec![Marker::new([0.1, 0.1, 0.0], PhaseId(4))];
    assert!(interp.interpolate(&mut store, &bad).is_err());
}

#[test]
fn set_with_and_renormalize() {
    let g = grid_2d();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let mut store = FieldStore::new(g.clone(), 2).unwrap();
    let interp = PhaseRatioInterpolator::new(ctx);
    interp
        .set_with(&mut store, |x| PhaseId(u16::from(x[0] > 0.75)))
        .unwrap();
    assert_eq!(store.phases.at_center(0, [1, 1, 0]), 1.0);
    assert_eq!(store.phases.at_center(1, [6, 1, 0]), 1.0);
    assert!(store.phases.check_sums().is_ok());

    store.phases.center[0].set([2, 2, 0], 0.5);
    store.phases.center[1].set([2, 2, 0], 0.6);
    let correction = interp.normalize(&mut store.phases).unwrap();
    assert!((correction - 0.1).abs() < 1e-12);
    assert!(store.phases.max_sum_error() < 1e-12);
}
