//! Thermal solver scenarios with known answers.

use std::sync::Arc;

use rheon_backend::{ExecutionContext, SerialBackend, ThreadGroup};
use rheon_grid::{decompose, FieldStore, Grid, Location, Side};
use rheon_material::{PhaseProperties, PhaseTable, RheologyProvider};
use rheon_solver::{
    PtSolver, SolveStatus, SolverConfig, TemperatureBoundary, TemperatureSide, ThermalConfig,
    ThermalSolver,
};
use rheon_types::RheonError;

fn rock(radiogenic: f64) -> Arc<dyn RheologyProvider> {
    let mut p = PhaseProperties::newtonian("rock", 1.0, 1.0);
    p.radiogenic_heat = radiogenic;
    Arc::new(PhaseTable::new(vec![p]).unwrap())
}

fn config(abs_tol: f64, max_iterations: u32) -> ThermalConfig {
    ThermalConfig {
        solver: SolverConfig {
            abs_tol,
            rel_tol: 0.0,
            max_iterations,
            check_interval: 100,
            ..SolverConfig::default()
        },
        ..ThermalConfig::default()
    }
}

fn solve(
    grid: &Grid,
    periodic: [bool; 3],
    config: ThermalConfig,
    bc: TemperatureBoundary,
    provider: Arc<dyn RheologyProvider>,
    prepare: impl FnOnce(&mut FieldStore),
    dt: f64,
) -> FieldStore {
    let ctx = ExecutionContext::serial(grid, periodic).unwrap();
    let mut store = FieldStore::new(grid.clone(), 1).unwrap();
    prepare(&mut store);
    let mut solver = ThermalSolver::new(ctx, config, bc, provider).unwrap();
    let report = solver.solve(&mut store, dt).unwrap();
    assert_eq!(report.status, SolveStatus::Converged, "{:?}", report.residual);
    store
}

/// `(y, T)` at every interior center.
fn profile(store: &FieldStore) -> Vec<(f64, f64)> {
    let t = &store.thermal.temperature;
    t.interior_range()
        .positions()
        .map(|p| (store.grid.coordinate_along(1, p[1], Location::CENTER), t.at(p)))
        .collect()
}

// ─── Steady State ─────────────────────────────────────────────

#[test]
fn steady_conduction_is_linear() {
    let g = Grid::new_2d([4, 16], [0.25, 1.0]).unwrap();
    let bc = TemperatureBoundary::fixed_along(1, 1.0, 0.0).with_periodic(0);
    let store = solve(
        &g,
        [true, false, false],
        config(1e-10, 100_000),
        bc,
        rock(0.0),
        |_| {},
        f64::INFINITY,
    );
    for (y, t) in profile(&store) {
        assert!((t - (1.0 - y)).abs() < 1e-6, "T({}) = {}", y, t);
    }
    // Fourier flux k ΔT / H = 1 along +y.
    let qy = &store.thermal.flux[1];
    assert!((qy.at([2, 8, 0]) - 1.0).abs() < 1e-5);
}

#[test]
fn steady_conduction_3d_is_linear() {
    let g = Grid::new_3d([4, 4, 12], [0.25, 0.25, 1.0]).unwrap();
    let bc = TemperatureBoundary::fixed_along(2, 1.0, 0.0)
        .with_periodic(0)
        .with_periodic(1);
    let store = solve(
        &g,
        [true, true, false],
        config(1e-10, 100_000),
        bc,
        rock(0.0),
        |_| {},
        f64::INFINITY,
    );
    let t = &store.thermal.temperature;
    for p in t.interior_range().positions() {
        let z = store.grid.coordinate_along(2, p[2], Location::CENTER);
        assert!((t.at(p) - (1.0 - z)).abs() < 1e-6, "T({:?}) = {}", p, t.at(p));
    }
    let qz = &store.thermal.flux[2];
    assert!((qz.at([2, 2, 6]) - 1.0).abs() < 1e-5);
    assert!(store.thermal.flux[0].max_abs_interior() < 1e-6);
}

#[test]
fn prescribed_flux_sets_gradient() {
    let g = Grid::new_2d([4, 16], [0.25, 1.0]).unwrap();
    let bc = TemperatureBoundary::insulated()
        .with_side(1, Side::Low, TemperatureSide::Flux(1.0))
        .with_side(1, Side::High, TemperatureSide::Fixed(0.0));
    let store = solve(&g, [false; 3], config(1e-10, 100_000), bc, rock(0.0), |_| {}, f64::INFINITY);
    // q = −k ∂T/∂y = 1 with T(1) = 0.
    for (y, t) in profile(&store) {
        assert!((t - (1.0 - y)).abs() < 1e-5, "T({}) = {}", y, t);
    }
    assert_eq!(store.thermal.flux[1].at([2, 1, 0]), 1.0);
}

#[test]
fn radiogenic_heating_gives_parabola() {
    let g = Grid::new_2d([4, 32], [0.125, 1.0]).unwrap();
    let bc = TemperatureBoundary::fixed_along(1, 0.0, 0.0);
    let store = solve(&g, [false; 3], config(1e-10, 200_000), bc, rock(1.0), |_| {}, f64::INFINITY);
    // T = H y (1 − y) / (2k), peak 1/8.
    for (y, t) in profile(&store) {
        let exact = 0.5 * y * (1.0 - y);
        assert!((t - exact).abs() < 0.01 * 0.125, "T({}) = {} vs {}", y, t, exact);
    }
}

#[test]
fn shear_heating_matches_equivalent_radiogenic_source() {
    let g = Grid::new_2d([4, 32], [0.125, 1.0]).unwrap();
    let bc = TemperatureBoundary::fixed_along(1, 0.0, 0.0);
    let radiogenic = solve(&g, [false; 3], config(1e-10, 200_000), bc.clone(), rock(1.0), |_| {}, f64::INFINITY);

    let mut cfg = config(1e-10, 200_000);
    cfg.shear_heating = 0.5;
    let sheared = solve(
        &g,
        [false; 3],
        cfg,
        bc,
        rock(0.0),
        |store| {
            // τ:ε̇ = 2 everywhere, half of it becomes heat.
            store.stokes.stress_diag[0].fill(1.0);
            store.stokes.strain_diag[0].fill(2.0);
        },
        f64::INFINITY,
    );
    let a = &radiogenic.thermal.temperature;
    let b = &sheared.thermal.temperature;
    for p in a.interior_range().positions() {
        assert!((a.at(p) - b.at(p)).abs() < 1e-7);
    }
}

// ─── Transient ────────────────────────────────────────────────

#[test]
fn cooling_slab_obeys_maximum_principle() {
    let g = Grid::new_2d([4, 16], [0.25, 1.0]).unwrap();
    let bc = TemperatureBoundary::fixed_along(1, 0.0, 0.0);
    let store = solve(
        &g,
        [false; 3],
        config(1e-10, 100_000),
        bc,
        rock(0.0),
        |store| {
            store.thermal.temperature.fill(1.0);
            store.thermal.commit();
        },
        0.01,
    );
    let t = &store.thermal.temperature;
    let interior: Vec<f64> = t.interior_range().positions().map(|p| t.at(p)).collect();
    assert!(interior.iter().all(|&v| (0.0..=1.0 + 1e-9).contains(&v)));
    // Centre barely changes over a short step, walls cool.
    assert!(t.at([2, 8, 0]) > 0.9);
    assert!(t.at([2, 1, 0]) < 0.8);
    // The history is untouched until the step is committed.
    assert!(store.thermal.temperature_old.data.iter().all(|&v| v == 1.0));
}

#[test]
fn trait_dispatch_and_invalid_step() {
    let g = Grid::new_2d([4, 4], [1.0, 1.0]).unwrap();
    let ctx = ExecutionContext::serial(&g, [false; 3]).unwrap();
    let mut solver: Box<dyn PtSolver> = Box::new(
        ThermalSolver::new(ctx, ThermalConfig::default(), TemperatureBoundary::insulated(), rock(0.0))
            .unwrap(),
    );
    assert_eq!(solver.name(), "thermal_apt");
    let mut store = FieldStore::new(g, 1).unwrap();
    assert!(matches!(solver.solve(&mut store, 0.0), Err(RheonError::InvalidConfig(_))));
    let report = solver.solve(&mut store, 1.0).unwrap();
    assert!(report.converged());
    assert_eq!(report.clamped_viscosity, 0);
}

// ─── Distributed Equality ─────────────────────────────────────

#[test]
fn two_ranks_match_serial() {
    let global = Grid::new_2d([8, 16], [0.5, 1.0]).unwrap();
    let bc = TemperatureBoundary::fixed_along(1, 1.0, 0.0);
    let fixed = config(0.0, 400);

    let ctx = ExecutionContext::serial(&global, [false; 3]).unwrap();
    let mut serial = FieldStore::new(global.clone(), 1).unwrap();
    ThermalSolver::new(ctx, fixed.clone(), bc.clone(), rock(2.0))
        .unwrap()
        .solve(&mut serial, f64::INFINITY)
        .unwrap();

    let parts = decompose(&global, [1, 2, 1], [false; 3]).unwrap();
    let results = ThreadGroup::new(parts)
        .run(|comm| {
            let ctx = ExecutionContext::new(Arc::new(SerialBackend::new()), Arc::new(comm));
            let offset = ctx.subdomain().offset;
            let mut store = FieldStore::new(ctx.grid().clone(), 1)?;
            let report = ThermalSolver::new(ctx, fixed.clone(), bc.clone(), rock(2.0))?
                .solve(&mut store, f64::INFINITY)?;
            Ok((report.iterations, offset, store.thermal.temperature))
        })
        .unwrap();

    let reference = &serial.thermal.temperature;
    for (iterations, offset, t) in results {
        assert_eq!(iterations, 400);
        for p in t.interior_range().positions() {
            let gp = [p[0] + offset[0], p[1] + offset[1], p[2]];
            assert!((t.at(p) - reference.at(gp)).abs() < 1e-12);
        }
    }
}
