//! Accelerated pseudo-transient Stokes iteration.
//!
//! Relaxes momentum balance and (in)compressibility for one physical
//! step. Each iteration performs, in order:
//!
//! 1. Velocity divergence at centers
//! 2. Pressure update from the continuity residual
//! 3. Deviatoric strain rates at centers and shear edges
//! 4. Viscosity and pseudo-steps (nonlinear rheology only, on cadence)
//! 5. Stress update with visco-elastic memory
//! 6. Momentum residual and velocity update
//! 7. Ghost refresh: physical conditions, periodic wrap, halo exchange
//!
//! Every `check_interval` iterations the residual norms are reduced
//! across ranks and compared with the tolerances.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use rheon_backend::ExecutionContext;
use rheon_grid::interp::center_to_face;
use rheon_grid::range::{step_down, step_up};
use rheon_grid::{shear_pairs, Field, FieldStore, IndexRange, Location, Position, Side, StokesFields, Subdomain};
use rheon_material::RheologyProvider;
use rheon_types::{RheonError, RheonResult};

use crate::boundary::{BoundaryApplicator, VelocityBoundary};
use crate::config::StokesConfig;
use crate::convergence::{residual_norm, ConvergenceMonitor, Decision};
use crate::pt_coefficients::StokesPseudoSteps;
use crate::rheology::{RheologyEngine, StokesCoefficients};
use crate::strategy::{PtSolver, ResidualState, SolveReport, SolveStatus};

/// Pseudo-transient Stokes solver.
pub struct StokesSolver {
    ctx: ExecutionContext,
    config: StokesConfig,
    bc: VelocityBoundary,
    applicator: BoundaryApplicator,
    rheology: RheologyEngine,
    coeffs: StokesCoefficients,
    steps: StokesPseudoSteps,
    divergence: Field,
    residual_pressure: Field,
    residual_velocity: Vec<Field>,
}

impl StokesSolver {
    /// Creates a solver for the local grid of `ctx`.
    pub fn new(
        ctx: ExecutionContext,
        config: StokesConfig,
        bc: VelocityBoundary,
        provider: Arc<dyn RheologyProvider>,
    ) -> RheonResult<Self> {
        config.validate()?;
        bc.validate()?;
        let applicator = BoundaryApplicator::new(ctx.clone());
        applicator.check_periodicity(bc.periodic())?;

        let grid = ctx.grid().clone();
        let rheology = RheologyEngine::new(
            ctx.clone(),
            provider,
            config.solver.cutoffs,
            config.solver.averaging,
            config.viscosity_relaxation,
        );
        Ok(Self {
            coeffs: StokesCoefficients::new(&grid),
            steps: StokesPseudoSteps::new(&grid),
            divergence: Field::new(&grid, Location::CENTER),
            residual_pressure: Field::new(&grid, Location::CENTER),
            residual_velocity: (0..grid.ndim).map(|a| Field::new(&grid, Location::face(a))).collect(),
            ctx,
            config,
            bc,
            applicator,
            rheology,
        })
    }

    pub fn config(&self) -> &StokesConfig {
        &self.config
    }

    pub fn boundary(&self) -> &VelocityBoundary {
        &self.bc
    }

    /// Coefficients of the last evaluation.
    pub fn coefficients(&self) -> &StokesCoefficients {
        &self.coeffs
    }

    /// Pseudo-time parameters of the last evaluation.
    pub fn pseudo_steps(&self) -> &StokesPseudoSteps {
        &self.steps
    }

    /// Enforces the velocity conditions and refreshes every velocity ghost.
    pub fn apply_boundary(&self, store: &mut FieldStore, dt: f64) -> RheonResult<()> {
        self.applicator
            .apply_velocity(&mut store.stokes.velocity, &self.bc, dt)
    }

    fn check_store(&self, store: &FieldStore, dt: f64) -> RheonResult<()> {
        if !(dt > 0.0) {
            return Err(RheonError::InvalidConfig(format!(
                "Physical time step must be positive, got {}",
                dt
            )));
        }
        store.validate()?;
        let grid = self.ctx.grid();
        if store.grid.cells != grid.cells || store.grid.spacing != grid.spacing {
            return Err(RheonError::InvalidGrid(format!(
                "Field store grid {:?} does not match the local grid {:?}",
                store.grid.cells, grid.cells
            )));
        }
        self.rheology.check_phases(&store.phases)
    }

    /// Velocity divergence and deviatoric strain rates from the current velocity.
    fn strain_rates(&mut self, stokes: &mut StokesFields) {
        let ctx = &self.ctx;
        let grid = ctx.grid();
        let ndim = grid.ndim;
        let d = grid.spacing;

        let velocity = &stokes.velocity;
        let range = self.divergence.interior_range();
        ctx.launch(&range, &mut self.divergence, |p, _| {
            (0..ndim)
                .map(|a| (velocity[a].at(step_up(p, a)) - velocity[a].at(p)) / d[a])
                .sum()
        });

        let divergence = &self.divergence;
        for (a, eps) in stokes.strain_diag.iter_mut().enumerate() {
            ctx.launch(&range, eps, |p, _| {
                (velocity[a].at(step_up(p, a)) - velocity[a].at(p)) / d[a] - divergence.at(p) / 3.0
            });
        }
        for (s, &(a, b)) in shear_pairs(ndim).iter().enumerate() {
            let eps = &mut stokes.strain_shear[s];
            let range = eps.interior_range();
            ctx.launch(&range, eps, |p, _| {
                0.5 * ((velocity[a].at(p) - velocity[a].at(step_down(p, b))) / d[b]
                    + (velocity[b].at(p) - velocity[b].at(step_down(p, a))) / d[a])
            });
        }
    }

    /// Re-evaluates rheology and pseudo-steps. Returns the clamp count.
    fn update_coefficients(&mut self, store: &FieldStore, dt: f64) -> RheonResult<usize> {
        let clamped = self.rheology.update_stokes(store, dt, &mut self.coeffs)?;
        self.steps
            .update(&self.ctx, &self.config.solver.pt, &self.coeffs.viscosity)?;
        Ok(clamped)
    }

    /// Continuity residual and pressure update.
    fn update_pressure(&mut self, stokes: &mut StokesFields, dt: f64) {
        let compressibility = match self.config.bulk_modulus {
            Some(k) if dt.is_finite() => 1.0 / (k * dt),
            _ => 0.0,
        };
        let range = self.divergence.interior_range();
        let divergence = &self.divergence;
        let pressure_old = &stokes.pressure_old;
        {
            let pressure = &stokes.pressure;
            self.ctx.launch(&range, &mut self.residual_pressure, |p, _| {
                -divergence.at(p) - (pressure.at(p) - pressure_old.at(p)) * compressibility
            });
        }
        let residual = &self.residual_pressure;
        let viscosity = &self.coeffs.viscosity;
        let steps = &self.steps;
        self.ctx.launch(&range, &mut stokes.pressure, |p, v| {
            v + residual.at(p) / (1.0 / steps.pseudo_bulk(viscosity.at(p)) + compressibility)
        });
    }

    /// Visco-elastic stress update at centers and edges.
    fn update_stress(&mut self, stokes: &mut StokesFields, dt: f64) {
        let ctx = &self.ctx;
        let theta = self.steps.theta;
        let ndim = ctx.grid().ndim;
        let update = |tau: f64, tau_old: f64, eta: f64, g: f64, eps: f64| -> f64 {
            let elastic = eta / (g * dt);
            let elastic = if elastic.is_finite() { elastic } else { 0.0 };
            tau + (-(tau - tau_old) * elastic - tau + 2.0 * eta * eps) / (theta + elastic + 1.0)
        };

        let eta = &self.coeffs.viscosity;
        let g = &self.coeffs.shear_modulus;
        for a in 0..ndim {
            let (tau, old, eps) = (&mut stokes.stress_diag[a], &stokes.stress_diag_old[a], &stokes.strain_diag[a]);
            let range = tau.interior_range();
            ctx.launch(&range, tau, |p, v| update(v, old.at(p), eta.at(p), g.at(p), eps.at(p)));
        }
        for s in 0..shear_pairs(ndim).len() {
            let eta = &self.coeffs.viscosity_edge[s];
            let g = &self.coeffs.shear_modulus_edge[s];
            let (tau, old, eps) = (
                &mut stokes.stress_shear[s],
                &stokes.stress_shear_old[s],
                &stokes.strain_shear[s],
            );
            let range = tau.interior_range();
            ctx.launch(&range, tau, |p, v| update(v, old.at(p), eta.at(p), g.at(p), eps.at(p)));
        }
    }

    /// Momentum residual and velocity update for every component.
    fn update_velocity(&mut self, stokes: &mut StokesFields) {
        let ctx = &self.ctx;
        let sub = ctx.subdomain();
        let ndim = sub.local.ndim;
        let d = sub.local.spacing;
        let gravity = self.config.gravity;
        let density = &self.coeffs.density;

        for a in 0..ndim {
            let range = velocity_range(sub, &stokes.velocity[a], a);
            let fields = &*stokes;
            ctx.launch(&range, &mut self.residual_velocity[a], |p, _| {
                momentum_residual(fields, density, gravity[a], a, d, p)
            });
        }
        for a in 0..ndim {
            let range = velocity_range(sub, &stokes.velocity[a], a);
            let residual = &self.residual_velocity[a];
            let dtau = &self.steps.dtau_v[a];
            ctx.launch(&range, &mut stokes.velocity[a], |p, v| v + residual.at(p) * dtau.at(p));
        }
    }

    /// Global residual norms at iteration `iteration`.
    fn residuals(&self, store: &FieldStore, iteration: u32) -> RheonResult<ResidualState> {
        let kind = self.config.solver.norm;
        let sub = self.ctx.subdomain();
        let mut state = ResidualState {
            iteration,
            ..ResidualState::default()
        };
        for a in 0..sub.local.ndim {
            let range = velocity_range(sub, &store.stokes.velocity[a], a);
            state.momentum[a] = residual_norm(&self.ctx, &self.residual_velocity[a], &range, kind)?;
        }
        let range = self.residual_pressure.interior_range();
        state.continuity = residual_norm(&self.ctx, &self.residual_pressure, &range, kind)?;
        Ok(state)
    }

    /// Runs the iteration for physical step `dt`.
    pub fn solve(&mut self, store: &mut FieldStore, dt: f64) -> RheonResult<SolveReport> {
        let start = Instant::now();
        self.check_store(store, dt)?;
        let solver = self.config.solver.clone();
        let max_iterations = solver.max_iterations;
        let check_interval = solver.check_interval;
        let nonlinear_every = self.config.viscosity_update_interval;
        let rank = self.ctx.comm.rank().0;

        debug!(rank, dt, max_iterations, "Stokes solve started");

        self.apply_boundary(store, dt)?;
        self.applicator.refresh_scalar(&mut store.stokes.pressure)?;
        self.strain_rates(&mut store.stokes);
        self.coeffs.reset();
        let mut clamped = self.update_coefficients(store, dt)?;

        let mut monitor = ConvergenceMonitor::new(&solver);
        let mut status = SolveStatus::NonConvergence;
        let mut iterations = 0;

        for iter in 1..=max_iterations {
            iterations = iter;
            self.strain_rates(&mut store.stokes);
            self.update_pressure(&mut store.stokes, dt);

            if self.config.nonlinear && iter % nonlinear_every == 0 {
                clamped = self.update_coefficients(store, dt)?;
            }

            self.update_stress(&mut store.stokes, dt);
            self.applicator.refresh_scalar(&mut store.stokes.pressure)?;
            for tau in store.stokes.stress_diag.iter_mut() {
                self.applicator.refresh_scalar(tau)?;
            }
            self.update_velocity(&mut store.stokes);
            self.apply_boundary(store, dt)?;

            if iter % check_interval == 0 || iter == max_iterations {
                let state = self.residuals(store, iter)?;
                let decision = monitor.check(state);
                debug!(
                    rank,
                    iter,
                    momentum = state.momentum[0].max(state.momentum[1]).max(state.momentum[2]),
                    continuity = state.continuity,
                    "Stokes convergence check"
                );
                if decision == Decision::Converged {
                    status = SolveStatus::Converged;
                    break;
                }
            }
        }

        // Leave strain rates consistent with the returned velocity.
        self.strain_rates(&mut store.stokes);

        let report = SolveReport {
            status,
            iterations,
            residual: monitor.last(),
            increases: monitor.increases(),
            history: monitor.into_history(),
            clamped_viscosity: clamped,
            wall_time: start.elapsed().as_secs_f64(),
        };
        if report.converged() {
            info!(
                rank,
                iterations,
                residual = report.residual.max(),
                wall_time = report.wall_time,
                "Stokes solve converged"
            );
        } else {
            warn!(
                rank,
                iterations,
                residual = report.residual.max(),
                "Stokes solve did not converge"
            );
        }
        Ok(report)
    }
}

impl PtSolver for StokesSolver {
    fn solve(&mut self, store: &mut FieldStore, dt: f64) -> RheonResult<SolveReport> {
        StokesSolver::solve(self, store, dt)
    }

    fn name(&self) -> &str {
        "stokes_apt"
    }
}

/// Velocity nodes of component `axis` updated by the iteration.
///
/// Wall nodes are set by boundary conditions. The top node along the
/// component's own axis always comes from a neighbour, the periodic
/// wrap or a wall, so it is excluded too.
pub fn velocity_range(sub: &Subdomain, field: &Field, axis: usize) -> IndexRange {
    let g = field.ghost[axis];
    let n = field.interior[axis];
    let lo = if sub.is_wall(axis, Side::Low) { g + 1 } else { g };
    field.interior_range().with_lo(axis, lo).with_hi(axis, g + n - 1)
}

/// `∂τ_ab/∂b − ∂P/∂a + ρ g_a` at velocity node `p` of component `a`.
fn momentum_residual(
    stokes: &StokesFields,
    density: &Field,
    gravity: f64,
    a: usize,
    d: [f64; 3],
    p: Position,
) -> f64 {
    let below = step_down(p, a);
    let ndim = stokes.velocity.len();
    let mut r = (stokes.stress_diag[a].at(p) - stokes.stress_diag[a].at(below)) / d[a]
        - (stokes.pressure.at(p) - stokes.pressure.at(below)) / d[a];
    for (s, &(i, j)) in shear_pairs(ndim).iter().enumerate() {
        let b = if i == a {
            j
        } else if j == a {
            i
        } else {
            continue;
        };
        let tau = &stokes.stress_shear[s];
        r += (tau.at(step_up(p, b)) - tau.at(p)) / d[b];
    }
    r + gravity * center_to_face(density, a, p)
}
