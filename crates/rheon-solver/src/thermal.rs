//! Accelerated pseudo-transient heat diffusion.
//!
//! Relaxes `ρCp ∂T/∂t = −∇·q + H` with `q = −k ∇T` for one physical
//! step. The flux carries its own damped pseudo-time derivative, and
//! the storage term is treated implicitly in the temperature update, so
//! `dt = ∞` yields steady-state conduction.
//!
//! Heat sources `H`: radiogenic production, shear heating `χ τ:ε̇` from
//! the current Stokes state, and adiabatic heating `α T ρ (g·V)`.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use rheon_backend::ExecutionContext;
use rheon_grid::interp::{center_to_face, face_to_center};
use rheon_grid::range::{step_down, step_up};
use rheon_grid::{Field, FieldStore, Location, Position};
use rheon_material::RheologyProvider;
use rheon_types::{RheonError, RheonResult};

use crate::boundary::{BoundaryApplicator, TemperatureBoundary};
use crate::config::ThermalConfig;
use crate::convergence::{residual_norm, ConvergenceMonitor, Decision};
use crate::pt_coefficients::ThermalPseudoSteps;
use crate::rheology::{RheologyEngine, ThermalCoefficients};
use crate::strategy::{PtSolver, ResidualState, SolveReport, SolveStatus};

/// Pseudo-transient thermal solver.
pub struct ThermalSolver {
    ctx: ExecutionContext,
    config: ThermalConfig,
    bc: TemperatureBoundary,
    applicator: BoundaryApplicator,
    rheology: RheologyEngine,
    coeffs: ThermalCoefficients,
    steps: ThermalPseudoSteps,
    /// Temperature-independent sources (radiogenic plus shear heating).
    source: Field,
    /// Adiabatic coefficient `α ρ (g·V)`; the source adds it times `T`.
    adiabatic: Field,
    residual: Field,
}

impl ThermalSolver {
    pub fn new(
        ctx: ExecutionContext,
        config: ThermalConfig,
        bc: TemperatureBoundary,
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
            1.0,
        );
        Ok(Self {
            coeffs: ThermalCoefficients::new(&grid),
            steps: ThermalPseudoSteps::new(&grid),
            source: Field::new(&grid, Location::CENTER),
            adiabatic: Field::new(&grid, Location::CENTER),
            residual: Field::new(&grid, Location::CENTER),
            ctx,
            config,
            bc,
            applicator,
            rheology,
        })
    }

    pub fn config(&self) -> &ThermalConfig {
        &self.config
    }

    pub fn boundary(&self) -> &TemperatureBoundary {
        &self.bc
    }

    pub fn coefficients(&self) -> &ThermalCoefficients {
        &self.coeffs
    }

    /// Enforces the temperature conditions and refreshes ghosts.
    pub fn apply_boundary(&self, store: &mut FieldStore) -> RheonResult<()> {
        self.applicator
            .apply_temperature(&mut store.thermal.temperature, &self.bc)
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

    /// Coefficients, pseudo-steps and heat sources from the current state.
    fn update_coefficients(&mut self, store: &FieldStore, dt: f64) -> RheonResult<()> {
        self.rheology
            .update_thermal(store, self.config.latent_heat, &mut self.coeffs)?;
        self.steps
            .update(&self.ctx, &self.config.solver.pt, &self.coeffs, dt)?;

        let ndim = store.grid.ndim;
        let range = self.source.interior_range();
        let chi = self.config.shear_heating;
        let stokes = &store.stokes;
        let radiogenic = &self.coeffs.radiogenic;
        self.ctx.launch(&range, &mut self.source, |p, _| {
            let shear = if chi > 0.0 { chi * stokes.work_rate(p) } else { 0.0 };
            radiogenic.at(p) + shear
        });

        let gravity = self.config.gravity;
        let alpha_rho = &self.coeffs.alpha_rho;
        let enabled = self.config.adiabatic_heating;
        self.ctx.launch(&range, &mut self.adiabatic, |p, _| {
            if !enabled {
                return 0.0;
            }
            let g_dot_v: f64 = (0..ndim)
                .map(|a| gravity[a] * face_to_center(&stokes.velocity[a], a, p))
                .sum();
            alpha_rho.at(p) * g_dot_v
        });
        Ok(())
    }

    /// Damped flux update on every face, then wall fluxes.
    fn update_flux(&mut self, store: &mut FieldStore) {
        let ndim = store.grid.ndim;
        let d = store.grid.spacing;
        let temperature = &store.thermal.temperature;
        let k = &self.coeffs.conductivity;
        let steps = &self.steps;
        for (a, q) in store.thermal.flux.iter_mut().enumerate().take(ndim) {
            let range = q.interior_range();
            self.ctx.launch(&range, q, |p, v| {
                let grad = (temperature.at(p) - temperature.at(step_down(p, a))) / d[a];
                let k_face = center_to_face(k, a, p);
                v + (-v - k_face * grad) / (1.0 + steps.theta_r_face(a, p))
            });
            self.applicator.apply_heat_flux(q, a, &self.bc);
        }
    }

    /// Energy residual and implicit temperature update.
    fn update_temperature(&mut self, store: &mut FieldStore, dt: f64) {
        let ndim = store.grid.ndim;
        let d = store.grid.spacing;
        let inv_dt = if dt.is_finite() { 1.0 / dt } else { 0.0 };
        let range = self.residual.interior_range();

        let flux = &store.thermal.flux;
        let old = &store.thermal.temperature_old;
        let rho_cp = &self.coeffs.rho_cp;
        let source = &self.source;
        let adiabatic = &self.adiabatic;
        let div_q = |p: Position| -> f64 {
            (0..ndim)
                .map(|a| (flux[a].at(step_up(p, a)) - flux[a].at(p)) / d[a])
                .sum()
        };
        {
            let temperature = &store.thermal.temperature;
            self.ctx.launch(&range, &mut self.residual, |p, _| {
                let t = temperature.at(p);
                -rho_cp.at(p) * (t - old.at(p)) * inv_dt - div_q(p) + source.at(p) + adiabatic.at(p) * t
            });
        }
        let dtau = &self.steps.dtau_rho;
        self.ctx.launch(&range, &mut store.thermal.temperature, |p, t| {
            let h = source.at(p) + adiabatic.at(p) * t;
            let dtau = dtau.at(p);
            (t + dtau * (rho_cp.at(p) * old.at(p) * inv_dt - div_q(p) + h))
                / (1.0 + dtau * rho_cp.at(p) * inv_dt)
        });
    }

    /// Runs the iteration for physical step `dt` (`f64::INFINITY` for
    /// steady state).
    pub fn solve(&mut self, store: &mut FieldStore, dt: f64) -> RheonResult<SolveReport> {
        let start = Instant::now();
        self.check_store(store, dt)?;
        let solver = self.config.solver.clone();
        let max_iterations = solver.max_iterations;
        let check_interval = solver.check_interval;
        let rank = self.ctx.comm.rank().0;

        debug!(rank, dt, max_iterations, "Thermal solve started");

        self.apply_boundary(store)?;
        self.update_coefficients(store, dt)?;

        let mut monitor = ConvergenceMonitor::new(&solver);
        let mut status = SolveStatus::NonConvergence;
        let mut iterations = 0;

        for iter in 1..=max_iterations {
            iterations = iter;
            self.update_flux(store);
            self.update_temperature(store, dt);
            self.apply_boundary(store)?;

            let check = iter % check_interval == 0 || iter == max_iterations;
            if self.config.latent_heat && check {
                self.update_coefficients(store, dt)?;
            }
            if check {
                let range = self.residual.interior_range();
                let state = ResidualState {
                    iteration: iter,
                    energy: residual_norm(&self.ctx, &self.residual, &range, solver.norm)?,
                    ..ResidualState::default()
                };
                let decision = monitor.check(state);
                debug!(rank, iter, energy = state.energy, "Thermal convergence check");
                if decision == Decision::Converged {
                    status = SolveStatus::Converged;
                    break;
                }
            }
        }

        let report = SolveReport {
            status,
            iterations,
            residual: monitor.last(),
            increases: monitor.increases(),
            history: monitor.into_history(),
            clamped_viscosity: 0,
            wall_time: start.elapsed().as_secs_f64(),
        };
        if report.converged() {
            info!(
                rank,
                iterations,
                residual = report.residual.energy,
                wall_time = report.wall_time,
                "Thermal solve converged"
            );
        } else {
            warn!(
                rank,
                iterations,
                residual = report.residual.energy,
                "Thermal solve did not converge"
            );
        }
        Ok(report)
    }
}

impl PtSolver for ThermalSolver {
    fn solve(&mut self, store: &mut FieldStore, dt: f64) -> RheonResult<SolveReport> {
        ThermalSolver::solve(self, store, dt)
    }

    fn name(&self) -> &str {
        "thermal_apt"
    }
}
