//! Benchmark runner: drives a scenario's solvers over its physical steps
//! and collects metrics.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use rheon_backend::{ExecutionContext, ReduceOp, SerialBackend, ThreadGroup};
use rheon_grid::{decompose, FieldStore};
use rheon_material::RheologyProvider;
use rheon_solver::{PhaseRatioInterpolator, PtSolver, SolveReport, StokesSolver, ThermalSolver};
use rheon_telemetry::{EventBus, EventEmitter, EventKind};
use rheon_types::{RheonError, RheonResult};

use crate::metrics::BenchmarkMetrics;
use crate::scenarios::{Scenario, ScenarioKind};

/// Runs benchmark scenarios and collects metrics.
pub struct BenchmarkRunner;

impl BenchmarkRunner {
    /// Runs `scenario` on the serial backend.
    pub fn run(scenario: &Scenario, bus: &EventBus) -> RheonResult<BenchmarkMetrics> {
        let ctx = ExecutionContext::serial(&scenario.grid, scenario.periodic())?;
        Self::run_in(ctx, scenario, bus)
    }

    /// Runs `scenario` on the local grid of `ctx`.
    pub fn run_in(ctx: ExecutionContext, scenario: &Scenario, bus: &EventBus) -> RheonResult<BenchmarkMetrics> {
        Self::run_with(ctx, scenario, Some(&bus.emitter()))
    }

    /// Runs `scenario` split over `ranks` threads, one subdomain each.
    ///
    /// Only rank 0 emits telemetry. Every rank computes the same
    /// metrics apart from wall times; rank 0's are returned.
    pub fn run_distributed(scenario: &Scenario, ranks: [usize; 3], bus: &EventBus) -> RheonResult<BenchmarkMetrics> {
        let parts = decompose(&scenario.grid, ranks, scenario.periodic())?;
        let emitter = bus.emitter();
        let results = ThreadGroup::new(parts).run(|comm| {
            let ctx = ExecutionContext::new(Arc::new(SerialBackend::new()), Arc::new(comm));
            let events = (ctx.comm.rank().0 == 0).then_some(&emitter);
            Self::run_with(ctx, scenario, events)
        })?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RheonError::InvalidConfig("process grid has no ranks".into()))
    }

    /// Each step solves Stokes first, then heat transport, so shear
    /// heating sees the new flow. The step is committed whether or not
    /// the solves converged; non-convergence shows up in the metrics
    /// and as telemetry warnings.
    fn run_with(
        ctx: ExecutionContext,
        scenario: &Scenario,
        events: Option<&EventEmitter>,
    ) -> RheonResult<BenchmarkMetrics> {
        scenario.validate()?;
        let provider: Arc<dyn RheologyProvider> = scenario.phases.clone();
        let mut store = FieldStore::new(ctx.grid().clone(), provider.nphases())?;

        if !scenario.markers.is_empty() {
            let report = PhaseRatioInterpolator::new(ctx.clone()).interpolate(&mut store, &scenario.markers)?;
            emit(
                events,
                0,
                EventKind::PhaseRatioCorrection {
                    max_correction: report.max_correction,
                    filled_bins: report.filled_bins as u64,
                },
            );
        }

        let mut stokes = match &scenario.stokes {
            Some(setup) => Some(StokesSolver::new(
                ctx.clone(),
                setup.config.clone(),
                setup.boundary.clone(),
                provider.clone(),
            )?),
            None => None,
        };
        let mut thermal = match &scenario.thermal {
            Some(setup) => {
                ctx.fill(&mut store.thermal.temperature, setup.initial_temperature);
                store.thermal.commit();
                Some(ThermalSolver::new(
                    ctx.clone(),
                    setup.config.clone(),
                    setup.boundary.clone(),
                    provider.clone(),
                )?)
            }
            None => None,
        };

        let mut step_times = Vec::with_capacity(scenario.timesteps as usize);
        let mut stokes_iterations = 0u64;
        let mut thermal_iterations = 0u64;
        let mut all_converged = true;
        let mut final_residual = 0.0;
        let mut clamped_viscosity = 0;

        let total_start = Instant::now();
        for step in 0..scenario.timesteps {
            let step_start = Instant::now();
            emit(
                events,
                step,
                EventKind::StepBegin {
                    time: store.time,
                    dt: scenario.dt,
                },
            );

            let mut residual: f64 = 0.0;
            if let Some(solver) = stokes.as_mut() {
                let report = solve_with_events(solver, &mut store, scenario.dt, step, events)?;
                stokes_iterations += u64::from(report.iterations);
                all_converged &= report.converged();
                clamped_viscosity = report.clamped_viscosity;
                residual = residual.max(report.residual.max());
            }
            if let Some(solver) = thermal.as_mut() {
                let report = solve_with_events(solver, &mut store, scenario.dt, step, events)?;
                thermal_iterations += u64::from(report.iterations);
                all_converged &= report.converged();
                residual = residual.max(report.residual.max());
            }
            final_residual = residual;

            store.commit_step(scenario.dt);
            let wall_time = step_start.elapsed().as_secs_f64();
            step_times.push(wall_time);
            emit(events, step, EventKind::StepEnd { wall_time });
        }
        let total_wall_time = total_start.elapsed().as_secs_f64();

        let local_velocity = store
            .stokes
            .velocity
            .iter()
            .map(|v| v.max_abs_interior())
            .fold(0.0, f64::max);
        let max_velocity = ctx.comm.reduce(local_velocity, ReduceOp::Max)?;
        let max_temperature = ctx
            .comm
            .reduce(store.thermal.temperature.max_abs_interior(), ReduceOp::Max)?;

        let steps = f64::from(scenario.timesteps);
        let metrics = BenchmarkMetrics {
            scenario: scenario.name.clone(),
            cells: scenario.grid.cell_count(),
            timesteps: scenario.timesteps,
            total_wall_time,
            avg_step_time: step_times.iter().sum::<f64>() / steps,
            min_step_time: step_times.iter().copied().fold(f64::MAX, f64::min),
            max_step_time: step_times.iter().copied().fold(0.0, f64::max),
            avg_stokes_iterations: stokes_iterations as f64 / steps,
            avg_thermal_iterations: thermal_iterations as f64 / steps,
            all_converged,
            final_residual,
            max_velocity,
            max_temperature,
            clamped_viscosity,
        };

        if metrics.all_converged {
            info!(
                scenario = %metrics.scenario,
                rank = ctx.comm.rank().0,
                steps = metrics.timesteps,
                wall_time = metrics.total_wall_time,
                "Benchmark finished"
            );
        } else {
            warn!(
                scenario = %metrics.scenario,
                rank = ctx.comm.rank().0,
                residual = metrics.final_residual,
                "Benchmark finished with unconverged solves"
            );
        }
        Ok(metrics)
    }

    /// Run all scenarios and return metrics for each.
    pub fn run_all(bus: &EventBus) -> RheonResult<Vec<BenchmarkMetrics>> {
        let mut results = Vec::new();
        for &kind in ScenarioKind::all() {
            let scenario = Scenario::from_kind(kind)?;
            results.push(Self::run(&scenario, bus)?);
        }
        Ok(results)
    }
}

fn emit(events: Option<&EventEmitter>, step: u32, kind: EventKind) {
    if let Some(emitter) = events {
        emitter.emit_kind(step, kind);
    }
}

/// Runs one solve, bracketing it with telemetry events.
fn solve_with_events(
    solver: &mut dyn PtSolver,
    store: &mut FieldStore,
    dt: f64,
    step: u32,
    events: Option<&EventEmitter>,
) -> RheonResult<SolveReport> {
    let name = solver.name().to_string();
    emit(events, step, EventKind::SolveBegin { solver: name.clone() });
    let report = solver.solve(store, dt)?;
    for check in &report.history {
        emit(
            events,
            step,
            EventKind::ConvergenceCheck {
                solver: name.clone(),
                iteration: check.iteration,
                residual: check.max(),
            },
        );
    }
    if report.clamped_viscosity > 0 {
        emit(
            events,
            step,
            EventKind::ViscosityClamped {
                count: report.clamped_viscosity as u64,
            },
        );
    }
    emit(
        events,
        step,
        EventKind::SolveEnd {
            solver: name,
            iterations: report.iterations,
            residual: report.residual.max(),
            converged: report.converged(),
            wall_time: report.wall_time,
        },
    );
    Ok(report)
}
