//! Run validation.
//!
//! Checks a run description before any solver is built, so data-level
//! errors surface with clear diagnostics instead of deep inside an
//! iteration.

use rheon_grid::{decompose, FieldStore, Grid};
use rheon_material::MaterialDatabase;
use rheon_types::{RheonError, RheonResult};

use crate::contract::RunConfig;

/// Validates a complete run description against `db`.
///
/// Checks:
/// - Grid geometry and that the process grid can split it
/// - Every phase name resolves and every phase is physically valid
/// - Solver configs and boundary conditions are in range
/// - Velocity and temperature periodicity agree
/// - Step plan and checkpoint cadence are usable
pub fn validate_run(run: &RunConfig, db: &MaterialDatabase) -> RheonResult<Grid> {
    let grid = run.grid.build()?;
    validate_layout(&grid, run.ranks, run.periodic())?;

    if run.phases.is_empty() {
        return Err(RheonError::InvalidConfig("At least one phase is required".into()));
    }
    run.phase_table(db)?;

    run.stokes.validate()?;
    run.velocity_bc.validate()?;
    if let Some(thermal) = &run.thermal {
        thermal.validate()?;
        run.temperature_bc.validate()?;
        if run.temperature_bc.periodic() != run.periodic() {
            return Err(RheonError::InvalidConfig(format!(
                "temperature periodicity {:?} differs from velocity periodicity {:?}",
                run.temperature_bc.periodic(),
                run.periodic()
            )));
        }
    }

    if !(run.time.dt > 0.0) {
        return Err(RheonError::InvalidConfig(format!(
            "Physical time step must be positive, got {}",
            run.time.dt
        )));
    }
    if run.time.steps == 0 {
        return Err(RheonError::InvalidConfig("At least one physical step is required".into()));
    }
    if let Some(plan) = &run.checkpoint {
        if plan.every == 0 {
            return Err(RheonError::InvalidConfig("checkpoint cadence must be positive".into()));
        }
    }
    Ok(grid)
}

/// Checks that `ranks` can split `grid` with the given periodicity.
pub fn validate_layout(grid: &Grid, ranks: [usize; 3], periodic: [bool; 3]) -> RheonResult<()> {
    decompose(grid, ranks, periodic).map(|_| ())
}

/// Checks a store against the grid it is meant to run on.
pub fn validate_store(store: &FieldStore, grid: &Grid) -> RheonResult<()> {
    if &store.grid != grid {
        return Err(RheonError::InvalidGrid(format!(
            "store grid {:?} does not match run grid {:?}",
            store.grid.cells, grid.cells
        )));
    }
    store.validate()?;
    store.phases.check_sums()
}
