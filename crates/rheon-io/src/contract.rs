//! Run description: the I/O boundary between a driver and the solvers.
//!
//! A [`RunConfig`] names everything a driver needs to set up a run:
//! grid and process layout, material phases, solver settings, boundary
//! conditions, physical stepping and checkpoint cadence. It is loaded
//! from TOML; every section except the grid, the phases and the step
//! plan has a default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use rheon_grid::Grid;
use rheon_material::{MaterialDatabase, PhaseTable};
use rheon_solver::{StokesConfig, TemperatureBoundary, ThermalConfig, VelocityBoundary};
use rheon_types::{RheonError, RheonResult};

/// Grid geometry, 2 or 3 entries per list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub cells: Vec<usize>,
    /// Domain lengths (m).
    pub lengths: Vec<f64>,
    /// Lower corner (m). Defaults to the origin.
    #[serde(default)]
    pub origin: Option<Vec<f64>>,
}

impl GridSpec {
    pub fn new_2d(cells: [usize; 2], lengths: [f64; 2]) -> Self {
        Self {
            cells: cells.to_vec(),
            lengths: lengths.to_vec(),
            origin: None,
        }
    }

    /// Builds and validates the grid.
    pub fn build(&self) -> RheonResult<Grid> {
        let grid = match (self.cells.as_slice(), self.lengths.as_slice()) {
            (&[nx, ny], &[lx, ly]) => Grid::new_2d([nx, ny], [lx, ly])?,
            (&[nx, ny, nz], &[lx, ly, lz]) => Grid::new_3d([nx, ny, nz], [lx, ly, lz])?,
            _ => {
                return Err(RheonError::InvalidGrid(format!(
                    "cells {:?} and lengths {:?} must both have 2 or 3 entries",
                    self.cells, self.lengths
                )))
            }
        };
        match &self.origin {
            None => Ok(grid),
            Some(origin) if origin.len() == grid.ndim => {
                let mut o = [0.0; 3];
                o[..origin.len()].copy_from_slice(origin);
                Ok(grid.with_origin(o))
            }
            Some(origin) => Err(RheonError::InvalidGrid(format!(
                "origin {:?} does not match a {}-D grid",
                origin, grid.ndim
            ))),
        }
    }
}

/// Physical stepping plan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepPlan {
    /// Physical step length (s). `inf` requests a steady solve.
    pub dt: f64,
    /// Number of physical steps.
    pub steps: u32,
}

/// Checkpoint cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointPlan {
    pub directory: PathBuf,
    /// Steps between checkpoints.
    pub every: u32,
}

/// Complete description of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Run label used in logs and output names.
    pub name: String,

    pub grid: GridSpec,

    /// Ranks along each axis.
    #[serde(default = "single_rank")]
    pub ranks: [usize; 3],

    /// Material presets by name, in phase order.
    pub phases: Vec<String>,

    pub time: StepPlan,

    #[serde(default)]
    pub stokes: StokesConfig,

    #[serde(default)]
    pub velocity_bc: VelocityBoundary,

    /// Thermal solve settings. `None` skips the thermal solve.
    #[serde(default)]
    pub thermal: Option<ThermalConfig>,

    #[serde(default)]
    pub temperature_bc: TemperatureBoundary,

    /// Uniform initial temperature (K) for the thermal solve.
    #[serde(default)]
    pub initial_temperature: f64,

    #[serde(default)]
    pub checkpoint: Option<CheckpointPlan>,
}

fn single_rank() -> [usize; 3] {
    [1, 1, 1]
}

impl RunConfig {
    /// Parses a TOML run description.
    pub fn from_toml_str(text: &str) -> RheonResult<Self> {
        toml::from_str(text).map_err(|e| RheonError::InvalidConfig(format!("run config: {}", e)))
    }

    /// Reads and parses a TOML run description.
    pub fn load(path: &Path) -> RheonResult<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Serializes to TOML.
    pub fn to_toml_string(&self) -> RheonResult<String> {
        toml::to_string(self).map_err(|e| RheonError::Serialization(format!("run config: {}", e)))
    }

    /// Periodicity flags implied by the velocity conditions.
    pub fn periodic(&self) -> [bool; 3] {
        self.velocity_bc.periodic()
    }

    /// Resolves the phase names against `db`.
    pub fn phase_table(&self, db: &MaterialDatabase) -> RheonResult<PhaseTable> {
        let names: Vec<&str> = self.phases.iter().map(String::as_str).collect();
        PhaseTable::from_database(db, &names)
    }
}
