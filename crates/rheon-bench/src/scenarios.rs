//! Benchmark scenarios: grid, materials, boundary conditions and step
//! plan for each test case.
//!
//! Five canonical scenarios for regression testing:
//! 1. **Lid-driven cavity** — Free-slip box sheared by a moving lid
//! 2. **Sinking block** — Dense stiff block in a weak matrix, phases from markers
//! 3. **Couette channel** — Periodic channel sheared by the top wall
//! 4. **Poiseuille channel** — Periodic channel driven by a body force
//! 5. **Heated slab** — Transient heating from a hot lower wall
//!
//! A scenario can also be built from a [`RunConfig`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use rheon_grid::{Grid, Side};
use rheon_io::{validate_run, RunConfig};
use rheon_material::{MaterialDatabase, PhaseProperties, PhaseTable};
use rheon_solver::{
    Marker, NormKind, SolverConfig, StokesConfig, TemperatureBoundary, ThermalConfig,
    VelocityBoundary, VelocitySide,
};
use rheon_types::{PhaseId, RheonError, RheonResult};

/// Which benchmark scenario to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    LidCavity,
    SinkingBlock,
    Couette,
    Poiseuille,
    HeatedSlab,
    /// Built from a run description rather than procedurally.
    Configured,
}

impl ScenarioKind {
    /// Returns all scenario kinds.
    pub fn all() -> &'static [ScenarioKind] {
        &[
            ScenarioKind::LidCavity,
            ScenarioKind::SinkingBlock,
            ScenarioKind::Couette,
            ScenarioKind::Poiseuille,
            ScenarioKind::HeatedSlab,
        ]
    }

    /// Returns a human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::LidCavity => "lid_cavity",
            ScenarioKind::SinkingBlock => "sinking_block",
            ScenarioKind::Couette => "couette",
            ScenarioKind::Poiseuille => "poiseuille",
            ScenarioKind::HeatedSlab => "heated_slab",
            ScenarioKind::Configured => "configured",
        }
    }
}

/// Mechanical part of a scenario.
#[derive(Debug, Clone)]
pub struct StokesSetup {
    pub config: StokesConfig,
    pub boundary: VelocityBoundary,
}

/// Thermal part of a scenario.
#[derive(Debug, Clone)]
pub struct ThermalSetup {
    pub config: ThermalConfig,
    pub boundary: TemperatureBoundary,
    /// Uniform initial temperature (K).
    pub initial_temperature: f64,
}

/// A fully specified benchmark scenario.
pub struct Scenario {
    /// Scenario type.
    pub kind: ScenarioKind,
    /// Label used in metrics and logs.
    pub name: String,
    /// Global grid.
    pub grid: Grid,
    /// Material phases, in phase order.
    pub phases: Arc<PhaseTable>,
    /// Material markers. Empty means the whole domain is phase 0.
    pub markers: Vec<Marker>,
    /// Stokes solve, if the scenario has flow.
    pub stokes: Option<StokesSetup>,
    /// Thermal solve, if the scenario has heat transport.
    pub thermal: Option<ThermalSetup>,
    /// Number of physical steps.
    pub timesteps: u32,
    /// Physical step length (s). Infinite for steady problems.
    pub dt: f64,
}

fn steady_config(abs_tol: f64, max_iterations: u32, gravity: [f64; 3]) -> StokesConfig {
    StokesConfig {
        solver: SolverConfig {
            abs_tol,
            rel_tol: 0.0,
            max_iterations,
            check_interval: 100,
            ..SolverConfig::default()
        },
        gravity,
        ..StokesConfig::default()
    }
}

fn single_fluid() -> RheonResult<Arc<PhaseTable>> {
    Ok(Arc::new(PhaseTable::new(vec![PhaseProperties::newtonian(
        "fluid", 1.0, 1.0,
    )])?))
}

fn moving_lid(boundary: VelocityBoundary, speed: f64) -> VelocityBoundary {
    boundary.with_side(
        1,
        Side::High,
        VelocitySide::Velocity {
            value: [speed, 0.0, 0.0],
        },
    )
}

/// Seeds `per_axis²` markers per cell of a 2-D grid, each taking the
/// phase at its own position.
pub fn seed_markers(grid: &Grid, per_axis: usize, phase_at: impl Fn([f64; 3]) -> PhaseId) -> Vec<Marker> {
    let n = per_axis.max(1);
    let mut markers = Vec::with_capacity(grid.cells[0] * grid.cells[1] * n * n);
    for j in 0..grid.cells[1] * n {
        for i in 0..grid.cells[0] * n {
            let x = grid.origin[0] + (i as f64 + 0.5) * grid.spacing[0] / n as f64;
            let y = grid.origin[1] + (j as f64 + 0.5) * grid.spacing[1] / n as f64;
            let position = [x, y, grid.origin[2]];
            markers.push(Marker::new(position, phase_at(position)));
        }
    }
    markers
}

impl Scenario {
    /// Unit cavity at 32×32, free-slip walls, lid moving at unit speed.
    pub fn lid_cavity() -> RheonResult<Self> {
        let mut config = steady_config(1e-5, 100_000, [0.0; 3]);
        config.solver.norm = NormKind::Max;
        Ok(Self {
            kind: ScenarioKind::LidCavity,
            name: ScenarioKind::LidCavity.name().into(),
            grid: Grid::new_2d([32, 32], [1.0, 1.0])?,
            phases: single_fluid()?,
            markers: Vec::new(),
            stokes: Some(StokesSetup {
                config,
                boundary: moving_lid(VelocityBoundary::free_slip(), 1.0),
            }),
            thermal: None,
            timesteps: 1,
            dt: f64::INFINITY,
        })
    }

    /// Unit box at 24×24 with a centred block, 100 times stiffer and
    /// twice as dense as the matrix, under unit gravity.
    pub fn sinking_block() -> RheonResult<Self> {
        let grid = Grid::new_2d([24, 24], [1.0, 1.0])?;
        let phases = Arc::new(PhaseTable::new(vec![
            PhaseProperties::newtonian("matrix", 1.0, 1.0),
            PhaseProperties::newtonian("block", 100.0, 2.0),
        ])?);
        let markers = seed_markers(&grid, 2, |x| {
            let inside = (x[0] - 0.5).abs() < 0.13 && (x[1] - 0.5).abs() < 0.13;
            PhaseId(u16::from(inside))
        });
        Ok(Self {
            kind: ScenarioKind::SinkingBlock,
            name: ScenarioKind::SinkingBlock.name().into(),
            grid,
            phases,
            markers,
            stokes: Some(StokesSetup {
                config: steady_config(1e-7, 200_000, [0.0, -1.0, 0.0]),
                boundary: VelocityBoundary::free_slip(),
            }),
            thermal: None,
            timesteps: 1,
            dt: f64::INFINITY,
        })
    }

    /// Channel of height 1, periodic in x, top wall moving at unit speed.
    pub fn couette() -> RheonResult<Self> {
        Ok(Self {
            kind: ScenarioKind::Couette,
            name: ScenarioKind::Couette.name().into(),
            grid: Grid::new_2d([8, 16], [0.5, 1.0])?,
            phases: single_fluid()?,
            markers: Vec::new(),
            stokes: Some(StokesSetup {
                config: steady_config(1e-10, 100_000, [0.0; 3]),
                boundary: moving_lid(VelocityBoundary::no_slip().with_periodic(0), 1.0),
            }),
            thermal: None,
            timesteps: 1,
            dt: f64::INFINITY,
        })
    }

    /// Channel of height 1, periodic in x, driven by a unit body force
    /// along the channel.
    pub fn poiseuille() -> RheonResult<Self> {
        Ok(Self {
            kind: ScenarioKind::Poiseuille,
            name: ScenarioKind::Poiseuille.name().into(),
            grid: Grid::new_2d([8, 32], [0.25, 1.0])?,
            phases: single_fluid()?,
            markers: Vec::new(),
            stokes: Some(StokesSetup {
                config: steady_config(1e-9, 200_000, [1.0, 0.0, 0.0]),
                boundary: VelocityBoundary::no_slip().with_periodic(0),
            }),
            thermal: None,
            timesteps: 1,
            dt: f64::INFINITY,
        })
    }

    /// Cold slab of unit diffusivity with the lower wall held at 1 and
    /// the upper wall at 0, stepped five times by 0.02.
    pub fn heated_slab() -> RheonResult<Self> {
        let config = ThermalConfig {
            solver: SolverConfig {
                abs_tol: 1e-10,
                rel_tol: 0.0,
                max_iterations: 100_000,
                check_interval: 100,
                ..SolverConfig::default()
            },
            ..ThermalConfig::default()
        };
        Ok(Self {
            kind: ScenarioKind::HeatedSlab,
            name: ScenarioKind::HeatedSlab.name().into(),
            grid: Grid::new_2d([4, 16], [0.25, 1.0])?,
            phases: single_fluid()?,
            markers: Vec::new(),
            stokes: None,
            thermal: Some(ThermalSetup {
                config,
                boundary: TemperatureBoundary::fixed_along(1, 1.0, 0.0),
                initial_temperature: 0.0,
            }),
            timesteps: 5,
            dt: 0.02,
        })
    }

    /// Create a scenario by kind.
    pub fn from_kind(kind: ScenarioKind) -> RheonResult<Self> {
        match kind {
            ScenarioKind::LidCavity => Self::lid_cavity(),
            ScenarioKind::SinkingBlock => Self::sinking_block(),
            ScenarioKind::Couette => Self::couette(),
            ScenarioKind::Poiseuille => Self::poiseuille(),
            ScenarioKind::HeatedSlab => Self::heated_slab(),
            ScenarioKind::Configured => Err(RheonError::InvalidConfig(
                "configured scenarios are built from a run description".into(),
            )),
        }
    }

    /// Builds a scenario from a run description, resolving its phases
    /// in `db`.
    ///
    /// The whole domain starts as phase 0; push markers to place others.
    pub fn from_run_config(run: &RunConfig, db: &MaterialDatabase) -> RheonResult<Self> {
        let grid = validate_run(run, db)?;
        let thermal = run.thermal.clone().map(|config| ThermalSetup {
            config,
            boundary: run.temperature_bc.clone(),
            initial_temperature: run.initial_temperature,
        });
        let scenario = Self {
            kind: ScenarioKind::Configured,
            name: run.name.clone(),
            grid,
            phases: Arc::new(run.phase_table(db)?),
            markers: Vec::new(),
            stokes: Some(StokesSetup {
                config: run.stokes.clone(),
                boundary: run.velocity_bc.clone(),
            }),
            thermal,
            timesteps: run.time.steps,
            dt: run.time.dt,
        };
        scenario.validate()?;
        Ok(scenario)
    }

    /// Periodicity implied by the boundary conditions.
    pub fn periodic(&self) -> [bool; 3] {
        match (&self.stokes, &self.thermal) {
            (Some(s), _) => s.boundary.periodic(),
            (None, Some(t)) => t.boundary.periodic(),
            (None, None) => [false; 3],
        }
    }

    /// Checks that the scenario can be run.
    pub fn validate(&self) -> RheonResult<()> {
        self.grid.validate()?;
        if self.stokes.is_none() && self.thermal.is_none() {
            return Err(RheonError::InvalidConfig(format!(
                "scenario '{}' has neither a Stokes nor a thermal solve",
                self.name
            )));
        }
        if self.timesteps == 0 {
            return Err(RheonError::InvalidConfig("timesteps must be positive".into()));
        }
        if !(self.dt > 0.0) {
            return Err(RheonError::InvalidConfig(format!(
                "dt must be positive, got {}",
                self.dt
            )));
        }
        if let (Some(s), Some(t)) = (&self.stokes, &self.thermal) {
            if s.boundary.periodic() != t.boundary.periodic() {
                return Err(RheonError::InvalidConfig(
                    "velocity and temperature periodicity differ".into(),
                ));
            }
        }
        Ok(())
    }
}
