//! The field store: every persistent array of a simulation.
//!
//! Velocities live on faces, pressure and temperature on cell centers,
//! normal stresses on centers and shear stresses on edges. Each solver
//! borrows the store mutably for the duration of one solve call.

use serde::{Deserialize, Serialize};
use rheon_types::constants::PHASE_RATIO_EPSILON;
use rheon_types::{PhaseId, RheonError, RheonResult};

use crate::field::Field;
use crate::grid::Grid;
use crate::interp::{edge_product_to_center, vertex_to_edge};
use crate::location::{shear_pairs, Location};
use crate::range::Position;

/// Mechanical state: velocity, pressure, strain rate, stress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StokesFields {
    /// Velocity component `a` on faces normal to `a`.
    pub velocity: Vec<Field>,
    /// Pressure at centers.
    pub pressure: Field,
    /// Pressure of the last committed step.
    pub pressure_old: Field,
    /// Normal deviatoric strain rates at centers.
    pub strain_diag: Vec<Field>,
    /// Shear strain rates on edges, ordered as [`shear_pairs`].
    pub strain_shear: Vec<Field>,
    /// Normal deviatoric stresses at centers.
    pub stress_diag: Vec<Field>,
    /// Shear stresses on edges.
    pub stress_shear: Vec<Field>,
    /// Normal stresses of the last committed step.
    pub stress_diag_old: Vec<Field>,
    /// Shear stresses of the last committed step.
    pub stress_shear_old: Vec<Field>,
}

impl StokesFields {
    pub fn new(grid: &Grid) -> Self {
        let faces: Vec<Field> = (0..grid.ndim).map(|a| Field::new(grid, Location::face(a))).collect();
        let centers = || -> Vec<Field> {
            (0..grid.ndim).map(|_| Field::new(grid, Location::CENTER)).collect()
        };
        let edges = || -> Vec<Field> {
            shear_pairs(grid.ndim)
                .iter()
                .map(|&(a, b)| Field::new(grid, Location::edge(a, b)))
                .collect()
        };
        Self {
            velocity: faces,
            pressure: Field::new(grid, Location::CENTER),
            pressure_old: Field::new(grid, Location::CENTER),
            strain_diag: centers(),
            strain_shear: edges(),
            stress_diag: centers(),
            stress_shear: edges(),
            stress_diag_old: centers(),
            stress_shear_old: edges(),
        }
    }

    /// Second invariant of the strain rate at center `p`.
    pub fn strain_rate_ii(&self, p: Position) -> f64 {
        second_invariant(&self.strain_diag, &self.strain_shear, p)
    }

    /// Second invariant of the committed stress at center `p`.
    pub fn stress_ii_old(&self, p: Position) -> f64 {
        second_invariant(&self.stress_diag_old, &self.stress_shear_old, p)
    }

    /// Second invariant of the current stress at center `p`.
    pub fn stress_ii(&self, p: Position) -> f64 {
        second_invariant(&self.stress_diag, &self.stress_shear, p)
    }

    /// Deviatoric work rate `τ : ε̇` at center `p`.
    pub fn work_rate(&self, p: Position) -> f64 {
        let diag: f64 = self
            .stress_diag
            .iter()
            .zip(&self.strain_diag)
            .map(|(t, e)| t.at(p) * e.at(p))
            .sum();
        let ndim = self.velocity.len();
        let shear: f64 = shear_pairs(ndim)
            .iter()
            .enumerate()
            .map(|(s, &pair)| {
                edge_product_to_center(&self.stress_shear[s], &self.strain_shear[s], pair, p)
            })
            .sum();
        diag + 2.0 * shear
    }

    /// Copies the current stress and pressure into the committed history.
    pub fn commit(&mut self) {
        for (old, new) in self.stress_diag_old.iter_mut().zip(&self.stress_diag) {
            old.data.copy_from_slice(&new.data);
        }
        for (old, new) in self.stress_shear_old.iter_mut().zip(&self.stress_shear) {
            old.data.copy_from_slice(&new.data);
        }
        self.pressure_old.data.copy_from_slice(&self.pressure.data);
    }
}

/// `sqrt(½ Σ s_ij²)` at center `p`, shear terms averaged from edges.
fn second_invariant(diag: &[Field], shear: &[Field], p: Position) -> f64 {
    let ndim = diag.len();
    let d: f64 = diag.iter().map(|f| f.at(p) * f.at(p)).sum();
    let s: f64 = shear_pairs(ndim)
        .iter()
        .enumerate()
        .map(|(i, &pair)| edge_product_to_center(&shear[i], &shear[i], pair, p))
        .sum();
    (0.5 * d + s).max(0.0).sqrt()
}

/// Thermal state: temperature and diffusive heat flux.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalFields {
    /// Temperature at centers (K).
    pub temperature: Field,
    /// Temperature of the last committed step.
    pub temperature_old: Field,
    /// Heat flux component `a` on faces normal to `a`.
    pub flux: Vec<Field>,
}

impl ThermalFields {
    pub fn new(grid: &Grid) -> Self {
        Self {
            temperature: Field::new(grid, Location::CENTER),
            temperature_old: Field::new(grid, Location::CENTER),
            flux: (0..grid.ndim).map(|a| Field::new(grid, Location::face(a))).collect(),
        }
    }

    /// Copies the current temperature into the committed history.
    pub fn commit(&mut self) {
        self.temperature_old.data.copy_from_slice(&self.temperature.data);
    }
}

/// Volume fractions of each phase at cell centers and vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRatios {
    /// One center field per phase.
    pub center: Vec<Field>,
    /// One vertex field per phase.
    pub vertex: Vec<Field>,
}

impl PhaseRatios {
    /// All-zero ratios for `nphases` phases.
    pub fn new(grid: &Grid, nphases: usize) -> Self {
        Self {
            center: (0..nphases).map(|_| Field::new(grid, Location::CENTER)).collect(),
            vertex: (0..nphases)
                .map(|_| Field::new(grid, Location::vertex(grid.ndim)))
                .collect(),
        }
    }

    /// Ratios with the whole domain (ghosts included) filled by `phase`.
    pub fn uniform(grid: &Grid, nphases: usize, phase: PhaseId) -> RheonResult<Self> {
        if phase.index() >= nphases {
            return Err(RheonError::InvalidConfig(format!(
                "Phase {} out of range for {} phases",
                phase.0, nphases
            )));
        }
        let mut ratios = Self::new(grid, nphases);
        ratios.center[phase.index()].fill(1.0);
        ratios.vertex[phase.index()].fill(1.0);
        Ok(ratios)
    }

    #[inline]
    pub fn nphases(&self) -> usize {
        self.center.len()
    }

    /// Ratio of `phase` at center `p`.
    #[inline]
    pub fn at_center(&self, phase: usize, p: Position) -> f64 {
        self.center[phase].at(p)
    }

    /// Ratio of `phase` on shear edge `pair` at `p`.
    #[inline]
    pub fn at_edge(&self, phase: usize, ndim: usize, pair: (usize, usize), p: Position) -> f64 {
        vertex_to_edge(&self.vertex[phase], ndim, pair, p)
    }

    /// Largest deviation of the per-location ratio sum from one over
    /// interior centers and vertices.
    pub fn max_sum_error(&self) -> f64 {
        let mut worst = 0.0f64;
        for fields in [&self.center, &self.vertex] {
            if let Some(first) = fields.first() {
                for p in first.interior_range().positions() {
                    let sum: f64 = fields.iter().map(|f| f.at(p)).sum();
                    worst = worst.max((sum - 1.0).abs());
                }
            }
        }
        worst
    }

    /// Returns an error if any interior ratio sum is off by more than
    /// [`PHASE_RATIO_EPSILON`].
    pub fn check_sums(&self) -> RheonResult<()> {
        let err = self.max_sum_error();
        if err > PHASE_RATIO_EPSILON {
            return Err(RheonError::InvariantViolation(format!(
                "Phase ratios deviate from unit sum by {:.3e}",
                err
            )));
        }
        Ok(())
    }
}

/// Every persistent array of a (sub)domain plus the physical clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldStore {
    /// Local grid geometry.
    pub grid: Grid,
    pub stokes: StokesFields,
    pub thermal: ThermalFields,
    pub phases: PhaseRatios,
    /// Elapsed physical time (s).
    pub time: f64,
    /// Number of committed physical steps.
    pub step: u64,
}

impl FieldStore {
    /// Allocates zeroed fields for `grid` and `nphases` material phases.
    pub fn new(grid: Grid, nphases: usize) -> RheonResult<Self> {
        grid.validate()?;
        if nphases == 0 {
            return Err(RheonError::InvalidConfig("At least one phase is required".into()));
        }
        Ok(Self {
            stokes: StokesFields::new(&grid),
            thermal: ThermalFields::new(&grid),
            phases: PhaseRatios::uniform(&grid, nphases, PhaseId(0))?,
            grid,
            time: 0.0,
            step: 0,
        })
    }

    /// Accepts the current state as the new history and advances the clock by `dt`.
    pub fn commit_step(&mut self, dt: f64) {
        self.stokes.commit();
        self.thermal.commit();
        if dt.is_finite() {
            self.time += dt;
        }
        self.step += 1;
    }

    /// Checks that every array matches the extents implied by the grid.
    pub fn validate(&self) -> RheonResult<()> {
        self.grid.validate()?;
        let check = |f: &Field, what: &str| -> RheonResult<()> {
            let expected = self.grid.extents(f.location);
            if f.interior != expected || f.data.len() != f.shape.iter().product::<usize>() {
                return Err(RheonError::InvariantViolation(format!(
                    "{} ({}) has extents {:?}, grid implies {:?}",
                    what,
                    f.location.label(),
                    f.interior,
                    expected
                )));
            }
            Ok(())
        };
        let s = &self.stokes;
        if s.velocity.len() != self.grid.ndim {
            return Err(RheonError::InvariantViolation(format!(
                "Expected {} velocity components, found {}",
                self.grid.ndim,
                s.velocity.len()
            )));
        }
        for f in &s.velocity {
            check(f, "velocity")?;
        }
        check(&s.pressure, "pressure")?;
        check(&s.pressure_old, "pressure_old")?;
        for f in s.stress_diag.iter().chain(&s.stress_diag_old).chain(&s.strain_diag) {
            check(f, "normal stress")?;
        }
        for f in s.stress_shear.iter().chain(&s.stress_shear_old).chain(&s.strain_shear) {
            check(f, "shear stress")?;
        }
        check(&self.thermal.temperature, "temperature")?;
        check(&self.thermal.temperature_old, "temperature_old")?;
        for f in &self.thermal.flux {
            check(f, "heat flux")?;
        }
        for f in self.phases.center.iter().chain(&self.phases.vertex) {
            check(f, "phase ratio")?;
        }
        Ok(())
    }
}
