//! Regular grid geometry.
//!
//! A [`Grid`] describes a box of uniformly spaced cells in 2-D or 3-D.
//! Two-dimensional grids are stored with the z axis inactive: one cell,
//! unit spacing, and no ghost layer, so every array keeps a `[_; 3]`
//! shape and kernels stay dimension-generic.
//!
//! Storage coordinates are used everywhere below: on an active axis the
//! first interior cell (or node) sits at storage index `GHOST_WIDTH`.

use serde::{Deserialize, Serialize};
use rheon_types::constants::GHOST_WIDTH;
use rheon_types::{RheonError, RheonResult};

use crate::location::Location;

/// Uniform staggered-grid geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    /// Number of active dimensions (2 or 3).
    pub ndim: usize,
    /// Cell counts per axis. `cells[2] == 1` in 2-D.
    pub cells: [usize; 3],
    /// Cell spacing per axis (m).
    pub spacing: [f64; 3],
    /// Coordinate of the lower domain corner (m).
    pub origin: [f64; 3],
}

impl Grid {
    /// Creates a 2-D grid with `cells` cells spanning `lengths` metres.
    pub fn new_2d(cells: [usize; 2], lengths: [f64; 2]) -> RheonResult<Self> {
        let grid = Self {
            ndim: 2,
            cells: [cells[0], cells[1], 1],
            spacing: [
                lengths[0] / cells[0].max(1) as f64,
                lengths[1] / cells[1].max(1) as f64,
                1.0,
            ],
            origin: [0.0; 3],
        };
        grid.validate()?;
        Ok(grid)
    }

    /// Creates a 3-D grid with `cells` cells spanning `lengths` metres.
    pub fn new_3d(cells: [usize; 3], lengths: [f64; 3]) -> RheonResult<Self> {
        let grid = Self {
            ndim: 3,
            cells,
            spacing: [
                lengths[0] / cells[0].max(1) as f64,
                lengths[1] / cells[1].max(1) as f64,
                lengths[2] / cells[2].max(1) as f64,
            ],
            origin: [0.0; 3],
        };
        grid.validate()?;
        Ok(grid)
    }

    /// Returns a copy of this grid translated to `origin`.
    pub fn with_origin(mut self, origin: [f64; 3]) -> Self {
        self.origin = origin;
        self
    }

    /// Validates the geometry.
    ///
    /// Checks:
    /// - 2 or 3 active dimensions
    /// - At least two cells along every active axis
    /// - Positive, finite spacing
    /// - Inactive z axis is a single unit cell
    pub fn validate(&self) -> RheonResult<()> {
        if self.ndim != 2 && self.ndim != 3 {
            return Err(RheonError::InvalidGrid(format!(
                "Grid must be 2-D or 3-D, got ndim = {}",
                self.ndim
            )));
        }
        for axis in 0..self.ndim {
            if self.cells[axis] < 2 {
                return Err(RheonError::InvalidGrid(format!(
                    "Axis {} needs at least 2 cells, got {}",
                    axis, self.cells[axis]
                )));
            }
            if !(self.spacing[axis].is_finite() && self.spacing[axis] > 0.0) {
                return Err(RheonError::InvalidGrid(format!(
                    "Axis {} spacing must be positive, got {}",
                    axis, self.spacing[axis]
                )));
            }
        }
        if self.ndim == 2 && self.cells[2] != 1 {
            return Err(RheonError::InvalidGrid(
                "2-D grid must have exactly one cell along z".into(),
            ));
        }
        Ok(())
    }

    /// Returns true if `axis` is one of the active dimensions.
    #[inline]
    pub fn is_active(&self, axis: usize) -> bool {
        axis < self.ndim
    }

    /// Ghost-layer width along `axis` (zero on the inactive z axis).
    #[inline]
    pub fn ghost(&self, axis: usize) -> usize {
        if self.is_active(axis) {
            GHOST_WIDTH
        } else {
            0
        }
    }

    /// Domain length along `axis`.
    #[inline]
    pub fn length(&self, axis: usize) -> f64 {
        self.cells[axis] as f64 * self.spacing[axis]
    }

    /// Largest active domain length (`max_lxyz`).
    pub fn max_length(&self) -> f64 {
        (0..self.ndim).map(|a| self.length(a)).fold(0.0, f64::max)
    }

    /// Smallest active cell spacing.
    pub fn min_spacing(&self) -> f64 {
        (0..self.ndim).map(|a| self.spacing[a]).fold(f64::INFINITY, f64::min)
    }

    /// Total number of interior cells.
    pub fn cell_count(&self) -> usize {
        self.cells.iter().product()
    }

    /// Interior extents of an array at `location` (cells, plus one on nodal axes).
    pub fn extents(&self, location: Location) -> [usize; 3] {
        let mut ext = self.cells;
        for (axis, e) in ext.iter_mut().enumerate() {
            if self.is_active(axis) && location.is_nodal(axis) {
                *e += 1;
            }
        }
        ext
    }

    /// Physical coordinate of storage index `idx` along `axis` for `location`.
    pub fn coordinate_along(&self, axis: usize, idx: usize, location: Location) -> f64 {
        let offset = idx as f64 - self.ghost(axis) as f64;
        let shift = if location.is_nodal(axis) || !self.is_active(axis) {
            0.0
        } else {
            0.5
        };
        self.origin[axis] + (offset + shift) * self.spacing[axis]
    }

    /// Physical coordinate of the storage position `p` at `location`.
    pub fn coordinate(&self, location: Location, p: [usize; 3]) -> [f64; 3] {
        let mut x = [0.0; 3];
        for (axis, xi) in x.iter_mut().enumerate().take(self.ndim) {
            *xi = self.coordinate_along(axis, p[axis], location);
        }
        x
    }

    /// Storage index of the cell containing coordinate `x` along `axis`,
    /// or `None` if `x` lies outside the grid.
    pub fn cell_containing(&self, axis: usize, x: f64) -> Option<usize> {
        let s = (x - self.origin[axis]) / self.spacing[axis];
        if !s.is_finite() || s < 0.0 || s >= self.cells[axis] as f64 {
            return None;
        }
        Some(s.floor() as usize + self.ghost(axis))
    }

    /// Storage index of the node nearest to coordinate `x` along `axis`,
    /// or `None` if `x` lies outside the grid.
    pub fn nearest_node(&self, axis: usize, x: f64) -> Option<usize> {
        let s = (x - self.origin[axis]) / self.spacing[axis];
        if !s.is_finite() || s < 0.0 || s > self.cells[axis] as f64 {
            return None;
        }
        Some(s.round() as usize + self.ghost(axis))
    }
}
