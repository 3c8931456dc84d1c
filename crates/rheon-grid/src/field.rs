//! Dense staggered field with ghost layers.
//!
//! Storage is a single contiguous `Vec<f64>` in x-fastest order:
//! `idx = i + sx * (j + sy * k)`. Ghost layers of width
//! [`Grid::ghost`] pad every active axis on both sides.

use serde::{Deserialize, Serialize};
use rheon_types::{RheonError, RheonResult};

use crate::grid::Grid;
use crate::location::Location;
use crate::range::{IndexRange, Position};

/// One scalar array at a staggering location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Staggering location.
    pub location: Location,
    /// Interior extents (without ghosts).
    pub interior: [usize; 3],
    /// Ghost width per axis.
    pub ghost: [usize; 3],
    /// Storage extents (`interior + 2 * ghost`).
    pub shape: [usize; 3],
    /// Values in x-fastest order.
    pub data: Vec<f64>,
}

impl Field {
    /// Creates a zero field at `location` on `grid`.
    pub fn new(grid: &Grid, location: Location) -> Self {
        Self::filled(grid, location, 0.0)
    }

    /// Creates a field at `location` with every value (ghosts included) set to `value`.
    pub fn filled(grid: &Grid, location: Location, value: f64) -> Self {
        let interior = grid.extents(location);
        let ghost = [grid.ghost(0), grid.ghost(1), grid.ghost(2)];
        let mut shape = [0; 3];
        for a in 0..3 {
            shape[a] = interior[a] + 2 * ghost[a];
        }
        Self {
            location,
            interior,
            ghost,
            shape,
            data: vec![value; shape.iter().product()],
        }
    }

    /// Total number of stored values.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Linear index of storage position `p`.
    #[inline]
    pub fn index(&self, p: Position) -> usize {
        p[0] + self.shape[0] * (p[1] + self.shape[1] * p[2])
    }

    /// Value at storage position `p`.
    #[inline]
    pub fn at(&self, p: Position) -> f64 {
        self.data[self.index(p)]
    }

    /// Sets the value at storage position `p`.
    #[inline]
    pub fn set(&mut self, p: Position, value: f64) {
        let i = self.index(p);
        self.data[i] = value;
    }

    /// Storage positions of the interior (owned plus shared boundary) values.
    pub fn interior_range(&self) -> IndexRange {
        let mut hi = [0; 3];
        for a in 0..3 {
            hi[a] = self.ghost[a] + self.interior[a];
        }
        IndexRange::new(self.ghost, hi)
    }

    /// Every storage position, ghosts included.
    pub fn full_range(&self) -> IndexRange {
        IndexRange::new([0; 3], self.shape)
    }

    /// Sets every stored value to `value`.
    pub fn fill(&mut self, value: f64) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    /// Sets every interior value from a closure over storage positions.
    pub fn fill_with(&mut self, mut f: impl FnMut(Position) -> f64) {
        let range = self.interior_range();
        for p in range.positions() {
            let i = self.index(p);
            self.data[i] = f(p);
        }
    }

    /// Returns true if `other` has the same location and extents.
    pub fn same_layout(&self, other: &Field) -> bool {
        self.location == other.location && self.shape == other.shape && self.ghost == other.ghost
    }

    /// Copies all values (ghosts included) from `other`.
    pub fn copy_from(&mut self, other: &Field) -> RheonResult<()> {
        if !self.same_layout(other) {
            return Err(RheonError::InvariantViolation(format!(
                "Cannot copy {} field {:?} into {} field {:?}",
                other.location.label(),
                other.shape,
                self.location.label(),
                self.shape
            )));
        }
        self.data.copy_from_slice(&other.data);
        Ok(())
    }

    /// Largest absolute interior value.
    pub fn max_abs_interior(&self) -> f64 {
        self.interior_range()
            .positions()
            .map(|p| self.at(p).abs())
            .fold(0.0, f64::max)
    }

    // ─── Plane access ─────────────────────────────────────────

    /// Number of values in one storage plane normal to `axis`.
    pub fn plane_len(&self, axis: usize) -> usize {
        (0..3).filter(|&a| a != axis).map(|a| self.shape[a]).product()
    }

    fn plane_range(&self, axis: usize, index: usize) -> IndexRange {
        self.full_range().slice(axis, index)
    }

    /// Copies the full storage plane `index` normal to `axis` into a vector.
    pub fn extract_plane(&self, axis: usize, index: usize) -> Vec<f64> {
        self.plane_range(axis, index)
            .positions()
            .map(|p| self.at(p))
            .collect()
    }

    /// Overwrites storage plane `index` normal to `axis` with `values`.
    ///
    /// Fails with [`RheonError::HaloMismatch`] if the number of values
    /// does not match this field's plane size.
    pub fn insert_plane(&mut self, axis: usize, index: usize, values: &[f64]) -> RheonResult<()> {
        let expected = self.plane_len(axis);
        if values.len() != expected {
            return Err(RheonError::HaloMismatch {
                axis,
                expected,
                found: values.len(),
            });
        }
        let range = self.plane_range(axis, index);
        for (p, &v) in range.positions().zip(values) {
            let i = self.index(p);
            self.data[i] = v;
        }
        Ok(())
    }

    /// Sets plane `dst` normal to `axis` to `f(plane src)` pointwise.
    pub fn map_plane(&mut self, axis: usize, src: usize, dst: usize, f: impl Fn(f64) -> f64) {
        let range = self.plane_range(axis, dst);
        for p in range.positions() {
            let mut q = p;
            q[axis] = src;
            let v = f(self.at(q));
            self.set(p, v);
        }
    }

    /// Copies plane `src` normal to `axis` onto plane `dst`.
    pub fn copy_plane(&mut self, axis: usize, src: usize, dst: usize) {
        self.map_plane(axis, src, dst, |v| v);
    }

    /// Sets every value of plane `index` normal to `axis` to `value`.
    pub fn fill_plane(&mut self, axis: usize, index: usize, value: f64) {
        let range = self.plane_range(axis, index);
        for p in range.positions() {
            self.set(p, value);
        }
    }
}
