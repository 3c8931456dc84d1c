//! Rectangular index ranges in storage coordinates.

use serde::{Deserialize, Serialize};

/// A storage position `[i, j, k]`.
pub type Position = [usize; 3];

/// Half-open box of storage positions `lo <= p < hi` (per axis).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRange {
    pub lo: Position,
    pub hi: Position,
}

impl IndexRange {
    pub fn new(lo: Position, hi: Position) -> Self {
        Self { lo, hi }
    }

    /// Number of positions along `axis`.
    #[inline]
    pub fn extent(&self, axis: usize) -> usize {
        self.hi[axis].saturating_sub(self.lo[axis])
    }

    /// Total number of positions in the range.
    pub fn len(&self) -> usize {
        (0..3).map(|a| self.extent(a)).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `p` lies inside the range.
    pub fn contains(&self, p: Position) -> bool {
        (0..3).all(|a| p[a] >= self.lo[a] && p[a] < self.hi[a])
    }

    /// Copy of this range with the lower bound of `axis` replaced.
    pub fn with_lo(mut self, axis: usize, lo: usize) -> Self {
        self.lo[axis] = lo;
        self
    }

    /// Copy of this range with the (exclusive) upper bound of `axis` replaced.
    pub fn with_hi(mut self, axis: usize, hi: usize) -> Self {
        self.hi[axis] = hi;
        self
    }

    /// Restricts the range to a single index along `axis`.
    pub fn slice(self, axis: usize, index: usize) -> Self {
        self.with_lo(axis, index).with_hi(axis, index + 1)
    }

    /// Iterates positions in storage order (x fastest).
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        let (lo, hi) = (self.lo, self.hi);
        (lo[2]..hi[2]).flat_map(move |k| {
            (lo[1]..hi[1]).flat_map(move |j| (lo[0]..hi[0]).map(move |i| [i, j, k]))
        })
    }
}

/// Offsets `p` by `+1` along `axis`.
#[inline]
pub fn step_up(mut p: Position, axis: usize) -> Position {
    p[axis] += 1;
    p
}

/// Offsets `p` by `-1` along `axis`.
#[inline]
pub fn step_down(mut p: Position, axis: usize) -> Position {
    p[axis] -= 1;
    p
}
