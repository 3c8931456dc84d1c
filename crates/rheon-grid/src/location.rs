//! Staggering locations on the grid.
//!
//! A location records, per axis, whether an array sits on grid nodes
//! (cell boundaries) or on cell centers along that axis:
//!
//! | Location | nodal axes |
//! |---|---|
//! | cell center | none |
//! | face normal to `a` | `a` |
//! | edge `(a, b)` | `a`, `b` |
//! | vertex | all active axes |
//!
//! In 2-D the single shear edge `(0, 1)` coincides with the vertex.

use serde::{Deserialize, Serialize};

/// Staggering location of a grid array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// `nodal[a]` is true when the array lives on nodes along axis `a`.
    pub nodal: [bool; 3],
}

impl Location {
    /// Cell centers.
    pub const CENTER: Location = Location { nodal: [false; 3] };

    /// Face normal to `axis` (velocity component `axis`).
    pub fn face(axis: usize) -> Self {
        let mut nodal = [false; 3];
        nodal[axis] = true;
        Self { nodal }
    }

    /// Edge nodal along axes `a` and `b` (shear-stress component `ab`).
    pub fn edge(a: usize, b: usize) -> Self {
        let mut nodal = [false; 3];
        nodal[a] = true;
        nodal[b] = true;
        Self { nodal }
    }

    /// Cell vertices for a grid with `ndim` active axes.
    pub fn vertex(ndim: usize) -> Self {
        let mut nodal = [false; 3];
        for n in nodal.iter_mut().take(ndim) {
            *n = true;
        }
        Self { nodal }
    }

    #[inline]
    pub fn is_nodal(&self, axis: usize) -> bool {
        self.nodal[axis]
    }

    /// Returns true for cell centers.
    pub fn is_center(&self) -> bool {
        !self.nodal.iter().any(|&n| n)
    }

    /// Short human-readable tag, used in diagnostics.
    pub fn label(&self) -> &'static str {
        match self.nodal {
            [false, false, false] => "center",
            [true, false, false] => "face_x",
            [false, true, false] => "face_y",
            [false, false, true] => "face_z",
            [true, true, false] => "edge_xy",
            [true, false, true] => "edge_xz",
            [false, true, true] => "edge_yz",
            [true, true, true] => "vertex",
        }
    }
}

/// Shear-stress axis pairs for a grid with `ndim` active axes.
///
/// 2-D: `[(0, 1)]`. 3-D: `[(0, 1), (0, 2), (1, 2)]`.
pub fn shear_pairs(ndim: usize) -> &'static [(usize, usize)] {
    const PAIRS_2D: [(usize, usize); 1] = [(0, 1)];
    const PAIRS_3D: [(usize, usize); 3] = [(0, 1), (0, 2), (1, 2)];
    if ndim == 3 {
        &PAIRS_3D
    } else {
        &PAIRS_2D
    }
}

/// Index into [`shear_pairs`] of the unordered pair `{a, b}`, if any.
pub fn shear_index(ndim: usize, a: usize, b: usize) -> Option<usize> {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    shear_pairs(ndim).iter().position(|&p| p == (lo, hi))
}

/// The axis of a 3-D shear pair along which the edge is cell-centered.
pub fn centered_axis(pair: (usize, usize)) -> usize {
    3 - pair.0 - pair.1
}
