//! Halo plane layout for neighbour exchange.
//!
//! Along a decomposed axis neighbouring subdomains share their
//! interface node: it is the first node of the upper subdomain and the
//! last node of the lower one. The upper subdomain owns it, so nodal
//! fields send one extra plane downward.
//!
//! With `g` the ghost width and `n` the interior extent along the axis:
//!
//! | field | toward Low sends | toward High sends |
//! |---|---|---|
//! | centered | `[g]` | `[g+n-1]` |
//! | nodal | `[g, g+1]` | `[g+n-2]` |
//!
//! The receiver writes planes from its High neighbour at the top of its
//! storage (`[g+n]`, or `[g+n-1, g+n]` for nodal) and planes from its
//! Low neighbour into `[g-1]`. Destination indices are always derived
//! from the receiver's own extents.

use serde::{Deserialize, Serialize};
use rheon_types::{RheonError, RheonResult};

use crate::field::Field;

/// One side of an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Low,
    High,
}

impl Side {
    /// Both sides, low first.
    pub const BOTH: [Side; 2] = [Side::Low, Side::High];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Side::Low => 0,
            Side::High => 1,
        }
    }

    #[inline]
    pub fn opposite(self) -> Side {
        match self {
            Side::Low => Side::High,
            Side::High => Side::Low,
        }
    }
}

/// Storage planes of `field` sent to the neighbour on side `toward`.
pub fn send_planes(field: &Field, axis: usize, toward: Side) -> Vec<usize> {
    let g = field.ghost[axis];
    let n = field.interior[axis];
    let nodal = field.location.is_nodal(axis);
    match (toward, nodal) {
        (Side::Low, false) => vec![g],
        (Side::Low, true) => vec![g, g + 1],
        (Side::High, false) => vec![g + n - 1],
        (Side::High, true) => vec![g + n - 2],
    }
}

/// Storage planes of `field` filled from the neighbour on side `from`.
pub fn recv_planes(field: &Field, axis: usize, from: Side) -> Vec<usize> {
    let g = field.ghost[axis];
    let n = field.interior[axis];
    let nodal = field.location.is_nodal(axis);
    match (from, nodal) {
        (Side::Low, _) => vec![g - 1],
        (Side::High, false) => vec![g + n],
        (Side::High, true) => vec![g + n - 1, g + n],
    }
}

/// Packs the planes destined for the neighbour on side `toward`.
pub fn pack(field: &Field, axis: usize, toward: Side) -> Vec<f64> {
    let planes = send_planes(field, axis, toward);
    let mut buf = Vec::with_capacity(planes.len() * field.plane_len(axis));
    for index in planes {
        buf.extend(field.extract_plane(axis, index));
    }
    buf
}

/// Unpacks planes received from the neighbour on side `from`.
///
/// Fails with [`RheonError::HaloMismatch`] when the buffer length does
/// not match the planes this field expects.
pub fn unpack(field: &mut Field, axis: usize, from: Side, data: &[f64]) -> RheonResult<()> {
    let planes = recv_planes(field, axis, from);
    let plane_len = field.plane_len(axis);
    let expected = planes.len() * plane_len;
    if data.len() != expected {
        return Err(RheonError::HaloMismatch {
            axis,
            expected,
            found: data.len(),
        });
    }
    for (chunk, index) in data.chunks(plane_len).zip(planes) {
        field.insert_plane(axis, index, chunk)?;
    }
    Ok(())
}

/// Periodic self-exchange along `axis`, as if the subdomain were its
/// own neighbour on both sides.
pub fn wrap(field: &mut Field, axis: usize) -> RheonResult<()> {
    if field.ghost[axis] == 0 {
        return Ok(());
    }
    let to_low = pack(field, axis, Side::Low);
    let to_high = pack(field, axis, Side::High);
    unpack(field, axis, Side::High, &to_low)?;
    unpack(field, axis, Side::Low, &to_high)
}
