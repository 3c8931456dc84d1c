//! Cartesian domain decomposition.
//!
//! The global grid is split independently along each axis into
//! `dims[a]` slabs. Cells that do not divide evenly go to the leading
//! ranks, one each. Ranks are numbered x-fastest:
//! `rank = c0 + d0 * (c1 + d1 * c2)`.

use serde::{Deserialize, Serialize};
use rheon_types::{RankId, RheonError, RheonResult};

use crate::grid::Grid;
use crate::halo::Side;

/// What lies beyond one side of a subdomain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SideKind {
    /// Physical domain boundary (or a periodic axis owned by one rank).
    Boundary,
    /// Another subdomain; ghosts come from halo exchange.
    Neighbor(RankId),
}

/// One rank's share of the global grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subdomain {
    pub rank: RankId,
    /// Number of ranks along each axis.
    pub dims: [usize; 3],
    /// Position of this rank in the process grid.
    pub coords: [usize; 3],
    /// Global cell index of this subdomain's first interior cell.
    pub offset: [usize; 3],
    /// Periodicity of the global domain.
    pub periodic: [bool; 3],
    /// Local geometry (origin shifted to the subdomain corner).
    pub local: Grid,
    /// Global geometry.
    pub global: Grid,
    /// `neighbors[axis][side]`.
    pub neighbors: [[SideKind; 2]; 3],
}

impl Subdomain {
    /// The whole grid as a single rank.
    pub fn single(global: &Grid, periodic: [bool; 3]) -> RheonResult<Self> {
        let mut parts = decompose(global, [1, 1, 1], periodic)?;
        Ok(parts.remove(0))
    }

    /// Total number of ranks.
    pub fn size(&self) -> usize {
        self.dims.iter().product()
    }

    /// Neighbour kind on `side` of `axis`.
    #[inline]
    pub fn neighbor(&self, axis: usize, side: Side) -> SideKind {
        self.neighbors[axis][side.index()]
    }

    /// True if `side` of `axis` faces another subdomain.
    #[inline]
    pub fn is_interface(&self, axis: usize, side: Side) -> bool {
        matches!(self.neighbor(axis, side), SideKind::Neighbor(_))
    }

    /// True if `axis` is periodic and owned entirely by this rank, so
    /// ghosts wrap locally instead of through exchange.
    #[inline]
    pub fn wraps_locally(&self, axis: usize) -> bool {
        self.periodic[axis] && self.dims[axis] == 1 && self.local.is_active(axis)
    }

    /// True if `side` of `axis` is a physical, non-periodic wall.
    #[inline]
    pub fn is_wall(&self, axis: usize, side: Side) -> bool {
        self.local.is_active(axis) && !self.is_interface(axis, side) && !self.wraps_locally(axis)
    }
}

fn rank_of(coords: [usize; 3], dims: [usize; 3]) -> usize {
    coords[0] + dims[0] * (coords[1] + dims[1] * coords[2])
}

/// Splits `global` into `dims[0] * dims[1] * dims[2]` subdomains.
pub fn decompose(global: &Grid, dims: [usize; 3], periodic: [bool; 3]) -> RheonResult<Vec<Subdomain>> {
    global.validate()?;
    for axis in 0..3 {
        if dims[axis] == 0 {
            return Err(RheonError::InvalidConfig(format!(
                "Process grid has zero ranks along axis {}",
                axis
            )));
        }
        if !global.is_active(axis) && (dims[axis] != 1 || periodic[axis]) {
            return Err(RheonError::InvalidConfig(format!(
                "Inactive axis {} cannot be split or periodic",
                axis
            )));
        }
        if global.cells[axis] < 2 * dims[axis] && global.is_active(axis) {
            return Err(RheonError::InvalidGrid(format!(
                "Axis {} has {} cells, too few for {} ranks",
                axis, global.cells[axis], dims[axis]
            )));
        }
    }

    let total = dims.iter().product::<usize>();
    let mut parts = Vec::with_capacity(total);
    for rank in 0..total {
        let coords = [
            rank % dims[0],
            (rank / dims[0]) % dims[1],
            rank / (dims[0] * dims[1]),
        ];

        let mut local = global.clone();
        let mut offset = [0; 3];
        let mut neighbors = [[SideKind::Boundary; 2]; 3];
        for axis in 0..3 {
            let n = global.cells[axis];
            let d = dims[axis];
            let c = coords[axis];
            let base = n / d;
            let extra = n % d;
            local.cells[axis] = base + usize::from(c < extra);
            offset[axis] = c * base + c.min(extra);
            local.origin[axis] = global.origin[axis] + offset[axis] as f64 * global.spacing[axis];

            if d > 1 {
                let neighbor_at = |cc: usize| {
                    let mut nc = coords;
                    nc[axis] = cc;
                    SideKind::Neighbor(RankId(rank_of(nc, dims) as u32))
                };
                if c > 0 {
                    neighbors[axis][0] = neighbor_at(c - 1);
                } else if periodic[axis] {
                    neighbors[axis][0] = neighbor_at(d - 1);
                }
                if c + 1 < d {
                    neighbors[axis][1] = neighbor_at(c + 1);
                } else if periodic[axis] {
                    neighbors[axis][1] = neighbor_at(0);
                }
            }
        }

        parts.push(Subdomain {
            rank: RankId(rank as u32),
            dims,
            coords,
            offset,
            periodic,
            local,
            global: global.clone(),
            neighbors,
        });
    }
    Ok(parts)
}
