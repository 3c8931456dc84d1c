//! Marker-to-grid phase ratios.
//!
//! Markers are binned into the cell containing them and onto the
//! nearest vertex. A vertex on a subdomain interface or a periodic seam
//! has a copy on each side, and the copies sum their counts before
//! normalizing, so vertex ratios do not depend on the decomposition.
//! Each bin's per-phase counts are divided by its total count. Empty bins inherit the ratios of the first non-empty bin
//! reached by a breadth-first walk over face neighbours, so ratios are
//! defined everywhere as long as the subdomain holds at least one
//! marker.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::warn;

use rheon_backend::ExecutionContext;
use rheon_grid::{Field, FieldStore, Grid, IndexRange, Location, PhaseRatios, Position, Side};
use rheon_types::constants::{PHASE_RATIO_EPSILON, PHASE_RATIO_WARN_THRESHOLD};
use rheon_types::{PhaseId, RheonError, RheonResult};

use crate::boundary::BoundaryApplicator;

/// A material marker supplied by the particle engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Physical coordinates (m). Unused components are ignored.
    pub position: [f64; 3],
    pub phase: PhaseId,
}

impl Marker {
    pub fn new(position: [f64; 3], phase: PhaseId) -> Self {
        Self { position, phase }
    }
}

/// Diagnostics of one interpolation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseRatioReport {
    /// Markers that fell inside this subdomain.
    pub markers_used: usize,
    /// Bins (centers plus vertices) that inherited a neighbour's ratios.
    pub filled_bins: usize,
    /// Largest renormalization applied to a ratio sum.
    pub max_correction: f64,
}

/// Converts markers into [`PhaseRatios`].
pub struct PhaseRatioInterpolator {
    ctx: ExecutionContext,
    bc: BoundaryApplicator,
}

impl PhaseRatioInterpolator {
    pub fn new(ctx: ExecutionContext) -> Self {
        let bc = BoundaryApplicator::new(ctx.clone());
        Self { ctx, bc }
    }

    /// Rebuilds `store.phases` from `markers`.
    pub fn interpolate(&self, store: &mut FieldStore, markers: &[Marker]) -> RheonResult<PhaseRatioReport> {
        let nphases = store.phases.nphases();
        let grid = self.ctx.grid().clone();
        if let Some(m) = markers.iter().find(|m| m.phase.index() >= nphases) {
            return Err(RheonError::InvalidConfig(format!(
                "Marker phase {} out of range for {} phases",
                m.phase.0, nphases
            )));
        }

        let mut center = vec![Field::new(&grid, Location::CENTER); nphases];
        let mut vertex = vec![Field::new(&grid, Location::vertex(grid.ndim)); nphases];
        let mut used = 0;
        for m in markers {
            let Some(c) = bin(&grid, m.position, |axis, x| grid.cell_containing(axis, x)) else {
                continue;
            };
            used += 1;
            let ci = center[m.phase.index()].index(c);
            center[m.phase.index()].data[ci] += 1.0;
            if let Some(v) = bin(&grid, m.position, |axis, x| grid.nearest_node(axis, x)) {
                let vi = vertex[m.phase.index()].index(v);
                vertex[m.phase.index()].data[vi] += 1.0;
            }
        }
        if used == 0 {
            return Err(RheonError::InvalidConfig(format!(
                "No markers inside subdomain of rank {}",
                self.ctx.comm.rank().0
            )));
        }

        for counts in vertex.iter_mut() {
            self.merge_shared_nodes(counts)?;
        }
        let mut filled = normalize_counts(&mut center);
        filled += normalize_counts(&mut vertex);

        let mut ratios = PhaseRatios { center, vertex };
        let max_correction = self.finish(&mut ratios)?;
        store.phases = ratios;

        Ok(PhaseRatioReport {
            markers_used: used,
            filled_bins: filled,
            max_correction,
        })
    }

    /// Sets ratios from a closure mapping a coordinate to its phase.
    ///
    /// Centers and vertices each take the phase at their own coordinate.
    pub fn set_with(
        &self,
        store: &mut FieldStore,
        phase_at: impl Fn([f64; 3]) -> PhaseId,
    ) -> RheonResult<()> {
        let nphases = store.phases.nphases();
        let grid = self.ctx.grid().clone();
        let mut ratios = PhaseRatios::new(&grid, nphases);
        for fields in [&mut ratios.center, &mut ratios.vertex] {
            let location = fields[0].location;
            let range = fields[0].interior_range();
            for p in range.positions() {
                let phase = phase_at(grid.coordinate(location, p));
                if phase.index() >= nphases {
                    return Err(RheonError::InvalidConfig(format!(
                        "Phase {} out of range for {} phases",
                        phase.0, nphases
                    )));
                }
                fields[phase.index()].set(p, 1.0);
            }
        }
        self.finish(&mut ratios)?;
        store.phases = ratios;
        Ok(())
    }

    /// Renormalizes interior sums, then refreshes ghosts.
    ///
    /// Returns the largest correction applied.
    pub fn normalize(&self, ratios: &mut PhaseRatios) -> RheonResult<f64> {
        self.finish(ratios)
    }

    /// Sums the counts held by both copies of every shared node plane.
    ///
    /// Every rank exchanges along every axis that does not wrap locally,
    /// in the same order, whether or not it has an interface there.
    fn merge_shared_nodes(&self, counts: &mut Field) -> RheonResult<()> {
        let sub = self.ctx.subdomain();
        for axis in 0..sub.local.ndim {
            let g = counts.ghost[axis];
            let last = g + counts.interior[axis] - 1;
            if sub.wraps_locally(axis) {
                let sum = add_planes(&counts.extract_plane(axis, g), &counts.extract_plane(axis, last));
                counts.insert_plane(axis, g, &sum)?;
                counts.insert_plane(axis, last, &sum)?;
                continue;
            }
            // Plane last - 1 is what travels upward, so it carries our
            // interface count to the rank above.
            let mut remote = counts.clone();
            remote.copy_plane(axis, last, last - 1);
            self.ctx.comm.exchange(&mut remote, axis)?;
            if sub.is_interface(axis, Side::High) {
                let sum = add_planes(&counts.extract_plane(axis, last), &remote.extract_plane(axis, last));
                counts.insert_plane(axis, last, &sum)?;
            }
            if sub.is_interface(axis, Side::Low) {
                let sum = add_planes(&counts.extract_plane(axis, g), &remote.extract_plane(axis, g - 1));
                counts.insert_plane(axis, g, &sum)?;
            }
        }
        Ok(())
    }

    fn finish(&self, ratios: &mut PhaseRatios) -> RheonResult<f64> {
        let correction = renormalize(&mut ratios.center).max(renormalize(&mut ratios.vertex));
        if correction > PHASE_RATIO_WARN_THRESHOLD {
            warn!(
                rank = self.ctx.comm.rank().0,
                correction, "Phase ratios renormalized"
            );
        }
        for f in ratios.center.iter_mut().chain(ratios.vertex.iter_mut()) {
            self.bc.refresh_scalar(f)?;
        }
        Ok(correction)
    }
}

/// Storage position of the bin holding `x`, or `None` outside the grid.
fn bin(grid: &Grid, x: [f64; 3], locate: impl Fn(usize, f64) -> Option<usize>) -> Option<Position> {
    let mut p = [0; 3];
    for (axis, pa) in p.iter_mut().enumerate().take(grid.ndim) {
        *pa = locate(axis, x[axis])?;
    }
    Some(p)
}

fn add_planes(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

/// Turns per-phase counts into ratios, filling empty bins breadth-first.
///
/// Returns the number of bins that were filled from a neighbour.
fn normalize_counts(fields: &mut [Field]) -> usize {
    let range = fields[0].interior_range();
    let total = |fields: &[Field], p: Position| -> f64 { fields.iter().map(|f| f.at(p)).sum() };

    let mut known = vec![false; fields[0].len()];
    let mut queue = VecDeque::new();
    for p in range.positions() {
        let sum = total(fields, p);
        if sum > 0.0 {
            for f in fields.iter_mut() {
                let i = f.index(p);
                f.data[i] /= sum;
            }
            known[fields[0].index(p)] = true;
            queue.push_back(p);
        }
    }

    let mut filled = 0;
    while let Some(p) = queue.pop_front() {
        for q in face_neighbors(&range, p) {
            let qi = fields[0].index(q);
            if known[qi] {
                continue;
            }
            known[qi] = true;
            for f in fields.iter_mut() {
                let v = f.at(p);
                f.data[qi] = v;
            }
            filled += 1;
            queue.push_back(q);
        }
    }
    filled
}

/// Face neighbours of `p` inside `range`, in axis order, low side first.
fn face_neighbors(range: &IndexRange, p: Position) -> impl Iterator<Item = Position> + '_ {
    (0..3).flat_map(move |axis| {
        let lo = (p[axis] > range.lo[axis]).then(|| {
            let mut q = p;
            q[axis] -= 1;
            q
        });
        let hi = (p[axis] + 1 < range.hi[axis]).then(|| {
            let mut q = p;
            q[axis] += 1;
            q
        });
        lo.into_iter().chain(hi)
    })
}

/// Clamps ratios to [0, 1] and rescales interior sums to one.
///
/// Returns the largest sum deviation that was corrected.
fn renormalize(fields: &mut [Field]) -> f64 {
    let Some(first) = fields.first() else {
        return 0.0;
    };
    let range = first.interior_range();
    let mut worst = 0.0f64;
    for p in range.positions() {
        for f in fields.iter_mut() {
            let v = f.at(p).clamp(0.0, 1.0);
            f.set(p, v);
        }
        let sum: f64 = fields.iter().map(|f| f.at(p)).sum();
        let err = (sum - 1.0).abs();
        worst = worst.max(err);
        if err > PHASE_RATIO_EPSILON * 1e-3 && sum > 0.0 {
            for f in fields.iter_mut() {
                let v = f.at(p) / sum;
                f.set(p, v);
            }
        }
    }
    worst
}
