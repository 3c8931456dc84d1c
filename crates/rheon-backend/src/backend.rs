//! Compute backend trait and CPU implementations.
//!
//! The [`ComputeBackend`] trait defines the one operation every solver
//! component uses for grid work: apply a pointwise kernel over an index
//! range, writing into a field. Kernels receive the storage position and
//! the current value at that position, and may read any other field.

use rayon::prelude::*;
use rheon_grid::{Field, IndexRange, Position};

use crate::comm::ReduceOp;

/// A pointwise kernel: `(position, current value) -> new value`.
pub type Kernel<'a> = dyn Fn(Position, f64) -> f64 + Sync + 'a;

/// A pointwise read-only kernel used in reductions.
pub type ReadKernel<'a> = dyn Fn(Position) -> f64 + Sync + 'a;

/// Trait for compute backends.
///
/// All stencil and elementwise work in the solver goes through this
/// trait, so swapping the backend changes where kernels run without
/// touching solver logic.
///
/// # Implementations
/// - [`SerialBackend`] — Single-threaded reference
/// - [`ThreadedBackend`] — rayon, split along the outermost storage axis
pub trait ComputeBackend: Send + Sync {
    /// Returns the backend name (e.g., "serial", "threaded").
    fn name(&self) -> &str;

    /// Sets `out[p] = kernel(p, out[p])` for every `p` in `range`.
    ///
    /// Positions outside `range` are untouched. There is an implicit
    /// barrier on return.
    fn launch(&self, range: &IndexRange, out: &mut Field, kernel: &Kernel<'_>);

    /// Folds `kernel(p)` over `range` with `op`.
    ///
    /// The fold order is fixed for a given range, so repeated calls give
    /// bit-identical results.
    fn reduce(&self, range: &IndexRange, kernel: &ReadKernel<'_>, op: ReduceOp) -> f64;

    /// Returns true if kernels run on more than one thread.
    fn is_parallel(&self) -> bool;
}

/// Single-threaded backend, the correctness reference.
pub struct SerialBackend;

impl SerialBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SerialBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for SerialBackend {
    fn name(&self) -> &str {
        "serial"
    }

    fn launch(&self, range: &IndexRange, out: &mut Field, kernel: &Kernel<'_>) {
        for p in range.positions() {
            let i = out.index(p);
            out.data[i] = kernel(p, out.data[i]);
        }
    }

    fn reduce(&self, range: &IndexRange, kernel: &ReadKernel<'_>, op: ReduceOp) -> f64 {
        op.fold(range.positions().map(kernel))
    }

    fn is_parallel(&self) -> bool {
        false
    }
}

/// Thread-parallel backend using rayon.
///
/// The field is split into slabs along its outermost storage axis
/// (z in 3-D, y in 2-D); each slab is processed by one task.
/// Reductions fold each slab in storage order, then fold the slab
/// results in slab order.
pub struct ThreadedBackend {
    pool: Option<rayon::ThreadPool>,
}

impl ThreadedBackend {
    /// Uses rayon's global pool.
    pub fn new() -> Self {
        Self { pool: None }
    }

    /// Uses a dedicated pool with `threads` workers.
    pub fn with_threads(threads: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
        Ok(Self { pool: Some(pool) })
    }

    /// Number of worker threads kernels run on.
    pub fn threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

impl Default for ThreadedBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Outermost storage axis with more than one slab, and its slab size.
fn slab_layout(shape: [usize; 3]) -> (usize, usize) {
    if shape[2] > 1 {
        (2, shape[0] * shape[1])
    } else {
        (1, shape[0])
    }
}

impl ComputeBackend for ThreadedBackend {
    fn name(&self) -> &str {
        "threaded"
    }

    fn launch(&self, range: &IndexRange, out: &mut Field, kernel: &Kernel<'_>) {
        if range.is_empty() {
            return;
        }
        let shape = out.shape;
        let (axis, stride) = slab_layout(shape);
        let (lo, hi) = (range.lo[axis], range.hi[axis]);
        self.install(|| {
            out.data
                .par_chunks_mut(stride)
                .enumerate()
                .filter(|(s, _)| *s >= lo && *s < hi)
                .for_each(|(s, slab)| {
                    let base = s * stride;
                    for p in range.slice(axis, s).positions() {
                        let i = p[0] + shape[0] * (p[1] + shape[1] * p[2]) - base;
                        slab[i] = kernel(p, slab[i]);
                    }
                });
        });
    }

    fn reduce(&self, range: &IndexRange, kernel: &ReadKernel<'_>, op: ReduceOp) -> f64 {
        if range.is_empty() {
            return op.identity();
        }
        let axis = if range.extent(2) > 1 { 2 } else { 1 };
        let partials: Vec<f64> = self.install(|| {
            (range.lo[axis]..range.hi[axis])
                .into_par_iter()
                .map(|s| op.fold(range.slice(axis, s).positions().map(kernel)))
                .collect()
        });
        op.fold(partials)
    }

    fn is_parallel(&self) -> bool {
        self.threads() > 1
    }
}
