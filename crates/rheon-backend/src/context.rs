//! Execution context handed to every solver component.
//!
//! Bundles the compute backend with the distributed-grid communicator,
//! so components never reach for a global device or process handle.

use std::sync::Arc;

use rheon_grid::{Field, Grid, IndexRange, Position, Subdomain};
use rheon_types::{RheonError, RheonResult};

use crate::backend::{ComputeBackend, SerialBackend, ThreadedBackend};
use crate::comm::{Communicator, ReduceOp, SingleProcess};

/// Backend plus communicator.
#[derive(Clone)]
pub struct ExecutionContext {
    pub backend: Arc<dyn ComputeBackend>,
    pub comm: Arc<dyn Communicator>,
}

impl ExecutionContext {
    pub fn new(backend: Arc<dyn ComputeBackend>, comm: Arc<dyn Communicator>) -> Self {
        Self { backend, comm }
    }

    /// Serial backend on a single rank owning `grid`.
    pub fn serial(grid: &Grid, periodic: [bool; 3]) -> RheonResult<Self> {
        let comm = SingleProcess::new(Subdomain::single(grid, periodic)?)?;
        Ok(Self::new(Arc::new(SerialBackend::new()), Arc::new(comm)))
    }

    /// rayon backend on a single rank owning `grid`.
    pub fn threaded(grid: &Grid, periodic: [bool; 3]) -> RheonResult<Self> {
        let comm = SingleProcess::new(Subdomain::single(grid, periodic)?)?;
        Ok(Self::new(Arc::new(ThreadedBackend::new()), Arc::new(comm)))
    }

    /// This rank's subdomain.
    pub fn subdomain(&self) -> &Subdomain {
        self.comm.subdomain()
    }

    /// Local grid geometry.
    pub fn grid(&self) -> &Grid {
        &self.comm.subdomain().local
    }

    /// Applies `kernel` over `range` of `out` on the backend.
    pub fn launch(
        &self,
        range: &IndexRange,
        out: &mut Field,
        kernel: impl Fn(Position, f64) -> f64 + Sync,
    ) {
        self.backend.launch(range, out, &kernel);
    }

    /// Folds `kernel` over `range` on this rank only.
    pub fn reduce_local(
        &self,
        range: &IndexRange,
        op: ReduceOp,
        kernel: impl Fn(Position) -> f64 + Sync,
    ) -> f64 {
        self.backend.reduce(range, &kernel, op)
    }

    /// Folds `kernel` over `range` on every rank and combines the results.
    pub fn reduce_global(
        &self,
        range: &IndexRange,
        op: ReduceOp,
        kernel: impl Fn(Position) -> f64 + Sync,
    ) -> RheonResult<f64> {
        let local = self.reduce_local(range, op, kernel);
        self.comm.reduce(local, op)
    }

    /// Refreshes neighbour-facing ghosts of `field` along every active axis.
    pub fn exchange(&self, field: &mut Field) -> RheonResult<()> {
        self.comm.exchange_all(field)
    }

    // ─── Field helpers ───────────────────────────────────────

    /// Sets every stored value of `field` to `value`.
    pub fn fill(&self, field: &mut Field, value: f64) {
        let range = field.full_range();
        self.launch(&range, field, |_, _| value);
    }

    /// Copies every stored value of `src` into `dst`.
    pub fn copy(&self, dst: &mut Field, src: &Field) -> RheonResult<()> {
        check_layout(dst, src)?;
        let range = dst.full_range();
        self.launch(&range, dst, |p, _| src.at(p));
        Ok(())
    }
}

fn check_layout(dst: &Field, src: &Field) -> RheonResult<()> {
    if !dst.same_layout(src) {
        return Err(RheonError::InvariantViolation(format!(
            "Field layout mismatch: {} {:?} vs {} {:?}",
            dst.location.label(),
            dst.shape,
            src.location.label(),
            src.shape
        )));
    }
    Ok(())
}
