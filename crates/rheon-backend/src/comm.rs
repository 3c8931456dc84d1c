//! Distributed-grid collaborator: halo exchange and global reductions.
//!
//! The [`Communicator`] trait is the only place subdomains synchronize.
//! Both operations are blocking collectives: every rank must call them
//! in the same order.

use rheon_grid::{Field, Subdomain};
use rheon_types::{RankId, RheonError, RheonResult};

/// Reduction operator for global and range reductions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Max,
    Min,
}

impl ReduceOp {
    /// Neutral element of the operator.
    pub fn identity(self) -> f64 {
        match self {
            ReduceOp::Sum => 0.0,
            ReduceOp::Max => f64::NEG_INFINITY,
            ReduceOp::Min => f64::INFINITY,
        }
    }

    /// Combines two partial results.
    #[inline]
    pub fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            ReduceOp::Sum => a + b,
            ReduceOp::Max => a.max(b),
            ReduceOp::Min => a.min(b),
        }
    }

    /// Folds `values` in order.
    pub fn fold(self, values: impl IntoIterator<Item = f64>) -> f64 {
        values
            .into_iter()
            .fold(self.identity(), |acc, v| self.combine(acc, v))
    }
}

/// Trait for distributed-grid collaborators.
///
/// # Implementations
/// - [`SingleProcess`] — One rank, no neighbours
/// - [`ThreadRank`](crate::thread_group::ThreadRank) — One rank of an in-process group
pub trait Communicator: Send + Sync {
    /// Returns the communicator name (e.g., "single_process").
    fn name(&self) -> &str;

    /// This rank's share of the grid.
    fn subdomain(&self) -> &Subdomain;

    /// Refreshes the ghost planes of `field` along `axis` on every side
    /// that faces a neighbouring subdomain. Physical sides are left alone.
    fn exchange(&self, field: &mut Field, axis: usize) -> RheonResult<()>;

    /// Combines `value` across all ranks. Every rank receives the same result.
    fn reduce(&self, value: f64, op: ReduceOp) -> RheonResult<f64>;

    fn rank(&self) -> RankId {
        self.subdomain().rank
    }

    fn size(&self) -> usize {
        self.subdomain().size()
    }

    /// Exchanges along every active axis in order, so corner ghosts
    /// pick up values already refreshed along earlier axes.
    fn exchange_all(&self, field: &mut Field) -> RheonResult<()> {
        for axis in 0..self.subdomain().local.ndim {
            self.exchange(field, axis)?;
        }
        Ok(())
    }
}

/// Communicator for a run that owns the whole grid.
pub struct SingleProcess {
    subdomain: Subdomain,
}

impl SingleProcess {
    /// Wraps a single-rank subdomain.
    pub fn new(subdomain: Subdomain) -> RheonResult<Self> {
        if subdomain.size() != 1 {
            return Err(RheonError::InvalidConfig(format!(
                "Single-process communicator given a {}-rank decomposition",
                subdomain.size()
            )));
        }
        Ok(Self { subdomain })
    }
}

impl Communicator for SingleProcess {
    fn name(&self) -> &str {
        "single_process"
    }

    fn subdomain(&self) -> &Subdomain {
        &self.subdomain
    }

    fn exchange(&self, _field: &mut Field, _axis: usize) -> RheonResult<()> {
        Ok(())
    }

    fn reduce(&self, value: f64, _op: ReduceOp) -> RheonResult<f64> {
        Ok(value)
    }
}
