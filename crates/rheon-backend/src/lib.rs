//! # rheon-backend
//!
//! Execution layer for the Rheon solver.
//!
//! Provides a [`ComputeBackend`] trait with two implementations:
//! - [`SerialBackend`] — Single-threaded reference
//! - [`ThreadedBackend`] — rayon data-parallel execution
//!
//! and a [`Communicator`] trait for halo exchange and global reductions:
//! - [`SingleProcess`] — One rank owning the whole grid
//! - [`ThreadRank`] — One rank of an in-process [`ThreadGroup`]
//!
//! Both are bundled in an [`ExecutionContext`] that every solver
//! component receives at construction.

pub mod backend;
pub mod comm;
pub mod context;
pub mod thread_group;

pub use backend::{ComputeBackend, SerialBackend, ThreadedBackend};
pub use comm::{Communicator, ReduceOp, SingleProcess};
pub use context::ExecutionContext;
pub use thread_group::{ThreadGroup, ThreadRank};
