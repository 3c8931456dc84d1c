//! # rheon-io
//!
//! Run descriptions, pre-run validation and per-rank checkpoints.
//!
//! ## Key Types
//!
//! - [`RunConfig`] — TOML-loadable description of a run
//! - [`Checkpoint`] — One rank's saved state, serialized with bincode
//! - [`validate_run`] — Structural checks before any solver is built

pub mod checkpoint;
pub mod contract;
pub mod validator;

pub use checkpoint::{file_name, Checkpoint, CHECKPOINT_VERSION};
pub use contract::{CheckpointPlan, GridSpec, RunConfig, StepPlan};
pub use validator::{validate_layout, validate_run, validate_store};
