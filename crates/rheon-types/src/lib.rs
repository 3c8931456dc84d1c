//! # rheon-types
//!
//! Shared types, identifiers, error types, and physical constants
//! for the Rheon pseudo-transient geodynamics solver.
//!
//! This crate has zero numerical logic — it defines the vocabulary
//! that all other Rheon crates share.

pub mod constants;
pub mod error;
pub mod ids;

pub use error::{RheonError, RheonResult};
pub use ids::{PhaseId, RankId};
