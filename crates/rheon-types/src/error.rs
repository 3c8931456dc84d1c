//! Error types for the Rheon solver.
//!
//! All crates return `RheonResult<T>` from fallible operations. Only
//! structural problems are errors; recoverable numerical conditions
//! (non-convergence, clamping, renormalization) are reported through
//! solver diagnostics instead.

use thiserror::Error;

/// Unified error type for the Rheon workspace.
#[derive(Debug, Error)]
pub enum RheonError {
    /// Grid geometry is malformed or inconsistent.
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    /// Material parameter is out of valid range.
    #[error("Invalid material parameter: {0}")]
    InvalidMaterial(String),

    /// Configuration value is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Neighbouring subdomains disagree on the shape of a shared halo plane.
    #[error("Halo mismatch on axis {axis}: expected {expected} values, received {found}")]
    HaloMismatch {
        axis: usize,
        expected: usize,
        found: usize,
    },

    /// A collective operation could not complete (peer gone or timed out).
    #[error("Communication failure: {0}")]
    Communication(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A field invariant was violated (e.g., extents that do not match the grid).
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

/// Convenience alias for `Result<T, RheonError>`.
pub type RheonResult<T> = Result<T, RheonError>;
