//! # rheon-grid
//!
//! Staggered-grid storage for the Rheon solver.
//!
//! ## Key Types
//!
//! - [`Grid`] — Uniform 2-D/3-D geometry with ghost-layer conventions.
//! - [`Location`] — Staggering of an array (center, face, edge, vertex).
//! - [`Field`] — One dense array with ghost layers and plane access.
//! - [`FieldStore`] — Every persistent array of a (sub)domain.
//! - [`Subdomain`] — One rank's share of a decomposed grid.
//!
//! Halo plane layout for neighbour exchange lives in [`halo`].

pub mod decomposition;
pub mod field;
pub mod grid;
pub mod halo;
pub mod interp;
pub mod location;
pub mod range;
pub mod store;

pub use decomposition::{decompose, SideKind, Subdomain};
pub use field::Field;
pub use grid::Grid;
pub use halo::Side;
pub use location::{shear_pairs, Location};
pub use range::{IndexRange, Position};
pub use store::{FieldStore, PhaseRatios, StokesFields, ThermalFields};
