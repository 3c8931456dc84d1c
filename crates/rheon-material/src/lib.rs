//! # rheon-material
//!
//! Rheology provider abstraction and reference material laws.
//!
//! ## Design
//!
//! The [`RheologyProvider`] trait answers one question: how does phase
//! `i` respond at a given point state? The solver mixes the per-phase
//! answers by volume fraction and never evaluates laws itself, so
//! providers can be swapped without touching solver code.
//!
//! [`PhaseTable`] is the shipped provider: one [`PhaseProperties`] per
//! phase, built from constant or Arrhenius creep, Drucker–Prager
//! plasticity, linear melting and a linearized equation of state.
//! The [`MaterialDatabase`] stores named presets.

pub mod database;
pub mod laws;
pub mod properties;
pub mod table;
pub mod traits;

pub use database::MaterialDatabase;
pub use laws::{CreepLaw, DensityLaw, DruckerPrager, MeltingLaw};
pub use properties::PhaseProperties;
pub use table::PhaseTable;
pub use traits::{MaterialResponse, PointState, RheologyProvider};
