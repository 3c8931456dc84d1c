//! Strongly-typed identifiers.
//!
//! Newtype wrappers prevent accidental mixing of phase indices
//! with rank indices or axis numbers.

use serde::{Deserialize, Serialize};

/// Index of a material phase in the rheology provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhaseId(pub u16);

/// Index of a distributed subdomain (process or thread rank).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RankId(pub u32);

impl PhaseId {
    /// Returns the raw index as `usize` for array indexing.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl RankId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<u16> for PhaseId {
    fn from(val: u16) -> Self {
        Self(val)
    }
}

impl From<u32> for RankId {
    fn from(val: u32) -> Self {
        Self(val)
    }
}
