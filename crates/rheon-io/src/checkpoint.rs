//! Per-rank checkpoint records.
//!
//! A checkpoint captures everything a rank needs to resume iterating:
//! mechanical and thermal state with their committed history, phase
//! ratios, and the physical clock. Records are serialized with
//! `bincode` and written one file per rank, named from the rank index
//! alone so a restart can find them without a manifest.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use rheon_grid::{FieldStore, Grid, PhaseRatios, StokesFields, ThermalFields};
use rheon_types::{RankId, RheonError, RheonResult};

/// Format version written into every record.
pub const CHECKPOINT_VERSION: u32 = 1;

/// File name of the record for `rank`.
pub fn file_name(rank: RankId) -> String {
    format!("checkpoint_rank{:05}.bin", rank.0)
}

/// One rank's saved state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    /// Rank that wrote the record.
    pub rank: u32,
    /// Committed physical steps.
    pub step: u64,
    /// Elapsed physical time (s).
    pub time: f64,
    /// Local grid of the rank.
    pub grid: Grid,
    /// Velocity, pressure, strain rates, stress and stress history.
    pub stokes: StokesFields,
    /// Temperature, its history and heat flux.
    pub thermal: ThermalFields,
    pub phases: PhaseRatios,
}

impl Checkpoint {
    /// Captures the state of `store` as written by `rank`.
    pub fn capture(store: &FieldStore, rank: RankId) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            rank: rank.0,
            step: store.step,
            time: store.time,
            grid: store.grid.clone(),
            stokes: store.stokes.clone(),
            thermal: store.thermal.clone(),
            phases: store.phases.clone(),
        }
    }

    /// Serializes to compact binary format.
    pub fn to_bytes(&self) -> RheonResult<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| RheonError::Serialization(format!("Checkpoint serialization failed: {}", e)))
    }

    /// Deserializes from binary format, rejecting other format versions.
    pub fn from_bytes(data: &[u8]) -> RheonResult<Self> {
        let record: Self = bincode::deserialize(data)
            .map_err(|e| RheonError::Serialization(format!("Checkpoint deserialization failed: {}", e)))?;
        if record.version != CHECKPOINT_VERSION {
            return Err(RheonError::Serialization(format!(
                "Checkpoint version {} is not supported (expected {})",
                record.version, CHECKPOINT_VERSION
            )));
        }
        Ok(record)
    }

    /// Writes the record into `dir`, creating it if needed.
    ///
    /// The file is written under a temporary name and renamed, so a
    /// crash never leaves a truncated record behind the final name.
    pub fn save(&self, dir: &Path) -> RheonResult<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(file_name(RankId(self.rank)));
        let partial = path.with_extension("bin.partial");
        let bytes = self.to_bytes()?;
        fs::write(&partial, &bytes)?;
        fs::rename(&partial, &path)?;
        info!(
            rank = self.rank,
            step = self.step,
            bytes = bytes.len(),
            path = %path.display(),
            "Checkpoint written"
        );
        Ok(path)
    }

    /// Reads the record of `rank` from `dir`.
    pub fn load(dir: &Path, rank: RankId) -> RheonResult<Self> {
        let path = dir.join(file_name(rank));
        let record = Self::from_bytes(&fs::read(&path)?)?;
        if record.rank != rank.0 {
            return Err(RheonError::InvariantViolation(format!(
                "{} holds the record of rank {}",
                path.display(),
                record.rank
            )));
        }
        debug!(rank = rank.0, step = record.step, "Checkpoint read");
        Ok(record)
    }

    /// Overwrites `store` with the saved state.
    ///
    /// `store` must describe the same local grid and phase count.
    pub fn restore(&self, store: &mut FieldStore) -> RheonResult<()> {
        if store.grid != self.grid {
            return Err(RheonError::InvalidGrid(format!(
                "Checkpoint grid {:?} does not match store grid {:?}",
                self.grid.cells, store.grid.cells
            )));
        }
        if store.phases.nphases() != self.phases.nphases() {
            return Err(RheonError::InvalidConfig(format!(
                "Checkpoint has {} phases, store has {}",
                self.phases.nphases(),
                store.phases.nphases()
            )));
        }
        let restored = self.clone().into_store()?;
        *store = restored;
        Ok(())
    }

    /// Builds a fresh store from the record.
    pub fn into_store(self) -> RheonResult<FieldStore> {
        let store = FieldStore {
            grid: self.grid,
            stokes: self.stokes,
            thermal: self.thermal,
            phases: self.phases,
            time: self.time,
            step: self.step,
        };
        store.validate()?;
        Ok(store)
    }
}
