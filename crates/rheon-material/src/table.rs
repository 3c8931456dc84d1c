//! Table-driven rheology provider.

use serde::{Deserialize, Serialize};
use rheon_types::{PhaseId, RheonError, RheonResult};

use crate::database::MaterialDatabase;
use crate::properties::PhaseProperties;
use crate::traits::{MaterialResponse, PointState, RheologyProvider};

/// One [`PhaseProperties`] entry per phase index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTable {
    pub phases: Vec<PhaseProperties>,
}

impl PhaseTable {
    /// Builds a table, validating every phase.
    pub fn new(phases: Vec<PhaseProperties>) -> RheonResult<Self> {
        if phases.is_empty() {
            return Err(RheonError::InvalidMaterial("phase table is empty".into()));
        }
        if phases.len() > u16::MAX as usize {
            return Err(RheonError::InvalidMaterial(format!(
                "too many phases: {}",
                phases.len()
            )));
        }
        for p in &phases {
            p.validate()?;
        }
        Ok(Self { phases })
    }

    /// Builds a table from database presets, in the given order.
    pub fn from_database(db: &MaterialDatabase, names: &[&str]) -> RheonResult<Self> {
        let phases = names
            .iter()
            .map(|&name| {
                db.get(name).cloned().ok_or_else(|| {
                    RheonError::InvalidMaterial(format!("unknown material preset '{}'", name))
                })
            })
            .collect::<RheonResult<Vec<_>>>()?;
        Self::new(phases)
    }

    /// Properties of `phase`, if it exists.
    pub fn get(&self, phase: PhaseId) -> Option<&PhaseProperties> {
        self.phases.get(phase.index())
    }
}

impl RheologyProvider for PhaseTable {
    fn nphases(&self) -> usize {
        self.phases.len()
    }

    fn evaluate(&self, phase: PhaseId, state: &PointState) -> MaterialResponse {
        // Out-of-range phases fall back to the last entry; the solver
        // checks nphases against the phase-ratio store before solving.
        let index = phase.index().min(self.phases.len().saturating_sub(1));
        self.phases[index].response(state)
    }

    fn name(&self) -> &str {
        "phase_table"
    }
}
