//! Benchmark metrics collected during a scenario run.

use serde::{Deserialize, Serialize};

use rheon_types::{RheonError, RheonResult};

/// Metrics collected from a benchmark scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkMetrics {
    /// Scenario name.
    pub scenario: String,
    /// Global cell count.
    pub cells: usize,
    /// Number of physical steps executed.
    pub timesteps: u32,
    /// Total wall-clock time (seconds).
    pub total_wall_time: f64,
    /// Average wall-clock time per step (seconds).
    pub avg_step_time: f64,
    pub min_step_time: f64,
    pub max_step_time: f64,
    /// Average Stokes iterations per step (0 without flow).
    pub avg_stokes_iterations: f64,
    /// Average thermal iterations per step (0 without heat transport).
    pub avg_thermal_iterations: f64,
    /// Whether every solve met its tolerance.
    pub all_converged: bool,
    /// Largest residual norm at the last check of the last step.
    pub final_residual: f64,
    /// Largest velocity magnitude component at the end.
    pub max_velocity: f64,
    /// Largest temperature at the end.
    pub max_temperature: f64,
    /// Points clamped to the viscosity cutoffs in the last Stokes solve.
    pub clamped_viscosity: usize,
}

impl BenchmarkMetrics {
    /// CSV header line.
    pub fn to_csv_header() -> String {
        "scenario,cells,timesteps,total_wall_time_s,avg_step_ms,min_step_ms,max_step_ms,avg_stokes_iterations,avg_thermal_iterations,converged,final_residual,max_velocity,max_temperature,clamped_viscosity".to_string()
    }

    /// Format this metrics instance as a CSV data row.
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{:.6},{:.4},{:.4},{:.4},{:.1},{:.1},{},{:.6e},{:.6e},{:.6e},{}",
            self.scenario,
            self.cells,
            self.timesteps,
            self.total_wall_time,
            self.avg_step_time * 1000.0,
            self.min_step_time * 1000.0,
            self.max_step_time * 1000.0,
            self.avg_stokes_iterations,
            self.avg_thermal_iterations,
            self.all_converged,
            self.final_residual,
            self.max_velocity,
            self.max_temperature,
            self.clamped_viscosity,
        )
    }

    /// Format multiple metrics as a complete CSV string.
    pub fn to_csv(metrics: &[BenchmarkMetrics]) -> String {
        let mut csv = Self::to_csv_header();
        for m in metrics {
            csv.push('\n');
            csv.push_str(&m.to_csv_row());
        }
        csv
    }

    /// Pretty-printed JSON array of `metrics`.
    pub fn to_json(metrics: &[BenchmarkMetrics]) -> RheonResult<String> {
        serde_json::to_string_pretty(metrics)
            .map_err(|e| RheonError::Serialization(format!("metrics: {}", e)))
    }
}
