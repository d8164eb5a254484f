//! Drill configuration
//!
//! Every domain-sensitive threshold lives here rather than in code:
//! tolerance wants to be tighter for tactical material than for quiet
//! positions, and review intervals are a policy choice.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::scheduler::ReviewSchedule;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrillConfig {
    /// Centipawn band below the best move still counted as acceptable.
    pub tolerance_cp: i32,
    /// Per-move analysis time budget, milliseconds.
    pub eval_budget_ms: u64,
    /// Retries after a failed evaluation before unavailability surfaces.
    pub eval_retries: u32,
    /// UCI engine binary path or name.
    pub engine_path: String,
    pub schedule: ReviewSchedule,
}

impl Default for DrillConfig {
    fn default() -> Self {
        Self {
            tolerance_cp: 100,
            eval_budget_ms: 500,
            eval_retries: 1,
            engine_path: "stockfish".to_string(),
            schedule: ReviewSchedule::default(),
        }
    }
}

impl DrillConfig {
    pub fn eval_budget(&self) -> Duration {
        Duration::from_millis(self.eval_budget_ms)
    }

    /// Loads configuration from a JSON file; missing fields fall back to
    /// their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let config: DrillConfig = serde_json::from_str(r#"{"tolerance_cp": 60}"#).unwrap();
        assert_eq!(config.tolerance_cp, 60);
        assert_eq!(config.eval_budget_ms, 500);
        assert_eq!(config.engine_path, "stockfish");
        assert_eq!(config.schedule, ReviewSchedule::default());
    }

    #[test]
    fn schedule_overrides_nest() {
        let config: DrillConfig =
            serde_json::from_str(r#"{"schedule": {"learning_interval_secs": 3600}}"#).unwrap();
        assert_eq!(config.schedule.learning_interval_secs, 3600);
        assert_eq!(config.schedule.reviewing_interval_secs, 604_800);
    }
}
