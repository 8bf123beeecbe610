//! `hwv.toml` runner configuration
//!
//! Every field has a default, so an empty file is a valid configuration.

use crate::error::{ManifestError, Result};
use hwv_sim::SimulationConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub runner: RunnerSection,
    pub formal: FormalSection,
    pub sim: SimulationConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSection {
    /// Identity matched against `require_runners` / `exclude_runners`
    pub name: String,
    /// Tasks run concurrently
    pub jobs: usize,
    /// Per-task limit; 0 disables it
    pub timeout_secs: u64,
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            name: "hwv".to_string(),
            jobs: 4,
            timeout_secs: 300,
        }
    }
}

impl RunnerSection {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormalSection {
    /// Bound given to formal tasks that leave theirs at 0
    pub default_bound: u32,
    pub refinement_iterations: u32,
}

impl Default for FormalSection {
    fn default() -> Self {
        Self {
            default_bound: 20,
            refinement_iterations: 256,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.runner.name.trim().is_empty() {
            return Err(ManifestError::Validation(
                "runner.name must not be empty".to_string(),
            ));
        }
        if self.runner.jobs == 0 {
            return Err(ManifestError::Validation(
                "runner.jobs must be at least 1".to_string(),
            ));
        }
        if self.formal.default_bound == 0 {
            return Err(ManifestError::Validation(
                "formal.default_bound must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwv_sim::OracleKind;

    #[test]
    fn test_empty_config_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.runner.timeout(), Some(Duration::from_secs(300)));
        assert_eq!(config.sim.max_cycles, 1_000_000);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            [runner]
            jobs = 2
            timeout_secs = 0

            [sim]
            oracle = "random"
            seed = 9
            "#,
        )
        .unwrap();
        assert_eq!(config.runner.name, "hwv");
        assert_eq!(config.runner.jobs, 2);
        assert_eq!(config.runner.timeout(), None);
        assert_eq!(config.sim.oracle, OracleKind::Random);
        assert_eq!(config.sim.seed, 9);
        assert!(!config.sim.capture_trace);
        assert_eq!(config.formal.refinement_iterations, 256);
    }

    #[test]
    fn test_zero_jobs_rejected() {
        let config: Config = toml::from_str("[runner]\njobs = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ManifestError::Validation(_))));
    }
}
