//! hwv configuration and task-suite parsing
//!
//! `hwv.toml` configures the runner; task suites are JSON documents listing
//! formal, relation, simulation and contract tasks with their selection
//! metadata.

pub mod config;
pub mod error;
pub mod suite;

pub use config::{Config, FormalSection, RunnerSection};
pub use error::{ManifestError, Result};
pub use suite::{Selection, Suite, SuiteEntry, TaskSpec};

use std::path::Path;
use tracing::debug;

/// Parse a runner configuration from a file path
pub fn config_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let contents =
        std::fs::read_to_string(path.as_ref()).map_err(|e| ManifestError::Io(e.to_string()))?;
    config_from_str(&contents)
}

/// Parse a runner configuration from a string
pub fn config_from_str(s: &str) -> Result<Config> {
    let config: Config = toml::from_str(s).map_err(|e| ManifestError::Parse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Parse a task suite from a file path
pub fn suite_from_path(path: impl AsRef<Path>) -> Result<Suite> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| ManifestError::Io(e.to_string()))?;
    let suite = suite_from_str(&contents)?;
    debug!(path = %path.display(), tasks = suite.tasks.len(), "loaded task suite");
    Ok(suite)
}

/// Parse a task suite from a JSON string
pub fn suite_from_str(s: &str) -> Result<Suite> {
    let suite: Suite = serde_json::from_str(s).map_err(|e| ManifestError::Parse(e.to_string()))?;
    suite.validate()?;
    Ok(suite)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parse_error() {
        let err = config_from_str("[runner\njobs = 1").unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));
    }

    #[test]
    fn test_empty_suite() {
        let suite = suite_from_str(r#"{ "tasks": [] }"#).unwrap();
        assert!(suite.tasks.is_empty());
        assert!(suite_from_str("{}").unwrap().tasks.is_empty());
    }
}
