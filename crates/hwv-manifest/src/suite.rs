//! Task suites
//!
//! A suite is a JSON file listing tasks together with the metadata that
//! decides whether a given runner picks them up. The metadata only filters;
//! it never changes how a task is checked.

use crate::config::FormalSection;
use crate::error::{ManifestError, Result};
use hwv_ir::{Circuit, FormalTask, RelationTask, SimulationTask};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Suite {
    #[serde(default)]
    pub tasks: Vec<SuiteEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteEntry {
    pub name: String,
    #[serde(default)]
    pub ignore: bool,
    /// When non-empty, only these runners pick the task up
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub require_runners: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_runners: Vec<String>,
    pub task: TaskSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskSpec {
    Formal(FormalTask),
    Relation(RelationTask),
    Simulation(SimulationTask),
    /// Every contract of the circuit, checked in isolation
    Contracts(Circuit),
}

impl TaskSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskSpec::Formal(_) => "formal",
            TaskSpec::Relation(_) => "relation",
            TaskSpec::Simulation(_) => "simulation",
            TaskSpec::Contracts(_) => "contracts",
        }
    }
}

/// Whether a runner picks up an entry, and why not
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Run,
    Ignored,
    MissingRunner,
    Excluded,
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Run => write!(f, "run"),
            Selection::Ignored => write!(f, "ignored"),
            Selection::MissingRunner => write!(f, "requires another runner"),
            Selection::Excluded => write!(f, "excluded for this runner"),
        }
    }
}

impl SuiteEntry {
    pub fn selection(&self, runner: &str) -> Selection {
        if self.ignore {
            Selection::Ignored
        } else if !self.require_runners.is_empty()
            && !self.require_runners.iter().any(|r| r == runner)
        {
            Selection::MissingRunner
        } else if self.exclude_runners.iter().any(|r| r == runner) {
            Selection::Excluded
        } else {
            Selection::Run
        }
    }
}

impl Suite {
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.tasks {
            if entry.name.trim().is_empty() {
                return Err(ManifestError::Validation(
                    "task name must not be empty".to_string(),
                ));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(ManifestError::Validation(format!(
                    "duplicate task name '{}'",
                    entry.name
                )));
            }
        }
        Ok(())
    }

    /// Give formal tasks with bound 0 the configured default bound
    pub fn apply_defaults(&mut self, formal: &FormalSection) {
        for entry in &mut self.tasks {
            if let TaskSpec::Formal(task) = &mut entry.task {
                if task.bound == 0 {
                    task.bound = formal.default_bound;
                }
            }
        }
    }

    pub fn selected<'s>(&'s self, runner: &'s str) -> impl Iterator<Item = &'s SuiteEntry> + 's {
        self.tasks
            .iter()
            .filter(move |e| e.selection(runner) == Selection::Run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> SuiteEntry {
        let mut c = Circuit::new(name);
        let a = c.add_input("a", 1);
        c.add_output(a);
        SuiteEntry {
            name: name.to_string(),
            ignore: false,
            require_runners: vec![],
            exclude_runners: vec![],
            task: TaskSpec::Relation(RelationTask::equivalence(name, c.clone(), c)),
        }
    }

    #[test]
    fn test_selection_rules() {
        let mut e = entry("t");
        assert_eq!(e.selection("ci"), Selection::Run);

        e.require_runners = vec!["nightly".to_string()];
        assert_eq!(e.selection("ci"), Selection::MissingRunner);
        assert_eq!(e.selection("nightly"), Selection::Run);

        e.exclude_runners = vec!["nightly".to_string()];
        assert_eq!(e.selection("nightly"), Selection::Excluded);

        e.ignore = true;
        assert_eq!(e.selection("nightly"), Selection::Ignored);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let suite = Suite {
            tasks: vec![entry("x"), entry("x")],
        };
        assert!(matches!(suite.validate(), Err(ManifestError::Validation(_))));
    }

    #[test]
    fn test_default_bound_fills_zero() {
        let mut c = Circuit::new("c");
        let a = c.add_input("a", 1);
        c.add_output(a);
        let mut suite = Suite {
            tasks: vec![
                SuiteEntry {
                    task: TaskSpec::Formal(FormalTask::new("zero", c.clone(), 0)),
                    ..entry("zero")
                },
                SuiteEntry {
                    task: TaskSpec::Formal(FormalTask::new("three", c, 3)),
                    ..entry("three")
                },
            ],
        };
        suite.apply_defaults(&FormalSection::default());
        let bounds: Vec<u32> = suite
            .tasks
            .iter()
            .filter_map(|e| match &e.task {
                TaskSpec::Formal(t) => Some(t.bound),
                _ => None,
            })
            .collect();
        assert_eq!(bounds, vec![20, 3]);
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(Suite {
            tasks: vec![entry("eq")],
        })
        .unwrap();
        assert_eq!(json["tasks"][0]["name"], "eq");
        assert_eq!(json["tasks"][0]["task"]["relation"]["kind"], "equivalence");
        assert!(json["tasks"][0].get("require_runners").is_none());
    }
}
