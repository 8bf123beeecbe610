//! Formal verification for hwv circuits
//!
//! This crate provides:
//! - An and-inverter graph that the circuit evaluator bit-blasts into
//! - A solver collaborator trait with an incremental `varisat` backend
//! - Bounded model checking over init/loop/circuit task regions
//! - Combinational equivalence and refinement checking
//! - JSON result reports

pub mod aig;
pub mod bmc;
pub mod equivalence;
pub mod report;
pub mod solver;

pub use bmc::{BmcOutcome, BmcReport, BoundedModelChecker, CoverResult, CoverStatus};
pub use equivalence::{Mismatch, RelationChecker, RelationOutcome, RelationReport};
pub use report::{FormalReport, ReportStatus};
pub use solver::{SatBackend, ScriptedAnswer, ScriptedBackend, SolverResponse, VarisatBackend};

use hwv_ir::{BitValue, StructuralError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormalError {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error("verification cancelled")]
    Cancelled,
}

pub type FormalResult<T> = Result<T, FormalError>;

/// Concrete witness trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counterexample {
    /// Trace length
    pub length: usize,
    pub trace: Vec<TraceStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceStep {
    pub step: usize,
    pub inputs: IndexMap<String, BitValue>,
    /// Register values going into this step
    pub registers: IndexMap<String, BitValue>,
    /// Values chosen for symbolic nodes during this step
    pub symbolics: IndexMap<String, BitValue>,
    pub outputs: IndexMap<String, BitValue>,
}

impl Counterexample {
    pub fn new(trace: Vec<TraceStep>) -> Self {
        Self {
            length: trace.len(),
            trace,
        }
    }

    /// Value of an input at a step
    pub fn input(&self, step: usize, name: &str) -> Option<&BitValue> {
        self.trace.get(step).and_then(|s| s.inputs.get(name))
    }

    /// Same trace cut to its first `len` steps
    pub fn prefix(&self, len: usize) -> Self {
        Self::new(self.trace.iter().take(len).cloned().collect())
    }
}
