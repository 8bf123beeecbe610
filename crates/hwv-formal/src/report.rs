//! JSON reports for formal results
//!
//! One [`FormalReport`] per checked task, in a shape that is stable enough
//! for dashboards and CI tooling to consume.

use crate::bmc::{BmcOutcome, BmcReport, CoverResult};
use crate::equivalence::{RelationOutcome, RelationReport};
use crate::Counterexample;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pass,
    Fail,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormalReport {
    pub task: String,
    /// `bmc`, `equivalence` or `refinement`
    pub check: String,
    pub status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Step of the violation or of the inconclusive query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterexample: Option<Counterexample>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub covers: Vec<CoverResult>,
    pub time_ms: u64,
}

impl FormalReport {
    pub fn from_bmc(report: &BmcReport, time_ms: u64) -> Self {
        let (status, detail, step, counterexample) = match &report.outcome {
            BmcOutcome::HoldsUpToBound { bound } => (
                ReportStatus::Pass,
                Some(format!("no violation within {} steps", bound)),
                None,
                None,
            ),
            BmcOutcome::Violated {
                step,
                property,
                counterexample,
            } => (
                ReportStatus::Fail,
                Some(format!("'{}' violated", property)),
                Some(*step),
                Some(counterexample.clone()),
            ),
            BmcOutcome::Inconclusive { step, reason } => {
                (ReportStatus::Unknown, Some(reason.clone()), Some(*step), None)
            }
        };
        Self {
            task: report.task.clone(),
            check: "bmc".to_string(),
            status,
            detail,
            step,
            counterexample,
            covers: report.covers.clone(),
            time_ms,
        }
    }

    pub fn from_relation(report: &RelationReport, time_ms: u64) -> Self {
        let (status, detail, counterexample) = match &report.outcome {
            RelationOutcome::Proven => (ReportStatus::Pass, None, None),
            RelationOutcome::NotProven {
                reason,
                counterexample,
            } => (
                ReportStatus::Fail,
                Some(match reason {
                    crate::Mismatch::Signature { detail } => {
                        format!("signature mismatch: {}", detail)
                    }
                    crate::Mismatch::Outputs => "outputs differ".to_string(),
                }),
                counterexample.clone(),
            ),
            RelationOutcome::Inconclusive { reason } => {
                (ReportStatus::Unknown, Some(reason.clone()), None)
            }
        };
        let check = match report.kind {
            hwv_ir::RelationKind::Equivalence => "equivalence",
            hwv_ir::RelationKind::Refinement => "refinement",
        };
        Self {
            task: report.task.clone(),
            check: check.to_string(),
            status,
            detail,
            step: None,
            counterexample,
            covers: Vec::new(),
            time_ms,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report as JSON to a file
    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self).map_err(std::io::Error::other)
    }
}
