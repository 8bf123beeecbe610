//! hwv task runner
//!
//! Runs the entries of a task suite: selection, bounded concurrency,
//! per-task timeouts and cooperative cancellation. The checks themselves are
//! synchronous and run on the blocking thread pool.

use hwv_formal::{
    BmcOutcome, BoundedModelChecker, FormalError, FormalReport, RelationChecker, RelationOutcome,
    VarisatBackend,
};
use hwv_ir::{check_contracts, CancelToken, FormalTask};
use hwv_manifest::{Config, Selection, Suite, SuiteEntry, TaskSpec};
use hwv_sim::{SimulationConfig, SimulationError, Simulator};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

pub use hwv_formal as formal;
pub use hwv_ir as ir;
pub use hwv_manifest as manifest;
pub use hwv_sim as sim;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Skipped,
    Passed,
    Inconclusive,
    Failed,
    Error,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Skipped => "skipped",
            Verdict::Passed => "passed",
            Verdict::Inconclusive => "inconclusive",
            Verdict::Failed => "FAILED",
            Verdict::Error => "error",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub name: String,
    pub kind: String,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub time_ms: u64,
    /// Check-specific report, as written by `--report`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<serde_json::Value>,
}

impl TaskResult {
    fn new(entry: &SuiteEntry, verdict: Verdict, detail: Option<String>) -> Self {
        Self {
            name: entry.name.clone(),
            kind: entry.task.kind().to_string(),
            verdict,
            detail,
            time_ms: 0,
            report: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub results: Vec<TaskResult>,
}

impl RunSummary {
    pub fn count(&self, verdict: Verdict) -> usize {
        self.results.iter().filter(|r| r.verdict == verdict).count()
    }

    /// One-line summary, e.g. `3 passed, 1 failed, 0 inconclusive, 0 errors, 2 skipped`
    pub fn summary(&self) -> String {
        format!(
            "{} passed, {} failed, {} inconclusive, {} errors, {} skipped",
            self.count(Verdict::Passed),
            self.count(Verdict::Failed),
            self.count(Verdict::Inconclusive),
            self.count(Verdict::Error),
            self.count(Verdict::Skipped),
        )
    }

    /// 0 when everything selected passed, 1 on any failure or error, 2 when
    /// the worst result is inconclusive
    pub fn exit_code(&self) -> i32 {
        match self.results.iter().map(|r| r.verdict).max() {
            Some(Verdict::Failed) | Some(Verdict::Error) => 1,
            Some(Verdict::Inconclusive) => 2,
            _ => 0,
        }
    }

    /// Write one JSON file per executed task into `dir`
    pub fn write_reports(&self, dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(dir)?;
        for result in self.results.iter().filter(|r| r.verdict != Verdict::Skipped) {
            let path = dir.join(format!("{}.json", sanitize(&result.name)));
            let json = serde_json::to_string_pretty(result).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Identity used for task selection
    pub runner: String,
    pub jobs: usize,
    pub timeout: Option<Duration>,
    /// Only run tasks whose name contains this
    pub filter: Option<String>,
    pub refinement_iterations: u32,
    pub sim: SimulationConfig,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl RunnerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            runner: config.runner.name.clone(),
            jobs: config.runner.jobs.max(1),
            timeout: config.runner.timeout(),
            filter: None,
            refinement_iterations: config.formal.refinement_iterations,
            sim: config.sim.clone(),
        }
    }

    /// Why an entry is not run, if it is not
    pub fn skip_reason(&self, entry: &SuiteEntry) -> Option<String> {
        match entry.selection(&self.runner) {
            Selection::Run => {}
            other => return Some(other.to_string()),
        }
        match &self.filter {
            Some(filter) if !entry.name.contains(filter.as_str()) => {
                Some(format!("does not match filter '{}'", filter))
            }
            _ => None,
        }
    }
}

pub struct TaskRunner {
    options: Arc<RunnerOptions>,
    cancel: CancelToken,
}

impl TaskRunner {
    pub fn new(options: RunnerOptions) -> Self {
        Self {
            options: Arc::new(options),
            cancel: CancelToken::new(),
        }
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Cancelling this token stops every running and pending task
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub async fn run_suite(&self, suite: &Suite) -> RunSummary {
        let semaphore = Arc::new(Semaphore::new(self.options.jobs.max(1)));
        let mut pending = Vec::with_capacity(suite.tasks.len());

        for entry in &suite.tasks {
            if let Some(reason) = self.options.skip_reason(entry) {
                debug!(task = %entry.name, %reason, "skipping task");
                let skipped = TaskResult::new(entry, Verdict::Skipped, Some(reason));
                pending.push((entry, Err(skipped)));
                continue;
            }
            let owned = entry.clone();
            let options = Arc::clone(&self.options);
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.child();
            let handle =
                tokio::spawn(async move { run_one(owned, options, semaphore, cancel).await });
            pending.push((entry, Ok(handle)));
        }

        let mut summary = RunSummary::default();
        for (entry, job) in pending {
            let result = match job {
                Err(skipped) => skipped,
                Ok(handle) => match handle.await {
                    Ok(result) => result,
                    Err(e) => TaskResult::new(
                        entry,
                        Verdict::Error,
                        Some(format!("runner task failed: {}", e)),
                    ),
                },
            };
            info!(
                task = %result.name,
                verdict = %result.verdict,
                time_ms = result.time_ms,
                "task finished"
            );
            summary.results.push(result);
        }
        summary
    }
}

async fn run_one(
    entry: SuiteEntry,
    options: Arc<RunnerOptions>,
    semaphore: Arc<Semaphore>,
    cancel: CancelToken,
) -> TaskResult {
    let permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            return TaskResult::new(&entry, Verdict::Error, Some("runner shut down".to_string()))
        }
    };
    if cancel.is_cancelled() {
        return TaskResult::new(&entry, Verdict::Inconclusive, Some("cancelled".to_string()));
    }

    let start = Instant::now();
    let limit = options.timeout;
    let worker = {
        let entry = entry.clone();
        let cancel = cancel.clone();
        // the slot stays taken until the worker has actually stopped
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            execute(&entry, &options, &cancel)
        })
    };

    let joined = match limit {
        None => worker.await,
        Some(limit) => match tokio::time::timeout(limit, worker).await {
            Ok(joined) => joined,
            Err(_) => {
                // the worker stops at its next cancellation check
                warn!(task = %entry.name, ?limit, "task timed out");
                cancel.cancel();
                let mut result =
                    TaskResult::new(&entry, Verdict::Inconclusive, Some("timeout".to_string()));
                result.time_ms = start.elapsed().as_millis() as u64;
                return result;
            }
        },
    };

    match joined {
        Ok(mut result) => {
            result.time_ms = start.elapsed().as_millis() as u64;
            result
        }
        Err(e) => TaskResult::new(&entry, Verdict::Error, Some(format!("task panicked: {}", e))),
    }
}

/// Run one entry to completion on the current thread
pub fn execute(entry: &SuiteEntry, options: &RunnerOptions, cancel: &CancelToken) -> TaskResult {
    let start = Instant::now();
    let elapsed = || start.elapsed().as_millis() as u64;

    let (verdict, detail, report) = match &entry.task {
        TaskSpec::Formal(task) => {
            let (verdict, detail, report) = run_bmc(task, cancel);
            (verdict, detail, report.and_then(|r| serde_json::to_value(r).ok()))
        }
        TaskSpec::Contracts(circuit) => match check_contracts(circuit) {
            Err(e) => (Verdict::Error, Some(e.to_string()), None),
            Ok(tasks) => {
                let mut worst = Verdict::Passed;
                let mut details = Vec::new();
                let mut reports = Vec::new();
                for task in &tasks {
                    let (verdict, detail, report) = run_bmc(task, cancel);
                    worst = worst.max(verdict);
                    if let Some(detail) = detail.filter(|_| verdict != Verdict::Passed) {
                        details.push(format!("{}: {}", task.name, detail));
                    }
                    reports.extend(report);
                }
                let detail = (!details.is_empty()).then(|| details.join("; "));
                (worst, detail, serde_json::to_value(reports).ok())
            }
        },
        TaskSpec::Relation(task) => {
            let mut checker = RelationChecker::new(VarisatBackend::new())
                .with_cancel(cancel.clone())
                .with_max_iterations(options.refinement_iterations);
            match checker.check(task) {
                Ok(report) => {
                    let verdict = match &report.outcome {
                        RelationOutcome::Proven => Verdict::Passed,
                        RelationOutcome::NotProven { .. } => Verdict::Failed,
                        RelationOutcome::Inconclusive { .. } => Verdict::Inconclusive,
                    };
                    let formal = FormalReport::from_relation(&report, elapsed());
                    (verdict, formal.detail.clone(), serde_json::to_value(formal).ok())
                }
                Err(e) => formal_error(e),
            }
        }
        TaskSpec::Simulation(task) => {
            let simulator = Simulator::new(options.sim.clone()).with_cancel(cancel.clone());
            match simulator.run(task) {
                Ok(report) => {
                    let verdict = if report.passed() {
                        Verdict::Passed
                    } else {
                        Verdict::Failed
                    };
                    let detail = Some(describe_simulation(&report));
                    (verdict, detail, serde_json::to_value(&report).ok())
                }
                Err(SimulationError::Cancelled) => {
                    (Verdict::Inconclusive, Some("cancelled".to_string()), None)
                }
                Err(e) => (Verdict::Error, Some(e.to_string()), None),
            }
        }
    };

    TaskResult {
        name: entry.name.clone(),
        kind: entry.task.kind().to_string(),
        verdict,
        detail,
        time_ms: elapsed(),
        report,
    }
}

fn run_bmc(
    task: &FormalTask,
    cancel: &CancelToken,
) -> (Verdict, Option<String>, Option<FormalReport>) {
    let start = Instant::now();
    let mut bmc = BoundedModelChecker::new(VarisatBackend::new()).with_cancel(cancel.clone());
    match bmc.check(task) {
        Ok(report) => {
            let verdict = match &report.outcome {
                BmcOutcome::HoldsUpToBound { .. } => Verdict::Passed,
                BmcOutcome::Violated { .. } => Verdict::Failed,
                BmcOutcome::Inconclusive { .. } => Verdict::Inconclusive,
            };
            let formal = FormalReport::from_bmc(&report, start.elapsed().as_millis() as u64);
            (verdict, formal.detail.clone(), Some(formal))
        }
        Err(e) => {
            let (verdict, detail, _) = formal_error(e);
            (verdict, detail, None)
        }
    }
}

fn formal_error(e: FormalError) -> (Verdict, Option<String>, Option<serde_json::Value>) {
    match e {
        FormalError::Cancelled => (Verdict::Inconclusive, Some("cancelled".to_string()), None),
        other => {
            warn!(error = %other, "formal task error");
            (Verdict::Error, Some(other.to_string()), None)
        }
    }
}

fn describe_simulation(report: &hwv_sim::SimulationReport) -> String {
    use hwv_sim::SimulationOutcome;
    let mut parts = Vec::new();
    match &report.outcome {
        SimulationOutcome::Finished { success, cycle } => {
            parts.push(format!(
                "done at cycle {} with success={}",
                cycle,
                u8::from(*success)
            ));
        }
        SimulationOutcome::CycleLimit { cycles } => {
            parts.push(format!("no done after {} cycles", cycles));
        }
    }
    if !report.assertion_failures.is_empty() {
        parts.push(format!(
            "{} assertion failures (first '{}')",
            report.assertion_failures.len(),
            report.assertion_failures[0].label
        ));
    }
    parts.join(", ")
}
