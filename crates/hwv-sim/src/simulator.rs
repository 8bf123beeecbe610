//! Testbench simulation
//!
//! A simulation task is a circuit with inputs `[clock, init]` whose first
//! two outputs are `[done, success]`. The driver feeds it the fixed
//! [`SimSchedule`], evaluates it concretely and stops at the first running
//! rising edge where `done` is high; `success` is read at that same edge.

use crate::oracle::{build_oracle, OracleKind};
use crate::schedule::SimSchedule;
use crate::trace::{SimTrace, Snapshot};
use hwv_ir::{
    fold_dead_properties, BitValue, BoolDomain, CancelToken, Evaluator, PropertyKind,
    SimulationTask, StructuralError, SymbolicOracle,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur during simulation
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error("simulation cancelled")]
    Cancelled,
}

/// Result type for simulation operations
pub type SimulationResult<T> = Result<T, SimulationError>;

/// Configuration for simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Running clock cycles before giving up
    pub max_cycles: u64,
    pub oracle: OracleKind,
    pub seed: u64,
    pub capture_trace: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            max_cycles: 1_000_000,
            oracle: OracleKind::Zero,
            seed: 0,
            capture_trace: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SimulationOutcome {
    /// `done` went high at running cycle `cycle`
    Finished { success: bool, cycle: u64 },
    CycleLimit { cycles: u64 },
}

/// A property that did not hold when sampled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyEvent {
    pub label: String,
    /// Running cycles completed before the failing evaluation
    pub cycle: u64,
    pub evaluation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub task: String,
    pub outcome: SimulationOutcome,
    pub evaluations: u64,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub assertion_failures: Vec<PropertyEvent>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub assumption_violations: Vec<PropertyEvent>,
    /// Times each cover was hit
    #[serde(skip_serializing_if = "IndexMap::is_empty", default)]
    pub cover_hits: IndexMap<String, u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub trace: Option<SimTrace>,
}

impl SimulationReport {
    pub fn passed(&self) -> bool {
        matches!(self.outcome, SimulationOutcome::Finished { success: true, .. })
            && self.assertion_failures.is_empty()
    }

    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub struct Simulator {
    config: SimulationConfig,
    cancel: CancelToken,
}

impl Simulator {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run with the oracle named in the configuration
    pub fn run(&self, task: &SimulationTask) -> SimulationResult<SimulationReport> {
        let oracle = build_oracle(self.config.oracle, self.config.seed);
        self.run_with_oracle(task, oracle)
    }

    pub fn run_with_oracle<O: SymbolicOracle>(
        &self,
        task: &SimulationTask,
        oracle: O,
    ) -> SimulationResult<SimulationReport> {
        task.validate()?;
        let mut folded = task.circuit.clone();
        fold_dead_properties(&mut folded);
        let c = &folded;
        let evaluator = Evaluator::new(c)?;
        let mut dom = BoolDomain::new(oracle);
        let mut state = evaluator.initial_state(&mut dom, &evaluator.default_initial_values())?;
        let mut schedule = SimSchedule::new();

        let mut assertion_failures = Vec::new();
        let mut assumption_violations = Vec::new();
        let mut cover_hits: IndexMap<String, u64> = c
            .properties
            .iter()
            .enumerate()
            .filter(|(_, p)| p.kind == PropertyKind::Cover)
            .map(|(i, p)| (p.display_name(i), 0))
            .collect();
        let mut trace = self.config.capture_trace.then(SimTrace::new);

        info!(task = %task.name, max_cycles = self.config.max_cycles, "starting simulation");

        let mut cycle = 0u64;
        let mut evaluations = 0u64;
        let outcome = loop {
            if self.cancel.is_cancelled() {
                warn!(task = %task.name, cycle, "simulation cancelled");
                return Err(SimulationError::Cancelled);
            }
            if cycle >= self.config.max_cycles {
                break SimulationOutcome::CycleLimit { cycles: cycle };
            }

            let tick = schedule.advance();
            let inputs = vec![vec![tick.drive.clock], vec![tick.drive.init]];
            let out = evaluator.step(&mut dom, &inputs, &state)?;

            for ob in out.obligations.iter().filter(|ob| ob.active) {
                let event = || PropertyEvent {
                    label: ob.label.clone(),
                    cycle,
                    evaluation: evaluations,
                };
                match ob.kind {
                    PropertyKind::Assert if !ob.holds => {
                        warn!(task = %task.name, property = %ob.label, cycle, "assertion failed");
                        assertion_failures.push(event());
                    }
                    PropertyKind::Assume if !ob.holds => {
                        debug!(
                            task = %task.name,
                            property = %ob.label,
                            cycle,
                            "assumption violated"
                        );
                        assumption_violations.push(event());
                    }
                    PropertyKind::Cover if ob.holds => {
                        *cover_hits.entry(ob.label.clone()).or_insert(0) += 1;
                    }
                    _ => {}
                }
            }
            evaluations += 1;

            if tick.samples_outputs() {
                if let Some(trace) = trace.as_mut() {
                    trace.push(snapshot(c, cycle, &out.outputs, &state.registers));
                }
                let done = flag(&out.outputs, 0);
                if done {
                    let success = flag(&out.outputs, 1);
                    break SimulationOutcome::Finished { success, cycle };
                }
                cycle += 1;
            }
            state = out.next;
        };

        match &outcome {
            SimulationOutcome::Finished { success, cycle } => {
                info!(task = %task.name, success, cycle, evaluations, "simulation finished")
            }
            SimulationOutcome::CycleLimit { cycles } => {
                warn!(task = %task.name, cycles, "simulation hit the cycle limit")
            }
        }

        Ok(SimulationReport {
            task: task.name.clone(),
            outcome,
            evaluations,
            assertion_failures,
            assumption_violations,
            cover_hits,
            trace,
        })
    }
}

fn flag(outputs: &[Vec<bool>], index: usize) -> bool {
    outputs
        .get(index)
        .and_then(|bits| bits.first())
        .copied()
        .unwrap_or(false)
}

fn snapshot(
    circuit: &hwv_ir::Circuit,
    cycle: u64,
    outputs: &[Vec<bool>],
    registers: &[Vec<bool>],
) -> Snapshot {
    Snapshot {
        cycle,
        outputs: circuit
            .outputs
            .iter()
            .zip(outputs)
            .map(|(&id, bits)| (circuit.signal_name(id), BitValue::from_bits(bits)))
            .collect(),
        registers: circuit
            .registers
            .iter()
            .zip(registers)
            .map(|(reg, bits)| (reg.name.clone(), BitValue::from_bits(bits)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwv_ir::{Circuit, CircuitOp, ClockEdge, Property, ReplayOracle, TemporalExpr};

    /// Counts running cycles after init and finishes when the count hits
    /// `limit`; `success` is whether `count == expected` at that point.
    fn countdown(limit: u64, expected: u64) -> SimulationTask {
        let mut c = Circuit::new("countdown");
        let clk = c.add_input("clk", 1);
        let init = c.add_input("init", 1);
        let r = c.add_clocked_register("count", 8, Some(BitValue::zero(8)), clk);
        let one = c.add_constant("one", BitValue::from_u64(8, 1));
        let zero = c.add_constant("zero", BitValue::zero(8));
        let inc = c.add_op(CircuitOp::Add, vec![r.current, one], "inc", 8);
        c.add_node(CircuitOp::Mux, vec![init, inc, zero], r.next, "count.next");
        let lim = c.add_constant("limit", BitValue::from_u64(8, limit));
        let done = c.add_op(CircuitOp::Eq, vec![r.current, lim], "done", 1);
        let exp = c.add_constant("expected", BitValue::from_u64(8, expected));
        let success = c.add_op(CircuitOp::Eq, vec![r.current, exp], "success", 1);
        c.add_output(done);
        c.add_output(success);
        c.add_output(r.current);
        SimulationTask::new("countdown", c)
    }

    #[test]
    fn test_finishes_with_success() {
        let report = Simulator::new(SimulationConfig::default())
            .run(&countdown(5, 5))
            .unwrap();
        // the init edge loads zero, running edges 0..=4 count to 5
        assert_eq!(report.outcome, SimulationOutcome::Finished { success: true, cycle: 5 });
        assert!(report.passed());
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_failure_exit_code() {
        let report = Simulator::new(SimulationConfig::default())
            .run(&countdown(3, 4))
            .unwrap();
        assert_eq!(report.outcome, SimulationOutcome::Finished { success: false, cycle: 3 });
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_cycle_limit() {
        let config = SimulationConfig {
            max_cycles: 10,
            ..SimulationConfig::default()
        };
        let report = Simulator::new(config).run(&countdown(200, 200)).unwrap();
        assert_eq!(report.outcome, SimulationOutcome::CycleLimit { cycles: 10 });
        assert!(!report.passed());
    }

    #[test]
    fn test_trace_capture() {
        let config = SimulationConfig {
            capture_trace: true,
            ..SimulationConfig::default()
        };
        let report = Simulator::new(config).run(&countdown(3, 3)).unwrap();
        let trace = report.trace.unwrap();
        assert_eq!(trace.len(), 4);
        let counts: Vec<u64> = trace.output_history("count").iter().map(|v| v.to_u64()).collect();
        assert_eq!(counts, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_assertions_and_covers_are_checked() {
        let mut task = countdown(4, 4);
        let c = &mut task.circuit;
        let clk = c.inputs[0];
        let count = c.outputs[2];
        let two = c.add_constant("two", BitValue::from_u64(8, 2));
        let below = c.add_op(CircuitOp::Ult, vec![count, two], "below_two", 1);
        c.add_property(Property::assert(below).on_edge(ClockEdge::Pos, clk).with_label("small"));
        c.add_property(
            Property::cover(TemporalExpr::Const(true))
                .on_edge(ClockEdge::Pos, clk)
                .with_label("edges"),
        );

        let report = Simulator::new(SimulationConfig::default()).run(&task).unwrap();
        assert!(!report.passed());
        // count is 2, 3 and 4 on the last three rising edges
        assert_eq!(report.assertion_failures.len(), 3);
        assert_eq!(report.assertion_failures[0].label, "small");
        // init edge plus five running edges
        assert_eq!(report.cover_hits["edges"], 6);
    }

    #[test]
    fn test_symbolic_values_come_from_oracle() {
        // finishes on the first running edge; success is the symbolic bit
        let mut c = Circuit::new("coin");
        c.add_input("clk", 1);
        c.add_input("init", 1);
        let done = c.add_constant("done", BitValue::from_u64(1, 1));
        let coin = c.add_symbolic("coin", 1);
        c.add_output(done);
        c.add_output(coin);
        let task = SimulationTask::new("coin", c);

        let sim = Simulator::new(SimulationConfig::default());
        let heads = std::iter::repeat(BitValue::from_u64(1, 1)).take(8);
        let report = sim.run_with_oracle(&task, ReplayOracle::new(heads)).unwrap();
        assert!(report.passed());
        let report = sim.run(&task).unwrap();
        assert!(!report.passed());
    }

    #[test]
    fn test_cancelled() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = Simulator::new(SimulationConfig::default())
            .with_cancel(cancel)
            .run(&countdown(3, 3));
        assert!(matches!(result, Err(SimulationError::Cancelled)));
    }

    #[test]
    fn test_malformed_task_is_structural() {
        let mut c = Circuit::new("bad");
        let clk = c.add_input("clk", 1);
        c.add_output(clk);
        let result =
            Simulator::new(SimulationConfig::default()).run(&SimulationTask::new("bad", c));
        assert!(matches!(result, Err(SimulationError::Structural(_))));
    }
}
