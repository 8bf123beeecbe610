//! Combinational equivalence and refinement checking
//!
//! Both circuits must be combinational and share an input/output signature.
//! Symbolic values are each circuit's own nondeterminism and range
//! independently in the two copies.
//!
//! - Equivalence builds a miter over shared inputs and asks whether any
//!   assignment makes an output differ.
//! - Refinement (`rhs` refines `lhs`) asks whether some input and some `rhs`
//!   choice produce outputs no `lhs` choice can match. That is a 2QBF query,
//!   solved by counterexample-guided refinement over `lhs` choices.

use crate::aig::{Aig, AigLit};
use crate::solver::{Model, SatBackend, SolverResponse};
use crate::{Counterexample, FormalResult, TraceStep};
use hwv_ir::{
    BitValue, CancelToken, Circuit, CircuitOp, Domain, Evaluator, RelationKind, RelationTask,
    StepOutput, StructuralError,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

type Word = Vec<AigLit>;

/// Why two circuits are not related
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Mismatch {
    /// Port widths differ; decided without the solver
    Signature { detail: String },
    /// Some input makes the outputs disagree
    Outputs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RelationOutcome {
    Proven,
    NotProven {
        reason: Mismatch,
        counterexample: Option<Counterexample>,
    },
    Inconclusive { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationReport {
    pub task: String,
    pub kind: RelationKind,
    pub outcome: RelationOutcome,
    /// Solver queries posed
    pub queries: u32,
}

impl RelationReport {
    /// Boolean result of the check
    pub fn result_signal(&self) -> bool {
        matches!(self.outcome, RelationOutcome::Proven)
    }
}

/// Equivalence and refinement checker
pub struct RelationChecker<B> {
    backend: B,
    cancel: CancelToken,
    max_iterations: u32,
    queries: u32,
}

impl<B: SatBackend> RelationChecker<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cancel: CancelToken::new(),
            max_iterations: 256,
            queries: 0,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Bound on refinement candidate rounds before giving up as inconclusive
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn check(&mut self, task: &RelationTask) -> FormalResult<RelationReport> {
        for circuit in [&task.lhs, &task.rhs] {
            hwv_ir::validate(circuit)?;
            if circuit.is_sequential() {
                return Err(StructuralError::SequentialRelation {
                    circuit: circuit.name.clone(),
                }
                .into());
            }
        }

        self.queries = 0;
        let outcome = if let Some(detail) = signature_mismatch(&task.lhs, &task.rhs) {
            info!(task = %task.name, %detail, "signature mismatch");
            RelationOutcome::NotProven {
                reason: Mismatch::Signature { detail },
                counterexample: None,
            }
        } else if same_structure(&task.lhs, &task.rhs)
            && (task.kind == RelationKind::Refinement || !has_symbolics(&task.lhs))
        {
            debug!(task = %task.name, "structurally identical circuits");
            RelationOutcome::Proven
        } else {
            self.backend.reset();
            match task.kind {
                RelationKind::Equivalence => self.check_equivalence(&task.lhs, &task.rhs)?,
                RelationKind::Refinement => self.check_refinement(&task.lhs, &task.rhs)?,
            }
        };

        info!(
            task = %task.name,
            kind = ?task.kind,
            outcome = outcome_name(&outcome),
            "relation check finished"
        );
        Ok(RelationReport {
            task: task.name.clone(),
            kind: task.kind,
            outcome,
            queries: self.queries,
        })
    }

    fn query(&mut self, aig: &Aig, target: AigLit) -> FormalResult<SolverResponse> {
        if self.cancel.is_cancelled() {
            return Err(crate::FormalError::Cancelled);
        }
        self.queries += 1;
        let response = self.backend.check(aig, &[], target, &self.cancel);
        if matches!(response, SolverResponse::Unknown(_)) && self.cancel.is_cancelled() {
            return Err(crate::FormalError::Cancelled);
        }
        Ok(response)
    }

    fn check_equivalence(&mut self, lhs: &Circuit, rhs: &Circuit) -> FormalResult<RelationOutcome> {
        let mut aig = Aig::new();
        let inputs = shared_inputs(&mut aig, lhs);
        let a = evaluate(&mut aig, lhs, &inputs)?;
        let b = evaluate(&mut aig, rhs, &inputs)?;

        let mut differ = aig.false_lit();
        for (x, y) in a.outputs.iter().zip(&b.outputs) {
            let same = aig.add_word_eq(x, y);
            differ = aig.add_or(differ, same.invert());
        }
        if differ == aig.false_lit() {
            return Ok(RelationOutcome::Proven);
        }

        Ok(match self.query(&aig, differ)? {
            SolverResponse::Unsat => RelationOutcome::Proven,
            SolverResponse::Sat(model) => {
                let mut step = input_step(lhs, &inputs, &model);
                record(&mut step, "lhs", lhs, &a, &model);
                record(&mut step, "rhs", rhs, &b, &model);
                RelationOutcome::NotProven {
                    reason: Mismatch::Outputs,
                    counterexample: Some(Counterexample::new(vec![step])),
                }
            }
            SolverResponse::Unknown(reason) => {
                warn!(%reason, "equivalence query returned unknown");
                RelationOutcome::Inconclusive { reason }
            }
        })
    }

    /// Is there `x, b` with `rhs(x, b)` outside `{ lhs(x, a) | a }`?
    fn check_refinement(&mut self, lhs: &Circuit, rhs: &Circuit) -> FormalResult<RelationOutcome> {
        let mut aig = Aig::new();
        let inputs = shared_inputs(&mut aig, lhs);
        let b = evaluate(&mut aig, rhs, &inputs)?;

        // Mismatch against every lhs choice found so far
        let mut candidate = aig.true_lit();

        for iteration in 0..self.max_iterations {
            let model = match self.query(&aig, candidate)? {
                SolverResponse::Unsat => {
                    debug!(iteration, "no refinement candidate left");
                    return Ok(RelationOutcome::Proven);
                }
                SolverResponse::Unknown(reason) => {
                    warn!(%reason, iteration, "refinement candidate query returned unknown");
                    return Ok(RelationOutcome::Inconclusive { reason });
                }
                SolverResponse::Sat(model) => model,
            };

            let x: Vec<BitValue> = inputs.iter().map(|w| model.word(w)).collect();
            let y: Vec<BitValue> = b.outputs.iter().map(|w| model.word(w)).collect();

            // Can lhs produce y on x for some choice?
            let x_bits: Vec<Word> = x.iter().map(|v| aig.constant_word(v)).collect();
            let a = evaluate(&mut aig, lhs, &x_bits)?;
            let mut matches = aig.true_lit();
            for (out, value) in a.outputs.iter().zip(&y) {
                let expected = aig.constant_word(value);
                let same = aig.add_word_eq(out, &expected);
                matches = aig.add_and(matches, same);
            }

            let witness = if matches == aig.false_lit() {
                SolverResponse::Unsat
            } else {
                self.query(&aig, matches)?
            };
            match witness {
                SolverResponse::Unsat => {
                    info!(iteration, "refinement counterexample found");
                    let mut step = input_step(lhs, &inputs, &model);
                    record(&mut step, "rhs", rhs, &b, &model);
                    return Ok(RelationOutcome::NotProven {
                        reason: Mismatch::Outputs,
                        counterexample: Some(Counterexample::new(vec![step])),
                    });
                }
                SolverResponse::Unknown(reason) => {
                    warn!(%reason, iteration, "refinement witness query returned unknown");
                    return Ok(RelationOutcome::Inconclusive { reason });
                }
                SolverResponse::Sat(found) => {
                    let choice: Vec<BitValue> =
                        a.symbolics.iter().map(|(_, w)| found.word(w)).collect();
                    debug!(iteration, symbolics = choice.len(), "blocking lhs choice");

                    let mut fixed = FixedSymbolics::new(&mut aig, choice);
                    let blocked = evaluate(&mut fixed, lhs, &inputs)?;
                    let mut same = aig.true_lit();
                    for (p, q) in blocked.outputs.iter().zip(&b.outputs) {
                        let eq = aig.add_word_eq(p, q);
                        same = aig.add_and(same, eq);
                    }
                    candidate = aig.add_and(candidate, same.invert());
                }
            }
        }

        Ok(RelationOutcome::Inconclusive {
            reason: format!(
                "refinement iteration limit of {} reached",
                self.max_iterations
            ),
        })
    }
}

fn outcome_name(outcome: &RelationOutcome) -> &'static str {
    match outcome {
        RelationOutcome::Proven => "proven",
        RelationOutcome::NotProven { .. } => "not proven",
        RelationOutcome::Inconclusive { .. } => "inconclusive",
    }
}

fn signature_mismatch(lhs: &Circuit, rhs: &Circuit) -> Option<String> {
    if lhs.input_widths() != rhs.input_widths() {
        return Some(format!(
            "input widths {:?} vs {:?}",
            lhs.input_widths(),
            rhs.input_widths()
        ));
    }
    if lhs.output_widths() != rhs.output_widths() {
        return Some(format!(
            "output widths {:?} vs {:?}",
            lhs.output_widths(),
            rhs.output_widths()
        ));
    }
    None
}

/// Equal up to the circuit name
fn same_structure(lhs: &Circuit, rhs: &Circuit) -> bool {
    lhs.signals == rhs.signals
        && lhs.inputs == rhs.inputs
        && lhs.outputs == rhs.outputs
        && lhs.nodes == rhs.nodes
        && lhs.contracts == rhs.contracts
}

fn has_symbolics(circuit: &Circuit) -> bool {
    circuit
        .all_nodes()
        .any(|n| matches!(n.op, CircuitOp::Symbolic))
}

fn shared_inputs(aig: &mut Aig, circuit: &Circuit) -> Vec<Word> {
    circuit
        .inputs
        .iter()
        .map(|&id| aig.symbolic(&circuit.signal_name(id), circuit.width(id)))
        .collect()
}

fn evaluate<D: Domain>(
    dom: &mut D,
    circuit: &Circuit,
    inputs: &[Vec<D::Bit>],
) -> FormalResult<StepOutput<D::Bit>> {
    let evaluator = Evaluator::new(circuit)?;
    let state = evaluator.initial_state(dom, &[])?;
    Ok(evaluator.step(dom, inputs, &state)?)
}

fn input_step(circuit: &Circuit, inputs: &[Word], model: &Model) -> TraceStep {
    let inputs: IndexMap<String, BitValue> = circuit
        .inputs
        .iter()
        .zip(inputs)
        .map(|(&id, w)| (circuit.signal_name(id), model.word(w)))
        .collect();
    TraceStep {
        step: 0,
        inputs,
        ..TraceStep::default()
    }
}

fn record(
    step: &mut TraceStep,
    side: &str,
    circuit: &Circuit,
    out: &StepOutput<AigLit>,
    model: &Model,
) {
    for (name, w) in &out.symbolics {
        step.symbolics
            .insert(format!("{}.{}", side, name), model.word(w));
    }
    for (&id, w) in circuit.outputs.iter().zip(&out.outputs) {
        step.outputs.insert(
            format!("{}.{}", side, circuit.signal_name(id)),
            model.word(w),
        );
    }
}

/// AIG domain whose symbolic values are fixed constants, replayed in
/// evaluation order
struct FixedSymbolics<'a> {
    aig: &'a mut Aig,
    values: VecDeque<BitValue>,
}

impl<'a> FixedSymbolics<'a> {
    fn new(aig: &'a mut Aig, values: Vec<BitValue>) -> Self {
        Self {
            aig,
            values: values.into(),
        }
    }
}

impl Domain for FixedSymbolics<'_> {
    type Bit = AigLit;

    fn constant(&mut self, value: bool) -> AigLit {
        self.aig.constant(value)
    }

    fn not(&mut self, a: &AigLit) -> AigLit {
        a.invert()
    }

    fn and(&mut self, a: &AigLit, b: &AigLit) -> AigLit {
        self.aig.add_and(*a, *b)
    }

    fn or(&mut self, a: &AigLit, b: &AigLit) -> AigLit {
        self.aig.add_or(*a, *b)
    }

    fn xor(&mut self, a: &AigLit, b: &AigLit) -> AigLit {
        self.aig.add_xor(*a, *b)
    }

    fn mux(&mut self, sel: &AigLit, when_true: &AigLit, when_false: &AigLit) -> AigLit {
        self.aig.add_mux(*sel, *when_false, *when_true)
    }

    fn symbolic(&mut self, _name: &str, width: u32) -> Vec<AigLit> {
        let value = match self.values.pop_front() {
            Some(v) if v.width() == width => v,
            _ => BitValue::zero(width),
        };
        self.aig.constant_word(&value)
    }
}
