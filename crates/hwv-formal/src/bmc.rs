//! Bounded Model Checking implementation
//!
//! The task's `circuit` is unrolled into one AIG, step by step. Registers
//! are threaded: step `k + 1` reads the next-state literals of step `k`, and
//! a register without an initial value is a free input at step 0 only.
//! Yields from `init`/`loop` feed the leading circuit inputs; every other
//! input is fresh per step.
//!
//! At each step one query is posed: all assumptions sampled at steps
//! `0..=k` as constraints, the disjunction of this step's assertion
//! violations as target.

use crate::aig::{Aig, AigLit};
use crate::solver::{Model, SatBackend, SolverResponse};
use crate::{Counterexample, FormalError, FormalResult, TraceStep};
use hwv_ir::{
    fold_dead_properties, BitValue, CancelToken, Domain, Evaluator, FormalTask, PropertyKind,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

type Word = Vec<AigLit>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum BmcOutcome {
    /// No violation within `bound` steps; not a proof beyond it
    HoldsUpToBound { bound: u32 },
    Violated {
        step: u32,
        property: String,
        counterexample: Counterexample,
    },
    Inconclusive { step: u32, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CoverStatus {
    Reached { step: u32 },
    Unreached,
    Unknown { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverResult {
    pub label: String,
    pub status: CoverStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BmcReport {
    pub task: String,
    pub outcome: BmcOutcome,
    pub covers: Vec<CoverResult>,
    pub steps_checked: u32,
}

impl BmcReport {
    /// True only when every step up to the bound was checked clean
    pub fn passed(&self) -> bool {
        matches!(self.outcome, BmcOutcome::HoldsUpToBound { .. })
    }
}

/// Literals of one unrolled step, kept for witness extraction
#[derive(Default)]
struct StepRecord {
    inputs: Vec<(String, Word)>,
    registers: Vec<(String, Word)>,
    symbolics: Vec<(String, Word)>,
    outputs: Vec<(String, Word)>,
    violations: Vec<(String, AigLit)>,
}

/// Bounded Model Checker
pub struct BoundedModelChecker<B> {
    backend: B,
    cancel: CancelToken,
}

impl<B: SatBackend> BoundedModelChecker<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn check(&mut self, task: &FormalTask) -> FormalResult<BmcReport> {
        task.validate()?;
        self.backend.reset();

        let init = Evaluator::new(&task.init)?;
        let body = Evaluator::new(&task.loop_body)?;
        let mut folded = task.circuit.clone();
        fold_dead_properties(&mut folded);
        let circuit = Evaluator::new(&folded)?;
        let c = &folded;

        let mut aig = Aig::new();

        let init_state = init.initial_state(&mut aig, &[])?;
        let mut yields: Vec<Word> = init.step(&mut aig, &[], &init_state)?.outputs;
        let body_state = body.initial_state(&mut aig, &[])?;
        let mut state = circuit.initial_state(&mut aig, &task.initial_values)?;

        let mut constraints: Vec<AigLit> = Vec::new();
        let mut records: Vec<StepRecord> = Vec::new();
        // property index of each entry in `covers`
        let (cover_index, mut covers): (Vec<usize>, Vec<CoverResult>) = c
            .properties
            .iter()
            .enumerate()
            .filter(|(_, p)| p.kind == PropertyKind::Cover)
            .map(|(i, p)| {
                let result = CoverResult {
                    label: p.display_name(i),
                    status: CoverStatus::Unreached,
                };
                (i, result)
            })
            .unzip();

        for k in 0..task.bound {
            if self.cancel.is_cancelled() {
                warn!(task = %task.name, step = k, "BMC cancelled");
                return Err(FormalError::Cancelled);
            }

            let mut inputs = yields.clone();
            let mut record = StepRecord::default();
            for (i, &id) in c.inputs.iter().enumerate() {
                let name = c.signal_name(id);
                if i >= yields.len() {
                    inputs.push(aig.symbolic(&format!("{}@{}", name, k), c.width(id)));
                }
                record.inputs.push((name, inputs[i].clone()));
            }
            for (reg, bits) in c.registers.iter().zip(&state.registers) {
                record.registers.push((reg.name.clone(), bits.clone()));
            }

            let out = circuit.step(&mut aig, &inputs, &state)?;
            record.symbolics = out.symbolics.clone();
            for (&id, bits) in c.outputs.iter().zip(&out.outputs) {
                record.outputs.push((c.signal_name(id), bits.clone()));
            }

            let mut cover_hits = Vec::new();
            for ob in &out.obligations {
                match ob.kind {
                    PropertyKind::Assume => {
                        let ok = aig.add_or(ob.active.invert(), ob.holds);
                        constraints.push(ok);
                    }
                    PropertyKind::Assert => {
                        let violated = aig.add_and(ob.active, ob.holds.invert());
                        record.violations.push((ob.label.clone(), violated));
                    }
                    PropertyKind::Cover => {
                        let hit = aig.add_and(ob.active, ob.holds);
                        cover_hits.push((ob.index, hit));
                    }
                    // rejected by validation outside contracts
                    PropertyKind::Require | PropertyKind::Ensure => {}
                }
            }

            let target = aig.add_or_all(record.violations.iter().map(|(_, l)| *l));
            records.push(record);
            debug!(
                task = %task.name,
                step = k,
                nodes = aig.nodes.len(),
                constraints = constraints.len(),
                "BMC step unrolled"
            );

            if target != aig.false_lit() {
                match self.backend.check(&aig, &constraints, target, &self.cancel) {
                    SolverResponse::Sat(model) => {
                        let step_record = &records[k as usize];
                        let property = step_record
                            .violations
                            .iter()
                            .find(|(_, l)| model.lit(*l))
                            .map(|(label, _)| label.clone())
                            .unwrap_or_default();
                        let counterexample = extract_counterexample(&records, &model);
                        info!(task = %task.name, step = k, %property, "BMC: counterexample found");
                        return Ok(BmcReport {
                            task: task.name.clone(),
                            outcome: BmcOutcome::Violated {
                                step: k,
                                property,
                                counterexample,
                            },
                            covers,
                            steps_checked: k + 1,
                        });
                    }
                    SolverResponse::Unsat => {}
                    SolverResponse::Unknown(reason) => {
                        if self.cancel.is_cancelled() {
                            return Err(FormalError::Cancelled);
                        }
                        warn!(task = %task.name, step = k, %reason, "BMC: solver returned unknown");
                        return Ok(BmcReport {
                            task: task.name.clone(),
                            outcome: BmcOutcome::Inconclusive { step: k, reason },
                            covers,
                            steps_checked: k,
                        });
                    }
                }
            }

            self.check_covers(&aig, &constraints, &cover_hits, &cover_index, &mut covers, k)?;

            yields = body.step(&mut aig, &yields, &body_state)?.outputs;
            state = out.next;
        }

        info!(task = %task.name, bound = task.bound, "BMC: no counterexample up to bound");
        Ok(BmcReport {
            task: task.name.clone(),
            outcome: BmcOutcome::HoldsUpToBound { bound: task.bound },
            covers,
            steps_checked: task.bound,
        })
    }

    fn check_covers(
        &mut self,
        aig: &Aig,
        constraints: &[AigLit],
        hits: &[(usize, AigLit)],
        cover_index: &[usize],
        covers: &mut [CoverResult],
        step: u32,
    ) -> FormalResult<()> {
        for (property, hit) in hits {
            let Some(slot) = cover_index.iter().position(|i| i == property) else {
                continue;
            };
            let cover = &mut covers[slot];
            if matches!(cover.status, CoverStatus::Reached { .. }) || *hit == aig.false_lit() {
                continue;
            }
            match self.backend.check(aig, constraints, *hit, &self.cancel) {
                SolverResponse::Sat(_) => {
                    debug!(label = %cover.label, step, "cover reached");
                    cover.status = CoverStatus::Reached { step };
                }
                SolverResponse::Unsat => {}
                SolverResponse::Unknown(reason) => {
                    if self.cancel.is_cancelled() {
                        return Err(FormalError::Cancelled);
                    }
                    cover.status = CoverStatus::Unknown { reason };
                }
            }
        }
        Ok(())
    }
}

fn extract_counterexample(records: &[StepRecord], model: &Model) -> Counterexample {
    let words = |named: &[(String, Word)]| -> IndexMap<String, BitValue> {
        named
            .iter()
            .map(|(name, bits)| (name.clone(), model.word(bits)))
            .collect()
    };
    let trace = records
        .iter()
        .enumerate()
        .map(|(step, r)| TraceStep {
            step,
            inputs: words(&r.inputs),
            registers: words(&r.registers),
            symbolics: words(&r.symbolics),
            outputs: words(&r.outputs),
        })
        .collect();
    Counterexample::new(trace)
}
