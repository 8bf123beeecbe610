//! Solver collaborator interface
//!
//! Checkers never talk to a SAT engine directly. They build an [`Aig`] and
//! ask a [`SatBackend`] whether `constraints ∧ target` is satisfiable.
//! `Unknown` is an answer, not an error: checkers surface it as
//! inconclusive.

use crate::aig::{Aig, AigLit, AigNode, AigNodeId, Valuation};
use hwv_ir::CancelToken;
use std::collections::{HashSet, VecDeque};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace, warn};
use varisat::{ExtendFormula, Lit, ProofFormat, Solver, Var};

/// Satisfying assignment, as the value of every AIG node
pub type Model = Valuation;

#[derive(Debug, Clone)]
pub enum SolverResponse {
    Sat(Model),
    Unsat,
    Unknown(String),
}

pub trait SatBackend {
    fn name(&self) -> &str;

    /// Forget everything encoded so far. Must be called before checking a
    /// different AIG; repeated checks on one growing AIG may skip it.
    fn reset(&mut self);

    fn check(
        &mut self,
        aig: &Aig,
        constraints: &[AigLit],
        target: AigLit,
        cancel: &CancelToken,
    ) -> SolverResponse;
}

impl<B: SatBackend + ?Sized> SatBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn check(
        &mut self,
        aig: &Aig,
        constraints: &[AigLit],
        target: AigLit,
        cancel: &CancelToken,
    ) -> SolverResponse {
        (**self).check(aig, constraints, target, cancel)
    }
}

/// Proof sink that discards everything and fails once the query in flight
/// is cancelled. varisat stops `solve()` at the next conflict after a proof
/// write error, which is the only way to interrupt it from outside.
struct InterruptSink {
    cancel: Arc<Mutex<CancelToken>>,
}

impl Write for InterruptSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let cancelled = self
            .cancel
            .lock()
            .map(|token| token.is_cancelled())
            .unwrap_or(true);
        if cancelled {
            Err(io::Error::new(io::ErrorKind::Interrupted, "query cancelled"))
        } else {
            Ok(buf.len())
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Incremental CDCL backend. AIG nodes are Tseitin-encoded once, as they
/// appear; constraints and target are passed as assumptions so the same
/// solver instance serves every query on a growing AIG.
pub struct VarisatBackend {
    solver: Solver<'static>,
    vars: Vec<Var>,
    /// Token of the current query, polled by the proof sink
    cancel: Arc<Mutex<CancelToken>>,
}

impl VarisatBackend {
    pub fn new() -> Self {
        let cancel = Arc::new(Mutex::new(CancelToken::new()));
        let mut solver = Solver::new();
        // DRAT rejects assumptions; the native format accepts them
        solver.write_proof(
            InterruptSink {
                cancel: Arc::clone(&cancel),
            },
            ProofFormat::Varisat,
        );
        Self {
            solver,
            vars: Vec::new(),
            cancel,
        }
    }

    fn lit(&self, lit: AigLit) -> Lit {
        let var = self.vars[lit.node.0 as usize];
        if lit.inverted {
            Lit::negative(var)
        } else {
            Lit::positive(var)
        }
    }

    /// Encode nodes added since the last call
    fn encode(&mut self, aig: &Aig) {
        let start = self.vars.len();
        for (idx, node) in aig.nodes.iter().enumerate().skip(start) {
            let var = self.solver.new_var();
            self.vars.push(var);
            match node {
                AigNode::False => self.solver.add_clause(&[Lit::negative(var)]),
                AigNode::Input { .. } => {}
                AigNode::And { left, right } => {
                    let out = Lit::positive(self.vars[idx]);
                    let l = self.lit(*left);
                    let r = self.lit(*right);
                    // out = left AND right
                    self.solver.add_clause(&[!out, l]);
                    self.solver.add_clause(&[!out, r]);
                    self.solver.add_clause(&[out, !l, !r]);
                }
            }
        }
        if aig.nodes.len() > start {
            trace!(encoded = aig.nodes.len() - start, "encoded AIG nodes");
        }
    }

    fn watch(&self, cancel: &CancelToken) {
        if let Ok(mut current) = self.cancel.lock() {
            *current = cancel.clone();
        }
    }
}

impl Default for VarisatBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SatBackend for VarisatBackend {
    fn name(&self) -> &str {
        "varisat"
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn check(
        &mut self,
        aig: &Aig,
        constraints: &[AigLit],
        target: AigLit,
        cancel: &CancelToken,
    ) -> SolverResponse {
        if cancel.is_cancelled() {
            return SolverResponse::Unknown("cancelled".to_string());
        }
        if aig.nodes.len() < self.vars.len() {
            warn!("AIG shrank between checks; re-encoding");
            self.reset();
        }
        self.watch(cancel);
        self.encode(aig);

        let assumptions: Vec<Lit> = constraints
            .iter()
            .chain(std::iter::once(&target))
            .map(|&l| self.lit(l))
            .collect();
        self.solver.assume(&assumptions);

        match self.solver.solve() {
            Ok(true) => {
                let Some(model) = self.solver.model() else {
                    return SolverResponse::Unknown("solver returned no model".to_string());
                };
                let model_set: HashSet<Lit> = model.into_iter().collect();
                let vars = &self.vars;
                let valuation = aig.simulate(|id: AigNodeId| {
                    vars.get(id.0 as usize)
                        .is_some_and(|&v| model_set.contains(&Lit::positive(v)))
                });
                SolverResponse::Sat(valuation)
            }
            Ok(false) => SolverResponse::Unsat,
            Err(e) => {
                // an interrupted solver refuses further queries
                if !e.is_recoverable() {
                    self.reset();
                }
                if cancel.is_cancelled() {
                    debug!("SAT query interrupted");
                    SolverResponse::Unknown("cancelled".to_string())
                } else {
                    SolverResponse::Unknown(format!("SAT solver error: {}", e))
                }
            }
        }
    }
}

/// Answer a scripted backend gives to one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedAnswer {
    /// Satisfiable with every input false
    Sat,
    Unsat,
    Unknown(String),
}

/// Backend replaying canned answers, for exercising checker control flow
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    answers: VecDeque<ScriptedAnswer>,
    fallback: ScriptedAnswer,
    calls: usize,
}

impl ScriptedBackend {
    /// Answers `fallback` to every query
    pub fn new(fallback: ScriptedAnswer) -> Self {
        Self {
            answers: VecDeque::new(),
            fallback,
            calls: 0,
        }
    }

    /// Queue answers given before falling back
    pub fn then(mut self, answer: ScriptedAnswer) -> Self {
        self.answers.push_back(answer);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl SatBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn reset(&mut self) {}

    fn check(
        &mut self,
        aig: &Aig,
        _constraints: &[AigLit],
        _target: AigLit,
        _cancel: &CancelToken,
    ) -> SolverResponse {
        self.calls += 1;
        let answer = self.answers.pop_front().unwrap_or_else(|| self.fallback.clone());
        match answer {
            ScriptedAnswer::Sat => SolverResponse::Sat(aig.simulate(|_| false)),
            ScriptedAnswer::Unsat => SolverResponse::Unsat,
            ScriptedAnswer::Unknown(reason) => SolverResponse::Unknown(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(aig: &Aig, constraints: &[AigLit], target: AigLit) -> SolverResponse {
        VarisatBackend::new().check(aig, constraints, target, &CancelToken::new())
    }

    #[test]
    fn test_sat_with_model() {
        let mut aig = Aig::new();
        let a = aig.add_input("a");
        let b = aig.add_input("b");
        let target = aig.add_and(a, b.invert());
        match check(&aig, &[], target) {
            SolverResponse::Sat(model) => {
                assert!(model.lit(a));
                assert!(!model.lit(b));
                assert!(model.lit(target));
            }
            other => panic!("expected SAT, got {:?}", other),
        }
    }

    #[test]
    fn test_constraints_can_make_unsat() {
        let mut aig = Aig::new();
        let a = aig.add_input("a");
        let b = aig.add_input("b");
        let target = aig.add_and(a, b);
        assert!(matches!(
            check(&aig, &[b.invert()], target),
            SolverResponse::Unsat
        ));
    }

    #[test]
    fn test_incremental_queries_on_growing_aig() {
        let mut backend = VarisatBackend::new();
        let cancel = CancelToken::new();
        let mut aig = Aig::new();
        let a = aig.add_input("a");
        assert!(matches!(
            backend.check(&aig, &[], a, &cancel),
            SolverResponse::Sat(_)
        ));

        // assumptions from the first query must not stick
        let b = aig.add_input("b");
        let both = aig.add_and(a.invert(), b);
        match backend.check(&aig, &[], both, &cancel) {
            SolverResponse::Sat(model) => {
                assert!(!model.lit(a));
                assert!(model.lit(b));
            }
            other => panic!("expected SAT, got {:?}", other),
        }
        assert!(matches!(
            backend.check(&aig, &[a], both, &cancel),
            SolverResponse::Unsat
        ));
    }

    #[test]
    fn test_cancelled_is_unknown() {
        let aig = Aig::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        let response = VarisatBackend::new().check(&aig, &[], aig.true_lit(), &cancel);
        assert!(matches!(response, SolverResponse::Unknown(_)));
    }

    /// Pigeonhole: `holes + 1` pigeons in `holes` holes. Unsatisfiable and
    /// exponentially hard for CDCL.
    fn pigeonhole(holes: usize) -> (Aig, Vec<AigLit>) {
        let mut aig = Aig::new();
        let at: Vec<Vec<AigLit>> = (0..=holes)
            .map(|p| (0..holes).map(|h| aig.add_input(format!("p{}h{}", p, h))).collect())
            .collect();
        let mut constraints = Vec::new();
        for row in &at {
            constraints.push(aig.add_or_all(row.iter().copied()));
        }
        for h in 0..holes {
            for p in 0..=holes {
                for q in p + 1..=holes {
                    constraints.push(aig.add_and(at[p][h], at[q][h]).invert());
                }
            }
        }
        (aig, constraints)
    }

    #[test]
    fn test_cancel_interrupts_running_query() {
        let (aig, constraints) = pigeonhole(11);
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(100));
            remote.cancel();
        });

        let started = std::time::Instant::now();
        let mut backend = VarisatBackend::new();
        let response = backend.check(&aig, &constraints, aig.true_lit(), &cancel);
        canceller.join().unwrap();
        assert!(matches!(response, SolverResponse::Unknown(ref r) if r == "cancelled"));
        assert!(started.elapsed() < std::time::Duration::from_secs(30));

        // the backend is usable again with a fresh token
        let mut small = Aig::new();
        let a = small.add_input("a");
        assert!(matches!(
            backend.check(&small, &[], a, &CancelToken::new()),
            SolverResponse::Sat(_)
        ));
    }

    #[test]
    fn test_scripted_sequence() {
        let aig = Aig::new();
        let cancel = CancelToken::new();
        let mut backend = ScriptedBackend::new(ScriptedAnswer::Unsat)
            .then(ScriptedAnswer::Unknown("budget".to_string()));
        assert!(matches!(
            backend.check(&aig, &[], aig.true_lit(), &cancel),
            SolverResponse::Unknown(r) if r == "budget"
        ));
        assert!(matches!(
            backend.check(&aig, &[], aig.true_lit(), &cancel),
            SolverResponse::Unsat
        ));
        assert_eq!(backend.calls(), 2);
    }
}
