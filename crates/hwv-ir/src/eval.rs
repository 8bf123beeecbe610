//! Circuit execution engine
//!
//! One call to [`Evaluator::step`] evaluates the circuit body once: it reads
//! external inputs and the register state handed in by the caller and returns
//! outputs, the next state and the per-property obligations of this instant.
//! State is threaded explicitly through [`StepState`]; the evaluator and the
//! circuit are never mutated.
//!
//! Contracts are transparent here: results equal operands and the
//! require/ensure clauses are ignored. The contract rewriter is what gives
//! them meaning.

use crate::circuit::{Circuit, CircuitOp, SignalId};
use crate::clock::{edge_fires, ResetLatch};
use crate::domain::{BoolDomain, Domain, ZeroOracle};
use crate::error::{IrResult, StructuralError};
use crate::property::{ClockEdge, Property, PropertyKind, TemporalExpr};
use crate::validate::{evaluation_order, Driver};
use crate::value::BitValue;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::trace;

/// Everything carried from one evaluation to the next
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepState<B> {
    /// Register values, LSB first, in register order
    pub registers: Vec<Vec<B>>,
    /// Hidden state of `HasBeenReset` nodes
    pub reset_latches: Vec<ResetLatch<B>>,
    /// Clock samples from the previous evaluation; absent before the first
    pub prev_clocks: BTreeMap<SignalId, B>,
}

/// One property evaluated at one instant
#[derive(Debug, Clone)]
pub struct Obligation<B> {
    /// Index into `Circuit::properties`
    pub index: usize,
    pub kind: PropertyKind,
    pub label: String,
    /// Sampling predicate: trigger edge fired and enable high
    pub active: B,
    /// Value of the property expression
    pub holds: B,
}

#[derive(Debug, Clone)]
pub struct StepOutput<B> {
    pub outputs: Vec<Vec<B>>,
    pub next: StepState<B>,
    pub obligations: Vec<Obligation<B>>,
    /// Symbolic values drawn during this evaluation, by signal name
    pub symbolics: Vec<(String, Vec<B>)>,
    values: Vec<Option<Vec<B>>>,
}

impl<B> StepOutput<B> {
    /// Value of any signal during this evaluation
    pub fn value(&self, id: SignalId) -> Option<&[B]> {
        self.values
            .get(id.0 as usize)
            .and_then(|v| v.as_deref())
    }
}

/// A validated circuit with a fixed evaluation order
#[derive(Debug, Clone)]
pub struct Evaluator<'c> {
    circuit: &'c Circuit,
    order: Vec<Driver>,
    latch_slots: HashMap<(Option<usize>, usize), usize>,
    clocks: Vec<SignalId>,
}

impl<'c> Evaluator<'c> {
    pub fn new(circuit: &'c Circuit) -> IrResult<Self> {
        let order = evaluation_order(circuit)?;

        let mut latch_slots = HashMap::new();
        let contract_nodes = circuit
            .contracts
            .iter()
            .enumerate()
            .flat_map(|(c, k)| k.nodes.iter().enumerate().map(move |(i, n)| (Some(c), i, n)));
        let circuit_nodes = circuit.nodes.iter().enumerate().map(|(i, n)| (None, i, n));
        for (contract, index, node) in circuit_nodes.chain(contract_nodes) {
            if node.op.is_stateful() {
                let slot = latch_slots.len();
                latch_slots.insert((contract, index), slot);
            }
        }

        let clocks: BTreeSet<SignalId> = circuit
            .properties
            .iter()
            .filter_map(|p| p.trigger.map(|t| t.clock))
            .chain(circuit.registers.iter().filter_map(|r| r.clock))
            .collect();

        trace!(
            circuit = %circuit.name,
            nodes = order.len(),
            latches = latch_slots.len(),
            "evaluation order fixed"
        );

        Ok(Self {
            circuit,
            order,
            latch_slots,
            clocks: clocks.into_iter().collect(),
        })
    }

    pub fn circuit(&self) -> &'c Circuit {
        self.circuit
    }

    /// Initial values declared on the registers themselves
    pub fn default_initial_values(&self) -> Vec<Option<BitValue>> {
        self.circuit
            .registers
            .iter()
            .map(|r| r.init.clone())
            .collect()
    }

    /// State before the first evaluation. Registers without a value get a
    /// fresh symbolic value from the domain.
    pub fn initial_state<D: Domain>(
        &self,
        dom: &mut D,
        initial_values: &[Option<BitValue>],
    ) -> IrResult<StepState<D::Bit>> {
        let regs = &self.circuit.registers;
        if initial_values.len() != regs.len() {
            return Err(StructuralError::MalformedTask {
                task: self.circuit.name.clone(),
                detail: format!(
                    "{} initial values for {} registers",
                    initial_values.len(),
                    regs.len()
                ),
            });
        }

        let mut registers = Vec::with_capacity(regs.len());
        for (reg, init) in regs.iter().zip(initial_values) {
            let bits = match init {
                Some(value) => {
                    if value.width() != reg.width {
                        return Err(StructuralError::WidthMismatch {
                            context: format!("initial value of register '{}'", reg.name),
                            expected: reg.width,
                            found: value.width(),
                        });
                    }
                    dom.constant_word(value)
                }
                None => dom.symbolic(&reg.name, reg.width),
            };
            registers.push(bits);
        }

        let reset_latches = (0..self.latch_slots.len())
            .map(|_| ResetLatch::cleared(dom))
            .collect();

        Ok(StepState {
            registers,
            reset_latches,
            prev_clocks: BTreeMap::new(),
        })
    }

    /// Evaluate the body once
    pub fn step<D: Domain>(
        &self,
        dom: &mut D,
        inputs: &[Vec<D::Bit>],
        state: &StepState<D::Bit>,
    ) -> IrResult<StepOutput<D::Bit>> {
        let circuit = self.circuit;
        if inputs.len() != circuit.inputs.len() {
            return Err(StructuralError::Arity {
                context: format!("inputs of '{}'", circuit.name),
                expected: circuit.inputs.len(),
                found: inputs.len(),
            });
        }
        if state.registers.len() != circuit.registers.len()
            || state.reset_latches.len() != self.latch_slots.len()
        {
            return Err(StructuralError::MalformedTask {
                task: circuit.name.clone(),
                detail: "state does not match circuit".to_string(),
            });
        }

        let mut values: Vec<Option<Vec<D::Bit>>> = vec![None; circuit.signals.len()];
        for (&id, bits) in circuit.inputs.iter().zip(inputs) {
            expect_len(circuit, id, bits.len())?;
            values[id.0 as usize] = Some(bits.clone());
        }
        for (reg, bits) in circuit.registers.iter().zip(&state.registers) {
            expect_len(circuit, reg.current, bits.len())?;
            values[reg.current.0 as usize] = Some(bits.clone());
        }

        let mut latches = state.reset_latches.clone();
        let mut symbolics = Vec::new();

        for &driver in &self.order {
            match driver {
                Driver::Node { contract, index } => {
                    let node = match contract {
                        None => &circuit.nodes[index],
                        Some(c) => &circuit.contracts[c].nodes[index],
                    };
                    let ins = node
                        .inputs
                        .iter()
                        .map(|&i| word(&values, circuit, i).map(<[D::Bit]>::to_vec))
                        .collect::<IrResult<Vec<_>>>()?;
                    let width = circuit.width(node.output);

                    let out = match &node.op {
                        CircuitOp::Symbolic => {
                            let name = circuit.signal_name(node.output);
                            let bits = dom.symbolic(&name, width);
                            symbolics.push((name, bits.clone()));
                            bits
                        }
                        CircuitOp::HasBeenReset { async_reset } => {
                            let slot = self.latch_slots.get(&(contract, index)).copied().ok_or_else(
                                || StructuralError::MalformedTask {
                                    task: circuit.name.clone(),
                                    detail: "reset latch missing".to_string(),
                                },
                            )?;
                            let next =
                                latches[slot].update(dom, *async_reset, &ins[0][0], &ins[1][0]);
                            let done = next.done.clone();
                            latches[slot] = next;
                            vec![done]
                        }
                        op => apply_op(dom, op, &ins, width),
                    };
                    values[node.output.0 as usize] = Some(out);
                }
                Driver::ContractResult { contract, index } => {
                    let k = &circuit.contracts[contract];
                    let bits = word(&values, circuit, k.operands[index])?.to_vec();
                    values[k.results[index].0 as usize] = Some(bits);
                }
                Driver::Input(_) | Driver::Register(_) => {}
            }
        }

        // Clocked registers hold their value unless their clock rose
        let mut registers = Vec::with_capacity(circuit.registers.len());
        for reg in &circuit.registers {
            let next = word(&values, circuit, reg.next)?.to_vec();
            let current = word(&values, circuit, reg.current)?;
            let latched = match reg.clock {
                None => next,
                Some(clock) => {
                    let clk = bit(&values, circuit, clock, dom)?;
                    let prev = state.prev_clocks.get(&clock);
                    let rising = edge_fires(dom, ClockEdge::Pos, prev, &clk);
                    next.iter()
                        .zip(current)
                        .map(|(n, c)| dom.mux(&rising, n, c))
                        .collect()
                }
            };
            registers.push(latched);
        }

        let mut obligations = Vec::with_capacity(circuit.properties.len());
        for (index, property) in circuit.properties.iter().enumerate() {
            let lookup = |id: SignalId| {
                word(&values, circuit, id)
                    .ok()
                    .and_then(|w| w.first().cloned())
            };
            let active = sample_predicate(dom, property, &lookup, &state.prev_clocks);
            let holds = eval_expr(dom, &property.expr, &lookup);
            obligations.push(Obligation {
                index,
                kind: property.kind,
                label: property.display_name(index),
                active,
                holds,
            });
        }

        let mut prev_clocks = BTreeMap::new();
        for &clock in &self.clocks {
            prev_clocks.insert(clock, bit(&values, circuit, clock, dom)?);
        }

        let outputs = circuit
            .outputs
            .iter()
            .map(|&o| word(&values, circuit, o).map(<[D::Bit]>::to_vec))
            .collect::<IrResult<Vec<_>>>()?;

        Ok(StepOutput {
            outputs,
            next: StepState {
                registers,
                reset_latches: latches,
                prev_clocks,
            },
            obligations,
            symbolics,
            values,
        })
    }
}

/// Whether `property` is sampled at this instant: its trigger edge fired
/// (always, when untriggered) and its enable is high (always, when absent).
pub fn sample_predicate<D, F>(
    dom: &mut D,
    property: &Property,
    lookup: &F,
    prev_clocks: &BTreeMap<SignalId, D::Bit>,
) -> D::Bit
where
    D: Domain,
    F: Fn(SignalId) -> Option<D::Bit>,
{
    let fired = match property.trigger {
        None => dom.constant(true),
        Some(trigger) => {
            let clk = lookup_bit(dom, lookup, trigger.clock);
            edge_fires(dom, trigger.edge, prev_clocks.get(&trigger.clock), &clk)
        }
    };
    match property.enable {
        None => fired,
        Some(enable) => {
            let en = lookup_bit(dom, lookup, enable);
            dom.and(&fired, &en)
        }
    }
}

/// Evaluate a property expression
pub fn eval_expr<D, F>(dom: &mut D, expr: &TemporalExpr, lookup: &F) -> D::Bit
where
    D: Domain,
    F: Fn(SignalId) -> Option<D::Bit>,
{
    match expr {
        TemporalExpr::Signal(id) => lookup_bit(dom, lookup, *id),
        TemporalExpr::Const(value) => dom.constant(*value),
        TemporalExpr::Not(inner) => {
            let v = eval_expr(dom, inner, lookup);
            dom.not(&v)
        }
        TemporalExpr::And(terms) => {
            let mut acc = dom.constant(true);
            for term in terms {
                let v = eval_expr(dom, term, lookup);
                acc = dom.and(&acc, &v);
            }
            acc
        }
        TemporalExpr::Or(terms) => {
            let mut acc = dom.constant(false);
            for term in terms {
                let v = eval_expr(dom, term, lookup);
                acc = dom.or(&acc, &v);
            }
            acc
        }
        TemporalExpr::Implies(a, b) => {
            let a = eval_expr(dom, a, lookup);
            let b = eval_expr(dom, b, lookup);
            let na = dom.not(&a);
            dom.or(&na, &b)
        }
    }
}

/// Evaluate a circuit once with concrete inputs, registers at their declared
/// initial values (zero when undeclared) and symbolic values at zero.
pub fn evaluate_concrete(circuit: &Circuit, inputs: &[BitValue]) -> IrResult<Vec<BitValue>> {
    let evaluator = Evaluator::new(circuit)?;
    let mut dom = BoolDomain::new(ZeroOracle);
    let state = evaluator.initial_state(&mut dom, &evaluator.default_initial_values())?;
    let inputs: Vec<Vec<bool>> = inputs.iter().map(BitValue::to_bits).collect();
    let out = evaluator.step(&mut dom, &inputs, &state)?;
    Ok(out.outputs.iter().map(|b| BitValue::from_bits(b)).collect())
}

fn lookup_bit<D, F>(dom: &mut D, lookup: &F, id: SignalId) -> D::Bit
where
    D: Domain,
    F: Fn(SignalId) -> Option<D::Bit>,
{
    // Validation guarantees every property signal is driven
    lookup(id).unwrap_or_else(|| dom.constant(false))
}

fn expect_len(circuit: &Circuit, id: SignalId, len: usize) -> IrResult<()> {
    let width = circuit.width(id);
    if width as usize != len {
        return Err(StructuralError::WidthMismatch {
            context: format!("value of '{}'", circuit.signal_name(id)),
            expected: width,
            found: len as u32,
        });
    }
    Ok(())
}

fn word<'v, B>(values: &'v [Option<Vec<B>>], circuit: &Circuit, id: SignalId) -> IrResult<&'v [B]> {
    values
        .get(id.0 as usize)
        .and_then(|v| v.as_deref())
        .ok_or_else(|| StructuralError::Undriven {
            name: circuit.signal_name(id),
        })
}

fn bit<D: Domain>(
    values: &[Option<Vec<D::Bit>>],
    circuit: &Circuit,
    id: SignalId,
    dom: &mut D,
) -> IrResult<D::Bit> {
    let w = word(values, circuit, id)?;
    Ok(w.first().cloned().unwrap_or_else(|| dom.constant(false)))
}

/// Pure word-level ops; stateful and symbolic ops are handled by the caller
fn apply_op<D: Domain>(
    dom: &mut D,
    op: &CircuitOp,
    ins: &[Vec<D::Bit>],
    width: u32,
) -> Vec<D::Bit> {
    let width = width as usize;
    match op {
        CircuitOp::Constant(value) => dom.constant_word(value),
        CircuitOp::Buf => ins[0].clone(),
        CircuitOp::Not => ins[0].iter().map(|a| dom.not(a)).collect(),
        CircuitOp::And => bitwise(dom, &ins[0], &ins[1], |d, a, b| d.and(a, b)),
        CircuitOp::Or => bitwise(dom, &ins[0], &ins[1], |d, a, b| d.or(a, b)),
        CircuitOp::Xor => bitwise(dom, &ins[0], &ins[1], |d, a, b| d.xor(a, b)),
        CircuitOp::Add => add(dom, &ins[0], &ins[1]),
        CircuitOp::Sub => sub(dom, &ins[0], &ins[1]),
        CircuitOp::Mul => mul(dom, &ins[0], &ins[1]),
        CircuitOp::Eq => vec![eq(dom, &ins[0], &ins[1])],
        CircuitOp::Ne => {
            let e = eq(dom, &ins[0], &ins[1]);
            vec![dom.not(&e)]
        }
        CircuitOp::Ult => vec![ult(dom, &ins[0], &ins[1])],
        CircuitOp::Ule => {
            // a <= b is !(b < a)
            let gt = ult(dom, &ins[1], &ins[0]);
            vec![dom.not(&gt)]
        }
        CircuitOp::Mux => {
            let sel = ins[0][0].clone();
            ins[1]
                .iter()
                .zip(&ins[2])
                .map(|(a, b)| dom.mux(&sel, b, a))
                .collect()
        }
        CircuitOp::Concat => ins.iter().flatten().cloned().collect(),
        CircuitOp::Extract { low } => {
            let low = *low as usize;
            ins[0][low..low + width].to_vec()
        }
        CircuitOp::ZeroExtend => {
            let mut out = ins[0].clone();
            while out.len() < width {
                out.push(dom.constant(false));
            }
            out
        }
        CircuitOp::ReduceAnd => {
            let mut acc = dom.constant(true);
            for b in &ins[0] {
                acc = dom.and(&acc, b);
            }
            vec![acc]
        }
        CircuitOp::ReduceOr => {
            let mut acc = dom.constant(false);
            for b in &ins[0] {
                acc = dom.or(&acc, b);
            }
            vec![acc]
        }
        CircuitOp::ReduceXor => {
            let mut acc = dom.constant(false);
            for b in &ins[0] {
                acc = dom.xor(&acc, b);
            }
            vec![acc]
        }
        CircuitOp::Symbolic | CircuitOp::HasBeenReset { .. } => {
            (0..width).map(|_| dom.constant(false)).collect()
        }
    }
}

fn bitwise<D: Domain>(
    dom: &mut D,
    a: &[D::Bit],
    b: &[D::Bit],
    f: impl Fn(&mut D, &D::Bit, &D::Bit) -> D::Bit,
) -> Vec<D::Bit> {
    a.iter().zip(b).map(|(x, y)| f(dom, x, y)).collect()
}

/// Ripple-carry adder, carry out dropped
fn add<D: Domain>(dom: &mut D, a: &[D::Bit], b: &[D::Bit]) -> Vec<D::Bit> {
    let mut carry = dom.constant(false);
    let mut out = Vec::with_capacity(a.len());
    for (x, y) in a.iter().zip(b) {
        // sum = a ^ b ^ cin, cout = (a & b) | (cin & (a ^ b))
        let x_xor_y = dom.xor(x, y);
        out.push(dom.xor(&x_xor_y, &carry));
        let x_and_y = dom.and(x, y);
        let cin_and_xor = dom.and(&carry, &x_xor_y);
        carry = dom.or(&x_and_y, &cin_and_xor);
    }
    out
}

/// Borrow out of `a - b`
fn borrow_chain<D: Domain>(
    dom: &mut D,
    a: &[D::Bit],
    b: &[D::Bit],
    diff: Option<&mut Vec<D::Bit>>,
) -> D::Bit {
    let mut borrow = dom.constant(false);
    let mut diff = diff;
    for (x, y) in a.iter().zip(b) {
        let x_xor_y = dom.xor(x, y);
        if let Some(out) = diff.as_mut() {
            out.push(dom.xor(&x_xor_y, &borrow));
        }
        // bout = (!a & b) | (borrow & !(a ^ b))
        let not_x = dom.not(x);
        let not_x_and_y = dom.and(&not_x, y);
        let same = dom.not(&x_xor_y);
        let borrow_and_same = dom.and(&borrow, &same);
        borrow = dom.or(&not_x_and_y, &borrow_and_same);
    }
    borrow
}

fn sub<D: Domain>(dom: &mut D, a: &[D::Bit], b: &[D::Bit]) -> Vec<D::Bit> {
    let mut out = Vec::with_capacity(a.len());
    borrow_chain(dom, a, b, Some(&mut out));
    out
}

fn ult<D: Domain>(dom: &mut D, a: &[D::Bit], b: &[D::Bit]) -> D::Bit {
    borrow_chain(dom, a, b, None)
}

/// Shift-and-add multiplier, truncated to the operand width
fn mul<D: Domain>(dom: &mut D, a: &[D::Bit], b: &[D::Bit]) -> Vec<D::Bit> {
    let width = a.len();
    let mut acc: Vec<D::Bit> = (0..width).map(|_| dom.constant(false)).collect();
    for (shift, y) in b.iter().enumerate() {
        let mut partial = Vec::with_capacity(width);
        for i in 0..width {
            if i < shift {
                partial.push(dom.constant(false));
            } else {
                partial.push(dom.and(&a[i - shift], y));
            }
        }
        acc = add(dom, &acc, &partial);
    }
    acc
}

fn eq<D: Domain>(dom: &mut D, a: &[D::Bit], b: &[D::Bit]) -> D::Bit {
    let mut result = dom.constant(true);
    for (x, y) in a.iter().zip(b) {
        let diff = dom.xor(x, y);
        let same = dom.not(&diff);
        result = dom.and(&result, &same);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReplayOracle;
    use proptest::prelude::*;

    fn binop(op: CircuitOp, width: u32, out_width: u32) -> Circuit {
        let mut c = Circuit::new(op.name());
        let a = c.add_input("a", width);
        let b = c.add_input("b", width);
        let y = c.add_op(op, vec![a, b], "y", out_width);
        c.add_output(y);
        c
    }

    fn run2(c: &Circuit, width: u32, a: u64, b: u64) -> u64 {
        let out = evaluate_concrete(
            c,
            &[BitValue::from_u64(width, a), BitValue::from_u64(width, b)],
        )
        .unwrap();
        out[0].to_u64()
    }

    proptest! {
        #[test]
        fn arithmetic_matches_u8(a in 0u64..256, b in 0u64..256) {
            prop_assert_eq!(run2(&binop(CircuitOp::Add, 8, 8), 8, a, b), (a + b) & 0xff);
            prop_assert_eq!(run2(&binop(CircuitOp::Sub, 8, 8), 8, a, b), a.wrapping_sub(b) & 0xff);
            prop_assert_eq!(run2(&binop(CircuitOp::Mul, 8, 8), 8, a, b), (a * b) & 0xff);
            prop_assert_eq!(run2(&binop(CircuitOp::Ult, 8, 1), 8, a, b), (a < b) as u64);
            prop_assert_eq!(run2(&binop(CircuitOp::Ule, 8, 1), 8, a, b), (a <= b) as u64);
            prop_assert_eq!(run2(&binop(CircuitOp::Eq, 8, 1), 8, a, b), (a == b) as u64);
            prop_assert_eq!(run2(&binop(CircuitOp::Ne, 8, 1), 8, a, b), (a != b) as u64);
            prop_assert_eq!(run2(&binop(CircuitOp::Xor, 8, 8), 8, a, b), a ^ b);
        }
    }

    #[test]
    fn test_mux_concat_extract() {
        let mut c = Circuit::new("mix");
        let s = c.add_input("s", 1);
        let a = c.add_input("a", 4);
        let b = c.add_input("b", 4);
        let m = c.add_op(CircuitOp::Mux, vec![s, a, b], "m", 4);
        let cat = c.add_op(CircuitOp::Concat, vec![a, b], "cat", 8);
        let hi = c.add_op(CircuitOp::Extract { low: 4 }, vec![cat], "hi", 4);
        let wide = c.add_op(CircuitOp::ZeroExtend, vec![a], "wide", 6);
        let par = c.add_op(CircuitOp::ReduceXor, vec![a], "par", 1);
        for o in [m, cat, hi, wide, par] {
            c.add_output(o);
        }

        let out = |sel: u64| {
            evaluate_concrete(
                &c,
                &[
                    BitValue::from_u64(1, sel),
                    BitValue::from_u64(4, 0x3),
                    BitValue::from_u64(4, 0xa),
                ],
            )
            .unwrap()
        };
        let low = out(0);
        assert_eq!(low[0].to_u64(), 0x3);
        assert_eq!(low[1].to_u64(), 0xa3);
        assert_eq!(low[2].to_u64(), 0xa);
        assert_eq!(low[3].width(), 6);
        assert_eq!(low[3].to_u64(), 0x3);
        assert_eq!(low[4].to_u64(), 0);
        assert_eq!(out(1)[0].to_u64(), 0xa);
    }

    fn counter() -> Circuit {
        let mut c = Circuit::new("counter");
        let clk = c.add_input("clk", 1);
        let r = c.add_clocked_register("count", 4, Some(BitValue::zero(4)), clk);
        let one = c.add_constant("one", BitValue::from_u64(4, 1));
        c.add_node(CircuitOp::Add, vec![r.current, one], r.next, "inc");
        c.add_output(r.current);
        c
    }

    #[test]
    fn test_clocked_register_latches_on_rising_edge() {
        let c = counter();
        let ev = Evaluator::new(&c).unwrap();
        let mut dom = BoolDomain::new(ZeroOracle);
        let mut state = ev.initial_state(&mut dom, &ev.default_initial_values()).unwrap();

        let mut seen = Vec::new();
        for clk in [false, true, true, false, true, false, true] {
            let out = ev.step(&mut dom, &[vec![clk]], &state).unwrap();
            seen.push(BitValue::from_bits(&out.outputs[0]).to_u64());
            state = out.next;
        }
        // value observed before each evaluation's latch
        assert_eq!(seen, vec![0, 0, 1, 1, 1, 2, 2]);
        assert_eq!(BitValue::from_bits(&state.registers[0]).to_u64(), 3);
    }

    #[test]
    fn test_unclocked_register_latches_every_step() {
        let mut c = Circuit::new("toggle");
        let r = c.add_register("r", 1, Some(BitValue::zero(1)));
        c.add_node(CircuitOp::Not, vec![r.current], r.next, "n");
        c.add_output(r.current);

        let ev = Evaluator::new(&c).unwrap();
        let mut dom = BoolDomain::new(ZeroOracle);
        let mut state = ev.initial_state(&mut dom, &ev.default_initial_values()).unwrap();
        let mut seen = Vec::new();
        for _ in 0..4 {
            let out = ev.step(&mut dom, &[], &state).unwrap();
            seen.push(out.outputs[0][0]);
            state = out.next;
        }
        assert_eq!(seen, vec![false, true, false, true]);
    }

    #[test]
    fn test_obligations_sample_on_edge_with_enable() {
        let mut c = Circuit::new("props");
        let clk = c.add_input("clk", 1);
        let en = c.add_input("en", 1);
        let ok = c.add_input("ok", 1);
        c.add_property(
            Property::assert(ok)
                .with_enable(en)
                .on_edge(ClockEdge::Pos, clk)
                .with_label("ok_high"),
        );
        c.add_property(Property::cover(ok));

        let ev = Evaluator::new(&c).unwrap();
        let mut dom = BoolDomain::new(ZeroOracle);
        let mut state = ev.initial_state(&mut dom, &[]).unwrap();

        let mut active = Vec::new();
        for (clk, en) in [(false, true), (true, true), (true, true), (false, true), (true, false)] {
            let out = ev.step(&mut dom, &[vec![clk], vec![en], vec![false]], &state).unwrap();
            assert_eq!(out.obligations[0].label, "ok_high");
            assert_eq!(out.obligations[1].label, "cover#1");
            assert!(out.obligations[1].active);
            assert!(!out.obligations[0].holds);
            active.push(out.obligations[0].active);
            state = out.next;
        }
        assert_eq!(active, vec![false, true, false, false, false]);
    }

    #[test]
    fn test_symbolics_are_recorded() {
        let mut c = Circuit::new("sym");
        let x = c.add_symbolic("x", 3);
        c.add_output(x);
        let ev = Evaluator::new(&c).unwrap();
        let mut dom = BoolDomain::new(ReplayOracle::new(vec![BitValue::from_u64(3, 5)]));
        let state = ev.initial_state(&mut dom, &[]).unwrap();
        let out = ev.step(&mut dom, &[], &state).unwrap();
        assert_eq!(out.symbolics.len(), 1);
        assert_eq!(out.symbolics[0].0, "x");
        assert_eq!(BitValue::from_bits(&out.outputs[0]).to_u64(), 5);
        assert_eq!(out.value(x).map(|v| v.len()), Some(3));
    }

    #[test]
    fn test_contract_is_transparent() {
        let mut c = Circuit::new("k");
        let a = c.add_input("a", 8);
        let k = c.add_contract("k", vec![a]);
        let r = c.contracts[k].results[0];
        let pre = c.add_contract_op(k, CircuitOp::ReduceOr, vec![a], "pre", 1);
        c.add_contract_property(k, Property::require(pre));
        c.add_output(r);
        let out = evaluate_concrete(&c, &[BitValue::zero(8)]).unwrap();
        assert_eq!(out[0], BitValue::zero(8));
    }

    #[test]
    fn test_input_width_is_checked() {
        let c = binop(CircuitOp::Add, 8, 8);
        let err = evaluate_concrete(&c, &[BitValue::zero(8), BitValue::zero(4)]).unwrap_err();
        assert!(matches!(err, StructuralError::WidthMismatch { .. }));
    }

    #[test]
    fn test_initial_value_count_is_checked() {
        let c = counter();
        let ev = Evaluator::new(&c).unwrap();
        let mut dom = BoolDomain::new(ZeroOracle);
        assert!(matches!(
            ev.initial_state(&mut dom, &[]),
            Err(StructuralError::MalformedTask { .. })
        ));
    }
}
