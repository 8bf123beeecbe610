//! Word-level circuit representation
//!
//! A `Circuit` is an arena of signals plus the nodes that drive them. It is a
//! pure function of (external inputs, register state) to (outputs, next
//! register state); registers are explicit state slots whose values are
//! threaded by the caller, never kept inside the circuit.
//!
//! ```text
//! inputs ──┐                       ┌──> outputs
//!          ├──> nodes (DAG) ───────┤
//! regs.q ──┘                       └──> regs.next
//! ```

use crate::property::Property;
use crate::value::BitValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a signal in its circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalId(pub u32);

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub id: SignalId,
    pub name: String,
    pub width: u32,
}

/// Word-level operations.
///
/// Operand order matters: `Mux` takes `[sel, when_false, when_true]`,
/// `Concat` takes its least significant operand first and `HasBeenReset`
/// takes `[clock, reset]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitOp {
    Constant(BitValue),
    Buf,
    Not,
    And,
    Or,
    Xor,
    /// Wrapping addition
    Add,
    /// Wrapping subtraction
    Sub,
    /// Wrapping multiplication
    Mul,
    Eq,
    Ne,
    /// Unsigned less than
    Ult,
    /// Unsigned less than or equal
    Ule,
    Mux,
    Concat,
    /// Bits `[low, low + width)` of the operand
    Extract { low: u32 },
    ZeroExtend,
    ReduceAnd,
    ReduceOr,
    ReduceXor,
    /// Free value, re-chosen at every evaluation
    Symbolic,
    /// Goes high once reset has been asserted and then released, and stays high
    HasBeenReset { async_reset: bool },
}

impl CircuitOp {
    pub fn name(&self) -> &'static str {
        match self {
            CircuitOp::Constant(_) => "const",
            CircuitOp::Buf => "buf",
            CircuitOp::Not => "not",
            CircuitOp::And => "and",
            CircuitOp::Or => "or",
            CircuitOp::Xor => "xor",
            CircuitOp::Add => "add",
            CircuitOp::Sub => "sub",
            CircuitOp::Mul => "mul",
            CircuitOp::Eq => "eq",
            CircuitOp::Ne => "ne",
            CircuitOp::Ult => "ult",
            CircuitOp::Ule => "ule",
            CircuitOp::Mux => "mux",
            CircuitOp::Concat => "concat",
            CircuitOp::Extract { .. } => "extract",
            CircuitOp::ZeroExtend => "zext",
            CircuitOp::ReduceAnd => "reduce_and",
            CircuitOp::ReduceOr => "reduce_or",
            CircuitOp::ReduceXor => "reduce_xor",
            CircuitOp::Symbolic => "symbolic",
            CircuitOp::HasBeenReset { .. } => "has_been_reset",
        }
    }

    /// Ops that carry hidden state across evaluations
    pub fn is_stateful(&self) -> bool {
        matches!(self, CircuitOp::HasBeenReset { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub op: CircuitOp,
    pub inputs: Vec<SignalId>,
    pub output: SignalId,
    /// Hierarchical path, for diagnostics only
    #[serde(default)]
    pub path: String,
}

/// State element. `current` is the value read by the body, `next` the value
/// it computes for the following evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Register {
    pub name: String,
    pub width: u32,
    pub current: SignalId,
    pub next: SignalId,
    /// Absent means unconstrained at the first evaluation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<BitValue>,
    /// When present the register only latches on a rising edge of this clock
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock: Option<SignalId>,
}

/// Ports handed back when a register is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterPorts {
    pub current: SignalId,
    pub next: SignalId,
}

/// Pass-through contract: `results` equal `operands` outside of verification;
/// the body's require/ensure clauses describe what may be assumed about them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub label: String,
    pub operands: Vec<SignalId>,
    pub results: Vec<SignalId>,
    /// Logic local to the contract body
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Circuit {
    pub name: String,
    pub signals: Vec<Signal>,
    pub inputs: Vec<SignalId>,
    pub outputs: Vec<SignalId>,
    #[serde(default)]
    pub registers: Vec<Register>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub contracts: Vec<Contract>,
}

impl Circuit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signals: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            registers: Vec::new(),
            nodes: Vec::new(),
            properties: Vec::new(),
            contracts: Vec::new(),
        }
    }

    /// Add an undriven signal and return its ID
    pub fn add_signal(&mut self, name: impl Into<String>, width: u32) -> SignalId {
        let id = SignalId(self.signals.len() as u32);
        self.signals.push(Signal {
            id,
            name: name.into(),
            width,
        });
        id
    }

    /// Add an external input
    pub fn add_input(&mut self, name: impl Into<String>, width: u32) -> SignalId {
        let id = self.add_signal(name, width);
        self.inputs.push(id);
        id
    }

    /// Expose an existing signal as an output
    pub fn add_output(&mut self, signal: SignalId) {
        self.outputs.push(signal);
    }

    /// Add a node driving an existing signal
    pub fn add_node(
        &mut self,
        op: CircuitOp,
        inputs: Vec<SignalId>,
        output: SignalId,
        path: impl Into<String>,
    ) {
        self.nodes.push(Node {
            op,
            inputs,
            output,
            path: path.into(),
        });
    }

    /// Add a node together with the signal it drives
    pub fn add_op(
        &mut self,
        op: CircuitOp,
        inputs: Vec<SignalId>,
        name: impl Into<String>,
        width: u32,
    ) -> SignalId {
        let name = name.into();
        let output = self.add_signal(name.clone(), width);
        self.add_node(op, inputs, output, name);
        output
    }

    pub fn add_constant(&mut self, name: impl Into<String>, value: BitValue) -> SignalId {
        let width = value.width();
        self.add_op(CircuitOp::Constant(value), vec![], name, width)
    }

    pub fn add_symbolic(&mut self, name: impl Into<String>, width: u32) -> SignalId {
        self.add_op(CircuitOp::Symbolic, vec![], name, width)
    }

    /// Add a register latching on every evaluation
    pub fn add_register(
        &mut self,
        name: impl Into<String>,
        width: u32,
        init: Option<BitValue>,
    ) -> RegisterPorts {
        let name = name.into();
        let current = self.add_signal(name.clone(), width);
        let next = self.add_signal(format!("{}.next", name), width);
        self.registers.push(Register {
            name,
            width,
            current,
            next,
            init,
            clock: None,
        });
        RegisterPorts { current, next }
    }

    /// Add a register latching on rising edges of `clock`
    pub fn add_clocked_register(
        &mut self,
        name: impl Into<String>,
        width: u32,
        init: Option<BitValue>,
        clock: SignalId,
    ) -> RegisterPorts {
        let ports = self.add_register(name, width, init);
        if let Some(reg) = self.registers.last_mut() {
            reg.clock = Some(clock);
        }
        ports
    }

    pub fn add_property(&mut self, property: Property) {
        self.properties.push(property);
    }

    /// Add a contract over `operands`; result signals are created with the
    /// same widths. Returns the contract index.
    pub fn add_contract(&mut self, label: impl Into<String>, operands: Vec<SignalId>) -> usize {
        let label = label.into();
        let results = operands
            .iter()
            .enumerate()
            .map(|(i, &op)| {
                let width = self.width(op);
                self.add_signal(format!("{}.result{}", label, i), width)
            })
            .collect();
        self.contracts.push(Contract {
            label,
            operands,
            results,
            nodes: Vec::new(),
            properties: Vec::new(),
        });
        self.contracts.len() - 1
    }

    /// Add a node local to a contract body
    pub fn add_contract_op(
        &mut self,
        contract: usize,
        op: CircuitOp,
        inputs: Vec<SignalId>,
        name: impl Into<String>,
        width: u32,
    ) -> SignalId {
        let name = name.into();
        let output = self.add_signal(name.clone(), width);
        self.contracts[contract].nodes.push(Node {
            op,
            inputs,
            output,
            path: name,
        });
        output
    }

    pub fn add_contract_property(&mut self, contract: usize, property: Property) {
        self.contracts[contract].properties.push(property);
    }

    pub fn signal(&self, id: SignalId) -> Option<&Signal> {
        self.signals.get(id.0 as usize)
    }

    /// Width of a signal; unknown signals read as width 0
    pub fn width(&self, id: SignalId) -> u32 {
        self.signal(id).map(|s| s.width).unwrap_or(0)
    }

    pub fn signal_name(&self, id: SignalId) -> String {
        self.signal(id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn find_signal(&self, name: &str) -> Option<SignalId> {
        self.signals.iter().find(|s| s.name == name).map(|s| s.id)
    }

    pub fn input_widths(&self) -> Vec<u32> {
        self.inputs.iter().map(|&id| self.width(id)).collect()
    }

    pub fn output_widths(&self) -> Vec<u32> {
        self.outputs.iter().map(|&id| self.width(id)).collect()
    }

    /// Registers or stateful ops anywhere in the body
    pub fn is_sequential(&self) -> bool {
        !self.registers.is_empty()
            || self
                .all_nodes()
                .any(|node| node.op.is_stateful())
    }

    /// Circuit nodes followed by the nodes of every contract body
    pub fn all_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes
            .iter()
            .chain(self.contracts.iter().flat_map(|c| c.nodes.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_counter() {
        let mut c = Circuit::new("counter");
        let clk = c.add_input("clk", 1);
        let reg = c.add_clocked_register("count", 4, Some(BitValue::zero(4)), clk);
        let one = c.add_constant("one", BitValue::from_u64(4, 1));
        c.add_node(CircuitOp::Add, vec![reg.current, one], reg.next, "inc");
        c.add_output(reg.current);

        assert_eq!(c.inputs.len(), 1);
        assert_eq!(c.registers[0].clock, Some(clk));
        assert_eq!(c.signal_name(reg.next), "count.next");
        assert_eq!(c.output_widths(), vec![4]);
        assert!(c.is_sequential());
        assert_eq!(c.find_signal("one"), Some(one));
    }

    #[test]
    fn test_contract_results_match_operands() {
        let mut c = Circuit::new("wrapped");
        let a = c.add_input("a", 8);
        let b = c.add_input("b", 3);
        let k = c.add_contract("pair", vec![a, b]);
        let contract = &c.contracts[k];
        assert_eq!(contract.results.len(), 2);
        assert_eq!(c.width(contract.results[0]), 8);
        assert_eq!(c.width(contract.results[1]), 3);
        assert!(!c.is_sequential());
    }

    #[test]
    fn test_has_been_reset_is_sequential() {
        let mut c = Circuit::new("hbr");
        let clk = c.add_input("clk", 1);
        let rst = c.add_input("rst", 1);
        c.add_op(
            CircuitOp::HasBeenReset { async_reset: false },
            vec![clk, rst],
            "seen",
            1,
        );
        assert!(c.is_sequential());
    }
}
