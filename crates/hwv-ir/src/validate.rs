//! Structural validation and evaluation ordering
//!
//! Runs before anything is evaluated: every signal must exist and be driven
//! exactly once, op widths must agree, registers and contracts must be well
//! shaped and properties must sit where their kind allows. The combinational
//! part must be acyclic; its topological order is what the evaluator walks.

use crate::circuit::{Circuit, CircuitOp, Node, SignalId};
use crate::error::{IrResult, StructuralError};
use crate::property::Property;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Something that drives a signal during evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Driver {
    /// External input
    Input(usize),
    /// Register current value
    Register(usize),
    /// Circuit node (`contract = None`) or contract body node
    Node {
        contract: Option<usize>,
        index: usize,
    },
    /// Contract result, equal to the matching operand
    ContractResult { contract: usize, index: usize },
}

impl Driver {
    /// Drivers computed from other signals
    pub fn is_combinational(&self) -> bool {
        matches!(self, Driver::Node { .. } | Driver::ContractResult { .. })
    }
}

/// Check a circuit without evaluating it
pub fn validate(circuit: &Circuit) -> IrResult<()> {
    evaluation_order(circuit).map(|_| ())
}

/// Validate and return the combinational drivers in dependency order
pub fn evaluation_order(circuit: &Circuit) -> IrResult<Vec<Driver>> {
    let drivers = collect_drivers(circuit)?;
    check_nodes(circuit, &drivers)?;
    check_registers(circuit, &drivers)?;
    check_contracts(circuit, &drivers)?;
    check_properties(circuit, &drivers)?;
    for &out in &circuit.outputs {
        require_driven(circuit, &drivers, out)?;
    }
    order(circuit, &drivers)
}

fn collect_drivers(circuit: &Circuit) -> IrResult<HashMap<SignalId, Driver>> {
    let mut drivers = HashMap::new();
    let mut claim = |signal: SignalId, driver: Driver| -> IrResult<()> {
        if circuit.signal(signal).is_none() {
            return Err(StructuralError::UnknownSignal(signal));
        }
        if drivers.insert(signal, driver).is_some() {
            return Err(StructuralError::MultipleDrivers {
                name: circuit.signal_name(signal),
            });
        }
        Ok(())
    };

    for (i, &input) in circuit.inputs.iter().enumerate() {
        claim(input, Driver::Input(i))?;
    }
    for (i, reg) in circuit.registers.iter().enumerate() {
        claim(reg.current, Driver::Register(i))?;
    }
    for (index, node) in circuit.nodes.iter().enumerate() {
        claim(
            node.output,
            Driver::Node {
                contract: None,
                index,
            },
        )?;
    }
    for (c, contract) in circuit.contracts.iter().enumerate() {
        for (index, node) in contract.nodes.iter().enumerate() {
            claim(
                node.output,
                Driver::Node {
                    contract: Some(c),
                    index,
                },
            )?;
        }
        for (index, &result) in contract.results.iter().enumerate() {
            claim(result, Driver::ContractResult { contract: c, index })?;
        }
    }
    Ok(drivers)
}

fn require_driven(
    circuit: &Circuit,
    drivers: &HashMap<SignalId, Driver>,
    signal: SignalId,
) -> IrResult<u32> {
    let width = circuit
        .signal(signal)
        .map(|s| s.width)
        .ok_or(StructuralError::UnknownSignal(signal))?;
    if !drivers.contains_key(&signal) {
        return Err(StructuralError::Undriven {
            name: circuit.signal_name(signal),
        });
    }
    Ok(width)
}

fn expect_width(context: &str, expected: u32, found: u32) -> IrResult<()> {
    if expected != found {
        return Err(StructuralError::WidthMismatch {
            context: context.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

fn check_nodes(circuit: &Circuit, drivers: &HashMap<SignalId, Driver>) -> IrResult<()> {
    for node in circuit.all_nodes() {
        check_node(circuit, drivers, node)?;
    }
    Ok(())
}

fn check_node(
    circuit: &Circuit,
    drivers: &HashMap<SignalId, Driver>,
    node: &Node,
) -> IrResult<()> {
    let context = format!("{} '{}'", node.op.name(), circuit.signal_name(node.output));
    let out = circuit.width(node.output);
    let ins = node
        .inputs
        .iter()
        .map(|&i| require_driven(circuit, drivers, i))
        .collect::<IrResult<Vec<u32>>>()?;

    let arity = |expected: usize| -> IrResult<()> {
        if ins.len() != expected {
            return Err(StructuralError::Arity {
                context: context.clone(),
                expected,
                found: ins.len(),
            });
        }
        Ok(())
    };

    match &node.op {
        CircuitOp::Constant(value) => {
            arity(0)?;
            expect_width(&context, out, value.width())
        }
        CircuitOp::Symbolic => arity(0),
        CircuitOp::Buf | CircuitOp::Not => {
            arity(1)?;
            expect_width(&context, out, ins[0])
        }
        CircuitOp::And
        | CircuitOp::Or
        | CircuitOp::Xor
        | CircuitOp::Add
        | CircuitOp::Sub
        | CircuitOp::Mul => {
            arity(2)?;
            expect_width(&context, out, ins[0])?;
            expect_width(&context, out, ins[1])
        }
        CircuitOp::Eq | CircuitOp::Ne | CircuitOp::Ult | CircuitOp::Ule => {
            arity(2)?;
            expect_width(&context, ins[0], ins[1])?;
            expect_width(&context, 1, out)
        }
        CircuitOp::Mux => {
            arity(3)?;
            expect_width(&context, 1, ins[0])?;
            expect_width(&context, out, ins[1])?;
            expect_width(&context, out, ins[2])
        }
        CircuitOp::Concat => {
            if ins.is_empty() {
                return Err(StructuralError::Arity {
                    context,
                    expected: 1,
                    found: 0,
                });
            }
            let total = ins
                .iter()
                .try_fold(0u32, |acc, &w| acc.checked_add(w))
                .unwrap_or(u32::MAX);
            expect_width(&context, out, total)
        }
        CircuitOp::Extract { low } => {
            arity(1)?;
            match low.checked_add(out) {
                Some(high) if high <= ins[0] => Ok(()),
                high => Err(StructuralError::WidthMismatch {
                    context,
                    expected: ins[0],
                    found: high.unwrap_or(u32::MAX),
                }),
            }
        }
        CircuitOp::ZeroExtend => {
            arity(1)?;
            if out < ins[0] {
                return Err(StructuralError::WidthMismatch {
                    context,
                    expected: ins[0],
                    found: out,
                });
            }
            Ok(())
        }
        CircuitOp::ReduceAnd | CircuitOp::ReduceOr | CircuitOp::ReduceXor => {
            arity(1)?;
            expect_width(&context, 1, out)
        }
        CircuitOp::HasBeenReset { .. } => {
            arity(2)?;
            expect_width(&context, 1, ins[0])?;
            expect_width(&context, 1, ins[1])?;
            expect_width(&context, 1, out)
        }
    }
}

fn check_registers(circuit: &Circuit, drivers: &HashMap<SignalId, Driver>) -> IrResult<()> {
    for reg in &circuit.registers {
        let width = circuit.width(reg.current);
        let next_width = require_driven(circuit, drivers, reg.next)?;
        if width != reg.width || next_width != reg.width {
            return Err(StructuralError::RegisterShape {
                name: reg.name.clone(),
                width: reg.width,
                next_width,
            });
        }
        if let Some(init) = &reg.init {
            expect_width(
                &format!("initial value of register '{}'", reg.name),
                reg.width,
                init.width(),
            )?;
        }
        if let Some(clock) = reg.clock {
            let w = require_driven(circuit, drivers, clock)?;
            expect_width(&format!("clock of register '{}'", reg.name), 1, w)?;
        }
    }
    Ok(())
}

fn check_contracts(circuit: &Circuit, drivers: &HashMap<SignalId, Driver>) -> IrResult<()> {
    for contract in &circuit.contracts {
        if contract.operands.len() != contract.results.len() {
            return Err(StructuralError::ContractArity {
                label: contract.label.clone(),
                operands: contract.operands.len(),
                results: contract.results.len(),
            });
        }
        for (index, (&operand, &result)) in contract
            .operands
            .iter()
            .zip(&contract.results)
            .enumerate()
        {
            let operand = require_driven(circuit, drivers, operand)?;
            let result = circuit.width(result);
            if operand != result {
                return Err(StructuralError::ContractWidth {
                    label: contract.label.clone(),
                    index,
                    operand,
                    result,
                });
            }
        }
        for property in &contract.properties {
            if !property.kind.is_contract_clause() {
                return Err(StructuralError::MisplacedProperty {
                    kind: property.kind,
                    context: format!("inside contract '{}'", contract.label),
                });
            }
            check_property_signals(circuit, drivers, property)?;
        }
    }
    Ok(())
}

fn check_properties(circuit: &Circuit, drivers: &HashMap<SignalId, Driver>) -> IrResult<()> {
    for property in &circuit.properties {
        if property.kind.is_contract_clause() {
            return Err(StructuralError::MisplacedProperty {
                kind: property.kind,
                context: "outside a contract".to_string(),
            });
        }
        check_property_signals(circuit, drivers, property)?;
    }
    Ok(())
}

fn check_property_signals(
    circuit: &Circuit,
    drivers: &HashMap<SignalId, Driver>,
    property: &Property,
) -> IrResult<()> {
    for signal in property.referenced_signals() {
        let width = require_driven(circuit, drivers, signal)?;
        expect_width(
            &format!("{} property signal '{}'", property.kind, circuit.signal_name(signal)),
            1,
            width,
        )?;
    }
    Ok(())
}

/// Signals a driver reads within the same evaluation
fn dependencies(circuit: &Circuit, driver: Driver) -> Vec<SignalId> {
    match driver {
        Driver::Input(_) | Driver::Register(_) => Vec::new(),
        Driver::Node { contract, index } => {
            let node = match contract {
                None => &circuit.nodes[index],
                Some(c) => &circuit.contracts[c].nodes[index],
            };
            node.inputs.clone()
        }
        Driver::ContractResult { contract, index } => {
            vec![circuit.contracts[contract].operands[index]]
        }
    }
}

fn order(circuit: &Circuit, drivers: &HashMap<SignalId, Driver>) -> IrResult<Vec<Driver>> {
    let mut graph = DiGraph::<(SignalId, Driver), ()>::new();
    let mut index: HashMap<SignalId, NodeIndex> = HashMap::new();

    let mut combinational: Vec<(SignalId, Driver)> = drivers
        .iter()
        .filter(|(_, d)| d.is_combinational())
        .map(|(&s, &d)| (s, d))
        .collect();
    // HashMap order is arbitrary; keep the graph deterministic
    combinational.sort_by_key(|(s, _)| *s);

    for &(signal, driver) in &combinational {
        index.insert(signal, graph.add_node((signal, driver)));
    }

    // Edge a -> b when b reads the signal a drives
    for &(signal, driver) in &combinational {
        let b = index[&signal];
        for dep in dependencies(circuit, driver) {
            if let Some(&a) = index.get(&dep) {
                graph.add_edge(a, b, ());
            }
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(|n| graph[n].1).collect()),
        Err(cycle) => Err(StructuralError::CombinationalCycle {
            name: circuit.signal_name(graph[cycle.node_id()].0),
        }),
    }
}
