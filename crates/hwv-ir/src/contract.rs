//! Contract rewriting
//!
//! A contract is a pass-through with require/ensure clauses. It is used two
//! ways:
//!
//! - checked in isolation ([`check_contracts`]): the requires are assumed,
//!   the ensures asserted, with the results tied to the operands;
//! - applied at the use site ([`apply_contracts`]): the results become fresh
//!   symbolic values constrained only by the ensures, and the requires turn
//!   into obligations on the surrounding logic.
//!
//! Both rewrites are structural; nothing here evaluates a circuit.

use crate::circuit::{Circuit, CircuitOp, Node};
use crate::error::IrResult;
use crate::property::{Property, PropertyKind};
use crate::task::FormalTask;
use crate::validate::validate;
use tracing::debug;

/// One formal task per contract, proving its ensures under its requires.
///
/// Registers are cut: their outputs become free symbolic values so the
/// contract is checked for every reachable and unreachable state. Other
/// contracts stay transparent and circuit-level properties are dropped.
pub fn check_contracts(circuit: &Circuit) -> IrResult<Vec<FormalTask>> {
    validate(circuit)?;

    let mut tasks = Vec::with_capacity(circuit.contracts.len());
    for (index, contract) in circuit.contracts.iter().enumerate() {
        let mut checked = circuit.clone();
        checked.name = format!("{}.{}", circuit.name, contract.label);
        checked.properties.clear();

        for reg in std::mem::take(&mut checked.registers) {
            checked.nodes.push(Node {
                op: CircuitOp::Symbolic,
                inputs: vec![],
                output: reg.current,
                path: reg.name,
            });
        }

        let contract = checked.contracts.remove(index);
        for (&operand, &result) in contract.operands.iter().zip(&contract.results) {
            checked.nodes.push(Node {
                op: CircuitOp::Buf,
                inputs: vec![operand],
                output: result,
                path: contract.label.clone(),
            });
        }
        checked.nodes.extend(contract.nodes);
        for property in &contract.properties {
            checked.properties.push(match property.kind {
                PropertyKind::Require => property.retagged(PropertyKind::Assume),
                _ => property.retagged(PropertyKind::Assert),
            });
        }

        validate(&checked)?;
        debug!(
            contract = %contract.label,
            properties = checked.properties.len(),
            "built contract check"
        );
        tasks.push(FormalTask::new(checked.name.clone(), checked, 1));
    }
    Ok(tasks)
}

/// Replace every contract by its obligations: results become symbolic,
/// requires are asserted, ensures are assumed.
pub fn apply_contracts(circuit: &Circuit) -> IrResult<Circuit> {
    validate(circuit)?;

    let mut applied = circuit.clone();
    for contract in std::mem::take(&mut applied.contracts) {
        for &result in &contract.results {
            applied.nodes.push(Node {
                op: CircuitOp::Symbolic,
                inputs: vec![],
                output: result,
                path: contract.label.clone(),
            });
        }
        applied.nodes.extend(contract.nodes);
        applied
            .properties
            .extend(contract.properties.iter().map(flip_clause));
    }

    validate(&applied)?;
    Ok(applied)
}

fn flip_clause(property: &Property) -> Property {
    match property.kind {
        PropertyKind::Require => property.retagged(PropertyKind::Assert),
        _ => property.retagged(PropertyKind::Assume),
    }
}
