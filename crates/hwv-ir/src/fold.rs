//! Dead property folding
//!
//! A property whose enable is a constant zero can never be sampled. Removing
//! it up front saves the solver some work; results are the same either way.

use crate::circuit::{Circuit, CircuitOp, SignalId};
use crate::property::Property;
use std::collections::HashSet;
use tracing::debug;

/// Remove properties (circuit-level and inside contracts) whose enable is
/// driven by a zero constant. Returns how many were removed.
///
/// Unlabeled circuit-level survivors are labeled with the name they had
/// before folding, so reports keep naming them the same way.
pub fn fold_dead_properties(circuit: &mut Circuit) -> usize {
    let zeros: HashSet<SignalId> = circuit
        .all_nodes()
        .filter(|n| matches!(&n.op, CircuitOp::Constant(v) if v.is_zero()))
        .map(|n| n.output)
        .collect();

    let live = |p: &Property| !p.enable.is_some_and(|e| zeros.contains(&e));

    let before = count(circuit);
    if !circuit.properties.iter().all(live) {
        circuit.properties = std::mem::take(&mut circuit.properties)
            .into_iter()
            .enumerate()
            .filter(|(_, p)| live(p))
            .map(|(i, p)| {
                let name = p.display_name(i);
                p.with_label(name)
            })
            .collect();
    }
    for contract in &mut circuit.contracts {
        contract.properties.retain(live);
    }
    let removed = before - count(circuit);
    if removed > 0 {
        debug!(circuit = %circuit.name, removed, "folded dead properties");
    }
    removed
}

fn count(circuit: &Circuit) -> usize {
    circuit.properties.len()
        + circuit
            .contracts
            .iter()
            .map(|c| c.properties.len())
            .sum::<usize>()
}
