//! Structural errors
//!
//! Everything in here is detected statically, before a circuit is evaluated
//! or a solver is consulted.

use crate::circuit::SignalId;
use crate::property::PropertyKind;
use thiserror::Error;

/// Result type for IR operations
pub type IrResult<T> = Result<T, StructuralError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("signal {0} does not exist")]
    UnknownSignal(SignalId),

    #[error("signal '{name}' is used but never driven")]
    Undriven { name: String },

    #[error("signal '{name}' has more than one driver")]
    MultipleDrivers { name: String },

    #[error("{context}: expected width {expected}, found {found}")]
    WidthMismatch {
        context: String,
        expected: u32,
        found: u32,
    },

    #[error("{context}: expected {expected} operands, found {found}")]
    Arity {
        context: String,
        expected: usize,
        found: usize,
    },

    #[error("combinational cycle through signal '{name}'")]
    CombinationalCycle { name: String },

    #[error("register '{name}' has width {width} but its next state has width {next_width}")]
    RegisterShape {
        name: String,
        width: u32,
        next_width: u32,
    },

    #[error("contract '{label}' has {operands} operands but {results} results")]
    ContractArity {
        label: String,
        operands: usize,
        results: usize,
    },

    #[error("contract '{label}' operand {index} is {operand} bits wide, its result {result}")]
    ContractWidth {
        label: String,
        index: usize,
        operand: u32,
        result: u32,
    },

    #[error("{kind:?} property not allowed {context}")]
    MisplacedProperty { kind: PropertyKind, context: String },

    #[error("circuit '{circuit}' is sequential; relation checks need combinational circuits")]
    SequentialRelation { circuit: String },

    #[error("task '{task}': {detail}")]
    MalformedTask { task: String, detail: String },
}
