//! Circuit IR for hardware verification
//!
//! Signals, word-level nodes, registers, properties and contracts, plus the
//! execution engine that evaluates a circuit over any value [`Domain`].
//! The formal and simulation crates are both built on top of this one.

pub mod cancel;
pub mod circuit;
pub mod clock;
pub mod contract;
pub mod domain;
pub mod error;
pub mod eval;
pub mod fold;
pub mod property;
pub mod task;
pub mod validate;
pub mod value;

pub use cancel::CancelToken;
pub use circuit::{Circuit, CircuitOp, Contract, Node, Register, RegisterPorts, Signal, SignalId};
pub use clock::{edge_fires, ResetLatch};
pub use contract::{apply_contracts, check_contracts};
pub use domain::{BoolDomain, Domain, ReplayOracle, SymbolicOracle, ZeroOracle};
pub use error::{IrResult, StructuralError};
pub use eval::{
    eval_expr, evaluate_concrete, sample_predicate, Evaluator, Obligation, StepOutput, StepState,
};
pub use fold::fold_dead_properties;
pub use property::{ClockEdge, ClockTrigger, Property, PropertyKind, TemporalExpr};
pub use task::{FormalTask, RelationKind, RelationTask, SimulationTask};
pub use validate::validate;
pub use value::{BitValue, ParseValueError};
