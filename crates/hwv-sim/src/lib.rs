//! Concrete simulation of hwv circuits
//!
//! The circuit is evaluated in the two-valued domain under a fixed clock/init
//! schedule. Symbolic values are drawn from an oracle (zero, seeded random or
//! replayed).

pub mod oracle;
pub mod schedule;
pub mod simulator;
pub mod trace;

pub use oracle::{build_oracle, OracleKind, RandomOracle};
pub use schedule::{ClockTracker, Drive, Edge, ScheduleState, SimSchedule, Tick};
pub use simulator::{
    PropertyEvent, SimulationConfig, SimulationError, SimulationOutcome, SimulationReport,
    SimulationResult, Simulator,
};
pub use trace::{SimTrace, Snapshot};
