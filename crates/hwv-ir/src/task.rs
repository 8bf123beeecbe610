//! Verification task definitions
//!
//! A [`FormalTask`] is evaluated step by step. The `init` circuit produces
//! the first "yields", `loop_body` maps the yields of one step to the next,
//! and the yields are fed to the leading inputs of `circuit`. That is how a
//! clock (or any other deterministic stimulus) is generated; every other
//! input of `circuit` is fresh at every step.

use crate::circuit::{Circuit, CircuitOp};
use crate::error::{IrResult, StructuralError};
use crate::validate::validate;
use crate::value::BitValue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormalTask {
    pub name: String,
    /// Number of steps to check
    pub bound: u32,
    pub num_regs: usize,
    /// One entry per register; `None` leaves the register unconstrained
    pub initial_values: Vec<Option<BitValue>>,
    pub init: Circuit,
    pub loop_body: Circuit,
    pub circuit: Circuit,
}

impl FormalTask {
    /// Task with no generated stimulus: every circuit input is free at
    /// every step. Registers start at their declared initial values.
    pub fn new(name: impl Into<String>, circuit: Circuit, bound: u32) -> Self {
        let name = name.into();
        let initial_values = circuit.registers.iter().map(|r| r.init.clone()).collect();
        Self {
            init: Circuit::new(format!("{}.init", name)),
            loop_body: Circuit::new(format!("{}.loop", name)),
            num_regs: circuit.registers.len(),
            initial_values,
            circuit,
            name,
            bound,
        }
    }

    /// Task whose first circuit input is a clock starting low and toggling
    /// at every step
    pub fn clocked(name: impl Into<String>, circuit: Circuit, bound: u32) -> Self {
        let mut task = Self::new(name, circuit, bound);

        let mut init = Circuit::new(format!("{}.init", task.name));
        let low = init.add_constant("clk", BitValue::zero(1));
        init.add_output(low);

        let mut body = Circuit::new(format!("{}.loop", task.name));
        let clk = body.add_input("clk", 1);
        let toggled = body.add_op(CircuitOp::Not, vec![clk], "clk.next", 1);
        body.add_output(toggled);

        task.init = init;
        task.loop_body = body;
        task
    }

    /// Width of each yield
    pub fn yield_widths(&self) -> Vec<u32> {
        self.init.output_widths()
    }

    /// Structural checks across the three circuits
    pub fn validate(&self) -> IrResult<()> {
        validate(&self.init)?;
        validate(&self.loop_body)?;
        validate(&self.circuit)?;

        let fail = |detail: String| StructuralError::MalformedTask {
            task: self.name.clone(),
            detail,
        };

        if self.bound == 0 {
            return Err(fail("bound must be at least one step".to_string()));
        }
        if self.num_regs != self.circuit.registers.len()
            || self.num_regs != self.initial_values.len()
        {
            return Err(fail(format!(
                "num_regs is {} but the circuit has {} registers and {} initial values",
                self.num_regs,
                self.circuit.registers.len(),
                self.initial_values.len()
            )));
        }
        for (reg, init) in self.circuit.registers.iter().zip(&self.initial_values) {
            if let Some(value) = init {
                if value.width() != reg.width {
                    return Err(StructuralError::WidthMismatch {
                        context: format!("initial value of register '{}'", reg.name),
                        expected: reg.width,
                        found: value.width(),
                    });
                }
            }
        }

        if !self.init.inputs.is_empty() {
            return Err(fail("init circuit must not have inputs".to_string()));
        }
        if self.init.is_sequential() || self.loop_body.is_sequential() {
            return Err(fail("init and loop circuits must be combinational".to_string()));
        }

        let yields = self.yield_widths();
        if self.loop_body.input_widths() != yields || self.loop_body.output_widths() != yields {
            return Err(fail(format!(
                "loop circuit does not map yields {:?} to themselves",
                yields
            )));
        }
        let leading: Vec<u32> = self
            .circuit
            .input_widths()
            .into_iter()
            .take(yields.len())
            .collect();
        if leading != yields {
            return Err(fail(format!(
                "circuit inputs {:?} do not start with yields {:?}",
                leading, yields
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Equivalence,
    /// `rhs` refines `lhs`
    Refinement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationTask {
    pub name: String,
    pub kind: RelationKind,
    pub lhs: Circuit,
    pub rhs: Circuit,
}

impl RelationTask {
    pub fn equivalence(name: impl Into<String>, lhs: Circuit, rhs: Circuit) -> Self {
        Self {
            name: name.into(),
            kind: RelationKind::Equivalence,
            lhs,
            rhs,
        }
    }

    /// `rhs` refines `lhs`
    pub fn refinement(name: impl Into<String>, lhs: Circuit, rhs: Circuit) -> Self {
        Self {
            name: name.into(),
            kind: RelationKind::Refinement,
            lhs,
            rhs,
        }
    }
}

/// Testbench driven by the fixed clock/init schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationTask {
    pub name: String,
    /// Inputs `[clock, init]`, outputs starting with `[done, success]`
    pub circuit: Circuit,
}

impl SimulationTask {
    pub fn new(name: impl Into<String>, circuit: Circuit) -> Self {
        Self {
            name: name.into(),
            circuit,
        }
    }

    pub fn validate(&self) -> IrResult<()> {
        validate(&self.circuit)?;
        let fail = |detail: &str| StructuralError::MalformedTask {
            task: self.name.clone(),
            detail: detail.to_string(),
        };
        if self.circuit.input_widths() != [1u32, 1] {
            return Err(fail("inputs must be exactly [clock: 1, init: 1]"));
        }
        let outputs = self.circuit.output_widths();
        if outputs.len() < 2 || outputs[0] != 1 || outputs[1] != 1 {
            return Err(fail("outputs must start with [done: 1, success: 1]"));
        }
        Ok(())
    }
}
