//! Value domains for circuit evaluation
//!
//! The evaluator is written once against [`Domain`]. Simulation plugs in
//! [`BoolDomain`] and gets concrete values; the formal crate plugs in an
//! and-inverter graph and gets formulas.

use crate::value::BitValue;
use std::fmt::Debug;

/// Single-bit algebra the evaluator is generic over
pub trait Domain {
    type Bit: Clone + Debug;

    fn constant(&mut self, value: bool) -> Self::Bit;
    fn not(&mut self, a: &Self::Bit) -> Self::Bit;
    fn and(&mut self, a: &Self::Bit, b: &Self::Bit) -> Self::Bit;

    fn or(&mut self, a: &Self::Bit, b: &Self::Bit) -> Self::Bit {
        let na = self.not(a);
        let nb = self.not(b);
        let both = self.and(&na, &nb);
        self.not(&both)
    }

    fn xor(&mut self, a: &Self::Bit, b: &Self::Bit) -> Self::Bit {
        let either = self.or(a, b);
        let both = self.and(a, b);
        let not_both = self.not(&both);
        self.and(&either, &not_both)
    }

    /// `sel ? when_true : when_false`
    fn mux(&mut self, sel: &Self::Bit, when_true: &Self::Bit, when_false: &Self::Bit) -> Self::Bit {
        let t = self.and(sel, when_true);
        let not_sel = self.not(sel);
        let f = self.and(&not_sel, when_false);
        self.or(&t, &f)
    }

    /// Fresh unconstrained value, LSB first
    fn symbolic(&mut self, name: &str, width: u32) -> Vec<Self::Bit>;

    /// Bits of a concrete value, LSB first
    fn constant_word(&mut self, value: &BitValue) -> Vec<Self::Bit> {
        value
            .to_bits()
            .into_iter()
            .map(|b| self.constant(b))
            .collect()
    }
}

/// Source of concrete values for symbolic nodes during simulation
pub trait SymbolicOracle {
    fn choose(&mut self, name: &str, width: u32) -> BitValue;
}

impl<O: SymbolicOracle + ?Sized> SymbolicOracle for Box<O> {
    fn choose(&mut self, name: &str, width: u32) -> BitValue {
        (**self).choose(name, width)
    }
}

/// Every symbolic value is zero
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroOracle;

impl SymbolicOracle for ZeroOracle {
    fn choose(&mut self, _name: &str, width: u32) -> BitValue {
        BitValue::zero(width)
    }
}

/// Replays recorded choices in order, then falls back to zero
#[derive(Debug, Clone, Default)]
pub struct ReplayOracle {
    values: std::collections::VecDeque<BitValue>,
}

impl ReplayOracle {
    pub fn new(values: impl IntoIterator<Item = BitValue>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }
}

impl SymbolicOracle for ReplayOracle {
    fn choose(&mut self, _name: &str, width: u32) -> BitValue {
        match self.values.pop_front() {
            Some(value) if value.width() == width => value,
            _ => BitValue::zero(width),
        }
    }
}

/// Concrete two-valued domain
#[derive(Debug, Clone, Default)]
pub struct BoolDomain<O> {
    oracle: O,
}

impl<O: SymbolicOracle> BoolDomain<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }
}

impl<O: SymbolicOracle> Domain for BoolDomain<O> {
    type Bit = bool;

    fn constant(&mut self, value: bool) -> bool {
        value
    }

    fn not(&mut self, a: &bool) -> bool {
        !a
    }

    fn and(&mut self, a: &bool, b: &bool) -> bool {
        *a && *b
    }

    fn or(&mut self, a: &bool, b: &bool) -> bool {
        *a || *b
    }

    fn xor(&mut self, a: &bool, b: &bool) -> bool {
        a ^ b
    }

    fn mux(&mut self, sel: &bool, when_true: &bool, when_false: &bool) -> bool {
        if *sel {
            *when_true
        } else {
            *when_false
        }
    }

    fn symbolic(&mut self, name: &str, width: u32) -> Vec<bool> {
        self.oracle.choose(name, width).to_bits()
    }
}
