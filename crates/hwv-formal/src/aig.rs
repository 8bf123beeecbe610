//! And-Inverter Graph
//!
//! Bit-blasted form of everything handed to the solver. Nodes are only ever
//! appended, so node order is a topological order and literals stay valid as
//! the graph grows across BMC steps.

use hwv_ir::{BitValue, Domain};
use std::collections::HashMap;

/// A node in an And-Inverter Graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AigNodeId(pub u32);

/// An AIG literal (node reference with optional inversion)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AigLit {
    pub node: AigNodeId,
    pub inverted: bool,
}

impl AigLit {
    pub fn positive(node: AigNodeId) -> Self {
        Self {
            node,
            inverted: false,
        }
    }

    pub fn invert(self) -> Self {
        Self {
            node: self.node,
            inverted: !self.inverted,
        }
    }

    pub fn is_const(self) -> bool {
        self.node.0 == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AigNode {
    /// Constant false (node 0)
    False,
    Input { name: String },
    And { left: AigLit, right: AigLit },
}

#[derive(Debug, Clone)]
pub struct Aig {
    /// All nodes; node 0 is constant false
    pub nodes: Vec<AigNode>,
    pub inputs: Vec<AigNodeId>,
    strash: HashMap<(AigLit, AigLit), AigNodeId>,
}

impl Aig {
    pub fn new() -> Self {
        Self {
            nodes: vec![AigNode::False],
            inputs: Vec::new(),
            strash: HashMap::new(),
        }
    }

    pub fn false_lit(&self) -> AigLit {
        AigLit::positive(AigNodeId(0))
    }

    pub fn true_lit(&self) -> AigLit {
        self.false_lit().invert()
    }

    pub fn add_input(&mut self, name: impl Into<String>) -> AigLit {
        let id = AigNodeId(self.nodes.len() as u32);
        self.nodes.push(AigNode::Input { name: name.into() });
        self.inputs.push(id);
        AigLit::positive(id)
    }

    pub fn input_name(&self, id: AigNodeId) -> Option<&str> {
        match self.nodes.get(id.0 as usize) {
            Some(AigNode::Input { name }) => Some(name),
            _ => None,
        }
    }

    /// AND gate with constant folding and structural hashing
    pub fn add_and(&mut self, left: AigLit, right: AigLit) -> AigLit {
        let f = self.false_lit();
        let t = self.true_lit();
        if left == f || right == f {
            return f;
        }
        if left == t {
            return right;
        }
        if right == t {
            return left;
        }
        if left == right {
            return left;
        }
        if left == right.invert() {
            return f;
        }

        let key = if left < right { (left, right) } else { (right, left) };
        if let Some(&id) = self.strash.get(&key) {
            return AigLit::positive(id);
        }
        let id = AigNodeId(self.nodes.len() as u32);
        self.nodes.push(AigNode::And {
            left: key.0,
            right: key.1,
        });
        self.strash.insert(key, id);
        AigLit::positive(id)
    }

    /// a OR b = NOT(NOT a AND NOT b)
    pub fn add_or(&mut self, left: AigLit, right: AigLit) -> AigLit {
        self.add_and(left.invert(), right.invert()).invert()
    }

    pub fn add_xor(&mut self, a: AigLit, b: AigLit) -> AigLit {
        // XOR(a,b) = (a AND !b) OR (!a AND b)
        let a_and_not_b = self.add_and(a, b.invert());
        let not_a_and_b = self.add_and(a.invert(), b);
        self.add_or(a_and_not_b, not_a_and_b)
    }

    /// 2:1 MUX: sel ? b : a
    pub fn add_mux(&mut self, sel: AigLit, a: AigLit, b: AigLit) -> AigLit {
        if a == b {
            return a;
        }
        let sel_and_b = self.add_and(sel, b);
        let not_sel_and_a = self.add_and(sel.invert(), a);
        self.add_or(sel_and_b, not_sel_and_a)
    }

    /// AND over any number of literals
    pub fn add_and_all(&mut self, lits: impl IntoIterator<Item = AigLit>) -> AigLit {
        let mut acc = self.true_lit();
        for lit in lits {
            acc = self.add_and(acc, lit);
        }
        acc
    }

    /// OR over any number of literals
    pub fn add_or_all(&mut self, lits: impl IntoIterator<Item = AigLit>) -> AigLit {
        let mut acc = self.false_lit();
        for lit in lits {
            acc = self.add_or(acc, lit);
        }
        acc
    }

    /// Literal that is true iff two words are equal
    pub fn add_word_eq(&mut self, a: &[AigLit], b: &[AigLit]) -> AigLit {
        let mut result = self.true_lit();
        for (&x, &y) in a.iter().zip(b) {
            let bit_eq = self.add_xor(x, y).invert();
            result = self.add_and(result, bit_eq);
        }
        result
    }

    pub fn and_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, AigNode::And { .. }))
            .count()
    }

    /// Value of every node under an input assignment
    pub fn simulate(&self, input_value: impl Fn(AigNodeId) -> bool) -> Valuation {
        let mut values = Vec::with_capacity(self.nodes.len());
        for (idx, node) in self.nodes.iter().enumerate() {
            let v = match node {
                AigNode::False => false,
                AigNode::Input { .. } => input_value(AigNodeId(idx as u32)),
                AigNode::And { left, right } => {
                    lit_in(&values, *left) && lit_in(&values, *right)
                }
            };
            values.push(v);
        }
        Valuation { values }
    }
}

impl Default for Aig {
    fn default() -> Self {
        Self::new()
    }
}

fn lit_in(values: &[bool], lit: AigLit) -> bool {
    values.get(lit.node.0 as usize).copied().unwrap_or(false) ^ lit.inverted
}

/// Concrete value of every AIG node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Valuation {
    values: Vec<bool>,
}

impl Valuation {
    /// Nodes added after the valuation was taken read as false
    pub fn lit(&self, lit: AigLit) -> bool {
        lit_in(&self.values, lit)
    }

    pub fn word(&self, lits: &[AigLit]) -> BitValue {
        let bits: Vec<bool> = lits.iter().map(|&l| self.lit(l)).collect();
        BitValue::from_bits(&bits)
    }
}

impl Domain for Aig {
    type Bit = AigLit;

    fn constant(&mut self, value: bool) -> AigLit {
        if value {
            self.true_lit()
        } else {
            self.false_lit()
        }
    }

    fn not(&mut self, a: &AigLit) -> AigLit {
        a.invert()
    }

    fn and(&mut self, a: &AigLit, b: &AigLit) -> AigLit {
        self.add_and(*a, *b)
    }

    fn or(&mut self, a: &AigLit, b: &AigLit) -> AigLit {
        self.add_or(*a, *b)
    }

    fn xor(&mut self, a: &AigLit, b: &AigLit) -> AigLit {
        self.add_xor(*a, *b)
    }

    fn mux(&mut self, sel: &AigLit, when_true: &AigLit, when_false: &AigLit) -> AigLit {
        self.add_mux(*sel, *when_false, *when_true)
    }

    fn symbolic(&mut self, name: &str, width: u32) -> Vec<AigLit> {
        (0..width)
            .map(|i| self.add_input(format!("{}[{}]", name, i)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aig_basic() {
        let mut aig = Aig::new();
        let a = aig.add_input("a");
        let b = aig.add_input("b");
        let and = aig.add_and(a, b);
        assert_eq!(aig.and_count(), 1);

        let val = aig.simulate(|id| id == a.node);
        assert!(val.lit(a));
        assert!(!val.lit(and));
        assert!(val.lit(and.invert()));
    }

    #[test]
    fn test_aig_simplification() {
        let mut aig = Aig::new();
        let a = aig.add_input("a");
        let f = aig.false_lit();
        let t = aig.true_lit();

        assert_eq!(aig.add_and(a, f), f);
        assert_eq!(aig.add_and(a, t), a);
        assert_eq!(aig.add_and(a, a), a);
        assert_eq!(aig.add_and(a, a.invert()), f);
        assert_eq!(aig.and_count(), 0);
    }

    #[test]
    fn test_structural_hashing() {
        let mut aig = Aig::new();
        let a = aig.add_input("a");
        let b = aig.add_input("b");
        let x = aig.add_and(a, b);
        let y = aig.add_and(b, a);
        assert_eq!(x, y);
        assert_eq!(aig.and_count(), 1);
    }

    #[test]
    fn test_mux_and_xor() {
        let mut aig = Aig::new();
        let s = aig.add_input("s");
        let a = aig.add_input("a");
        let b = aig.add_input("b");
        let m = aig.add_mux(s, a, b);
        let x = aig.add_xor(a, b);
        for bits in 0..8u32 {
            let val = aig.simulate(|id| (bits >> (id.0 - 1)) & 1 == 1);
            let (sv, av, bv) = (val.lit(s), val.lit(a), val.lit(b));
            assert_eq!(val.lit(m), if sv { bv } else { av });
            assert_eq!(val.lit(x), av ^ bv);
        }
    }

    #[test]
    fn test_word_eq_of_constants_folds() {
        let mut aig = Aig::new();
        let three = aig.constant_word(&BitValue::from_u64(4, 3));
        let also = aig.constant_word(&BitValue::from_u64(4, 3));
        let five = aig.constant_word(&BitValue::from_u64(4, 5));
        assert_eq!(aig.add_word_eq(&three, &also), aig.true_lit());
        assert_eq!(aig.add_word_eq(&three, &five), aig.false_lit());
    }
}
