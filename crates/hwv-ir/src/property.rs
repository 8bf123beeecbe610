//! Temporal properties attached to circuits
//!
//! All property flavours (assert/assume/cover at circuit level, require/ensure
//! inside contracts) share one type; the kind is a tag.

use crate::circuit::SignalId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Property flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    /// Must hold at every sampling instant
    Assert,
    /// Constrains the environment at every sampling instant
    Assume,
    /// Reachability target
    Cover,
    /// Contract precondition
    Require,
    /// Contract postcondition
    Ensure,
}

impl PropertyKind {
    /// Kinds that may only appear inside a contract body
    pub fn is_contract_clause(&self) -> bool {
        matches!(self, PropertyKind::Require | PropertyKind::Ensure)
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyKind::Assert => "assert",
            PropertyKind::Assume => "assume",
            PropertyKind::Cover => "cover",
            PropertyKind::Require => "require",
            PropertyKind::Ensure => "ensure",
        };
        f.write_str(name)
    }
}

/// Which clock transitions count as a sampling instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClockEdge {
    /// 0/X -> 1
    Pos,
    /// 1/X -> 0
    Neg,
    /// Either transition
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClockTrigger {
    pub edge: ClockEdge,
    pub clock: SignalId,
}

/// Boolean expression over 1-bit signals, evaluated at a sampling instant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemporalExpr {
    Signal(SignalId),
    Const(bool),
    Not(Box<TemporalExpr>),
    And(Vec<TemporalExpr>),
    Or(Vec<TemporalExpr>),
    Implies(Box<TemporalExpr>, Box<TemporalExpr>),
}

impl TemporalExpr {
    pub fn signal(id: SignalId) -> Self {
        TemporalExpr::Signal(id)
    }

    pub fn not(expr: TemporalExpr) -> Self {
        TemporalExpr::Not(Box::new(expr))
    }

    pub fn implies(antecedent: TemporalExpr, consequent: TemporalExpr) -> Self {
        TemporalExpr::Implies(Box::new(antecedent), Box::new(consequent))
    }

    /// Every signal referenced by the expression
    pub fn signals(&self) -> Vec<SignalId> {
        let mut out = Vec::new();
        self.collect_signals(&mut out);
        out
    }

    fn collect_signals(&self, out: &mut Vec<SignalId>) {
        match self {
            TemporalExpr::Signal(id) => out.push(*id),
            TemporalExpr::Const(_) => {}
            TemporalExpr::Not(inner) => inner.collect_signals(out),
            TemporalExpr::And(terms) | TemporalExpr::Or(terms) => {
                for term in terms {
                    term.collect_signals(out);
                }
            }
            TemporalExpr::Implies(a, b) => {
                a.collect_signals(out);
                b.collect_signals(out);
            }
        }
    }
}

impl From<SignalId> for TemporalExpr {
    fn from(id: SignalId) -> Self {
        TemporalExpr::Signal(id)
    }
}

/// A property node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Property {
    pub kind: PropertyKind,
    pub expr: TemporalExpr,
    /// Gating condition; when low the property is ignored at that instant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable: Option<SignalId>,
    /// Sampling clock; untriggered properties are sampled at every evaluation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<ClockTrigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Property {
    pub fn new(kind: PropertyKind, expr: impl Into<TemporalExpr>) -> Self {
        Self {
            kind,
            expr: expr.into(),
            enable: None,
            trigger: None,
            label: None,
        }
    }

    pub fn assert(expr: impl Into<TemporalExpr>) -> Self {
        Self::new(PropertyKind::Assert, expr)
    }

    pub fn assume(expr: impl Into<TemporalExpr>) -> Self {
        Self::new(PropertyKind::Assume, expr)
    }

    pub fn cover(expr: impl Into<TemporalExpr>) -> Self {
        Self::new(PropertyKind::Cover, expr)
    }

    pub fn require(expr: impl Into<TemporalExpr>) -> Self {
        Self::new(PropertyKind::Require, expr)
    }

    pub fn ensure(expr: impl Into<TemporalExpr>) -> Self {
        Self::new(PropertyKind::Ensure, expr)
    }

    pub fn with_enable(mut self, enable: SignalId) -> Self {
        self.enable = Some(enable);
        self
    }

    pub fn on_edge(mut self, edge: ClockEdge, clock: SignalId) -> Self {
        self.trigger = Some(ClockTrigger { edge, clock });
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Same property with a different kind tag
    pub fn retagged(&self, kind: PropertyKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }

    /// Label if present, otherwise `<kind>#<index>`
    pub fn display_name(&self, index: usize) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("{}#{}", self.kind, index),
        }
    }

    /// Signals the sampling of this property depends on
    pub fn referenced_signals(&self) -> Vec<SignalId> {
        let mut out = self.expr.signals();
        out.extend(self.enable);
        out.extend(self.trigger.map(|t| t.clock));
        out
    }
}
