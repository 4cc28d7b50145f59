//! Rule records as consumed by the rule-evaluation engine.
//!
//! A [`Rule`] is a flat, independently evaluable unit: every condition in
//! `conditions.all` must hold, then `actions` run in order. The same
//! [`Condition`] and [`RuleAction`] types appear inside workflow graphs, so
//! the compiler can move them into rules without conversion.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Operator
// ---------------------------------------------------------------------------

/// Comparison operator of a [`Condition`].
///
/// Unknown operators deserialize into [`Operator::Custom`] and serialize back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Is,
    IsNot,
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    IsEmpty,
    IsNotEmpty,
    In,
    NotIn,
    #[serde(untagged)]
    Custom(String),
}

impl Operator {
    /// The operator used on the false branch of a condition node.
    ///
    /// Operators outside the fixed table (including every `Custom` one) are
    /// returned as-is.
    pub fn negate(&self) -> Operator {
        match self {
            Self::Is => Self::IsNot,
            Self::IsNot => Self::Is,
            Self::Equals => Self::NotEquals,
            Self::NotEquals => Self::Equals,
            Self::Contains => Self::NotContains,
            Self::NotContains => Self::Contains,
            Self::GreaterThan => Self::LessThan,
            Self::LessThan => Self::GreaterThan,
            Self::IsEmpty => Self::IsNotEmpty,
            Self::IsNotEmpty => Self::IsEmpty,
            Self::In => Self::NotIn,
            Self::NotIn => Self::In,
            Self::Custom(op) => Self::Custom(op.clone()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Is => "is",
            Self::IsNot => "is_not",
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::IsEmpty => "is_empty",
            Self::IsNotEmpty => "is_not_empty",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Custom(op) => op.as_str(),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

/// A single `field operator value` test against a ticket event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Same field and value with the operator negated.
    pub fn negated(&self) -> Self {
        Self {
            field: self.field.clone(),
            operator: self.operator.negate(),
            value: self.value.clone(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.value)
    }
}

// ---------------------------------------------------------------------------
// RuleAction
// ---------------------------------------------------------------------------

/// The side effect a [`RuleAction`] performs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    AddTag,
    RemoveTag,
    Escalate,
    #[serde(untagged)]
    Custom(String),
}

/// One ordered side effect of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl RuleAction {
    pub fn new(kind: ActionKind, value: Option<Value>) -> Self {
        Self { kind, value }
    }

    pub fn add_tag(tag: impl Into<String>) -> Self {
        Self::new(ActionKind::AddTag, Some(Value::String(tag.into())))
    }

    pub fn remove_tag(tag: impl Into<String>) -> Self {
        Self::new(ActionKind::RemoveTag, Some(Value::String(tag.into())))
    }

    pub fn escalate() -> Self {
        Self::new(ActionKind::Escalate, None)
    }
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// How the engine schedules a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    /// Evaluated when a ticket event arrives.
    Trigger,
    /// Evaluated periodically against idle tickets.
    Automation,
    /// Evaluated periodically for SLA breaches.
    Sla,
}

/// Conjunction of conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConditions {
    pub all: Vec<Condition>,
}

/// A compiled (or hand-authored) automation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    pub name: String,
    pub enabled: bool,
    pub conditions: RuleConditions,
    pub actions: Vec<RuleAction>,
}

impl Rule {
    /// `true` if any condition matches `field operator value` exactly.
    pub fn has_condition(&self, field: &str, operator: &Operator, value: &Value) -> bool {
        self.conditions
            .all
            .iter()
            .any(|c| c.field == field && &c.operator == operator && &c.value == value)
    }

    /// `true` if any action is of the given kind.
    pub fn has_action(&self, kind: &ActionKind) -> bool {
        self.actions.iter().any(|a| &a.kind == kind)
    }
}
