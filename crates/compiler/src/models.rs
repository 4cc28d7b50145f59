//! Workflow graph model.
//!
//! These types are the source of truth for what a ticket-lifecycle workflow
//! looks like in memory. They serialize to the camelCase JSON produced by the
//! authoring UI.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rules::{Condition, RuleAction};

use crate::CompilerError;

// ---------------------------------------------------------------------------
// Node payloads
// ---------------------------------------------------------------------------

/// Entry point of a workflow: fires on a ticket event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerData {
    /// Ticket event name, e.g. `create` or `reply`.
    pub event: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// A lifecycle state a ticket can sit in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateData {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_enter_actions: Option<Vec<RuleAction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl StateData {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            sla_minutes: None,
            on_enter_actions: None,
            color: None,
        }
    }

    pub fn with_sla(mut self, minutes: u32) -> Self {
        self.sla_minutes = Some(minutes);
        self
    }

    pub fn with_on_enter(mut self, actions: Vec<RuleAction>) -> Self {
        self.on_enter_actions = Some(actions);
        self
    }
}

/// How the conditions of a condition node combine.
///
/// Only `all` has compiled semantics; `any` is accepted on the wire and
/// compiled as a conjunction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionLogic {
    #[default]
    All,
    Any,
}

/// A yes/no branch point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionData {
    #[serde(default)]
    pub logic: ConditionLogic,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// A node that only performs side effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionData {
    #[serde(default)]
    pub actions: Vec<RuleAction>,
}

/// Wait before moving on, either for a duration or for an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DelayData {
    Time { minutes: u32 },
    Event { event: String },
}

/// Terminal node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndData {
    pub label: String,
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Type-specific payload of a [`Node`], tagged by `type` with the payload
/// under `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NodeKind {
    Trigger(TriggerData),
    State(StateData),
    Condition(ConditionData),
    Action(ActionData),
    Delay(DelayData),
    End(EndData),
}

/// Canvas coordinates. Only used when placing synthesized nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A single node in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within this workflow (referenced by transitions).
    pub id: String,
    #[serde(default)]
    pub position: Position,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            position: Position::default(),
            kind,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position { x, y };
        self
    }

    pub fn trigger(id: impl Into<String>, event: impl Into<String>) -> Self {
        Self::new(
            id,
            NodeKind::Trigger(TriggerData {
                event: event.into(),
                conditions: Vec::new(),
            }),
        )
    }

    pub fn state(id: impl Into<String>, data: StateData) -> Self {
        Self::new(id, NodeKind::State(data))
    }

    pub fn condition(id: impl Into<String>, conditions: Vec<Condition>) -> Self {
        Self::new(
            id,
            NodeKind::Condition(ConditionData {
                logic: ConditionLogic::All,
                conditions,
            }),
        )
    }

    pub fn action(id: impl Into<String>, actions: Vec<RuleAction>) -> Self {
        Self::new(id, NodeKind::Action(ActionData { actions }))
    }

    pub fn delay_minutes(id: impl Into<String>, minutes: u32) -> Self {
        Self::new(id, NodeKind::Delay(DelayData::Time { minutes }))
    }

    pub fn delay_event(id: impl Into<String>, event: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Delay(DelayData::Event { event: event.into() }))
    }

    pub fn end(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(id, NodeKind::End(EndData { label: label.into() }))
    }

    /// Human-readable label used in rule names and optimizer heuristics.
    pub fn label(&self) -> String {
        match &self.kind {
            NodeKind::Trigger(t) => format!("Trigger: {}", t.event),
            NodeKind::State(s) => s.label.clone(),
            NodeKind::Condition(_) => "Condition".to_string(),
            NodeKind::Action(_) => "Action".to_string(),
            NodeKind::Delay(DelayData::Time { minutes }) => format!("Wait {minutes} min"),
            NodeKind::Delay(DelayData::Event { event }) => format!("Wait for {event}"),
            NodeKind::End(e) => e.label.clone(),
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self.kind, NodeKind::End(_))
    }
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// Which side of a condition node a transition leaves from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchKey {
    Yes,
    No,
    True,
    False,
}

impl BranchKey {
    /// `yes` and `true` both select the branch taken when the conditions hold.
    pub fn is_affirmative(self) -> bool {
        matches!(self, Self::Yes | Self::True)
    }
}

/// Directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub id: String,
    pub from_node_id: String,
    pub to_node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_key: Option<BranchKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<RuleAction>,
}

impl Transition {
    pub fn new(id: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            from_node_id: from.into(),
            to_node_id: to.into(),
            label: None,
            branch_key: None,
            conditions: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_branch(mut self, key: BranchKey) -> Self {
        self.branch_key = Some(key);
        self
    }

    pub fn with_conditions(mut self, conditions: Vec<Condition>) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_actions(mut self, actions: Vec<RuleAction>) -> Self {
        self.actions = actions;
        self
    }
}

// ---------------------------------------------------------------------------
// WorkflowGraph
// ---------------------------------------------------------------------------

fn enabled_by_default() -> bool {
    true
}

/// A complete workflow definition: the unit of compilation.
///
/// `nodes` is keyed by node ID and iterates in ID order, which keeps every
/// derived output deterministic. `transitions` keeps authoring order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowGraph {
    pub id: Uuid,
    pub name: String,
    pub entry_node_id: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub version: u32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub nodes: BTreeMap<String, Node>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

impl WorkflowGraph {
    /// Convenience constructor for testing.
    pub fn new(name: impl Into<String>, entry_node_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            entry_node_id: entry_node_id.into(),
            enabled: true,
            version: 1,
            created_at: now,
            updated_at: now,
            nodes: BTreeMap::new(),
            transitions: Vec::new(),
        }
    }

    /// Parse a workflow definition from its JSON form.
    ///
    /// Every key of `nodes` must equal the `id` of the node stored under it.
    pub fn from_json(json: &str) -> Result<Self, CompilerError> {
        let workflow: Self = serde_json::from_str(json)?;
        if let Some((key, node)) = workflow.nodes.iter().find(|(key, node)| **key != node.id) {
            return Err(CompilerError::NodeIdMismatch {
                key: key.clone(),
                id: node.id.clone(),
            });
        }
        Ok(workflow)
    }

    /// Insert (or replace) a node under its own ID.
    pub fn add_node(&mut self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn add_transition(&mut self, transition: Transition) {
        self.transitions.push(transition);
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Transition> + 'a {
        self.transitions.iter().filter(move |t| t.from_node_id == node_id)
    }

    pub fn incoming<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Transition> + 'a {
        self.transitions.iter().filter(move |t| t.to_node_id == node_id)
    }

    /// The first `end` node in ID order.
    pub fn end_node(&self) -> Option<&Node> {
        self.nodes.values().find(|n| n.is_end())
    }
}
