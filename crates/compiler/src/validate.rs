//! Workflow validation: run this before activating or compiling a workflow.
//!
//! Checks, in reporting order:
//! 1. The entry node is set and exists.
//! 2. Every transition endpoint exists.
//! 3. Every node other than the entry is referenced by some transition.
//! 4. An entry trigger has at least one outgoing transition.
//! 5. (warning) The graph contains an `end` node.
//! 6. (warning) Per-node dead ends, unreachable nodes, half-wired condition
//!    nodes and empty action nodes.
//!
//! Findings are returned as data. The graph is valid iff no finding has
//! [`Severity::Error`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::models::{NodeKind, WorkflowGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks activation.
    Error,
    /// Advisory only.
    Warning,
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub severity: Severity,
}

impl ValidationError {
    fn error(message: String, node_id: Option<&str>) -> Self {
        Self {
            message,
            node_id: node_id.map(str::to_owned),
            severity: Severity::Error,
        }
    }

    fn warning(message: String, node_id: Option<&str>) -> Self {
        Self {
            message,
            node_id: node_id.map(str::to_owned),
            severity: Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    fn from_findings(errors: Vec<ValidationError>) -> Self {
        let valid = !errors.iter().any(|e| e.severity == Severity::Error);
        Self { valid, errors }
    }

    /// Findings with [`Severity::Error`].
    pub fn errors_only(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter(|e| e.severity == Severity::Error)
    }

    /// Findings with [`Severity::Warning`].
    pub fn warnings(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter(|e| e.severity == Severity::Warning)
    }
}

/// Validate the structure of a workflow graph.
#[instrument(skip(workflow), fields(workflow_id = %workflow.id))]
pub fn validate(workflow: &WorkflowGraph) -> ValidationResult {
    let mut findings = Vec::new();
    let entry_id = workflow.entry_node_id.as_str();

    // -----------------------------------------------------------------------
    // 1. Entry node
    // -----------------------------------------------------------------------
    let entry = if entry_id.is_empty() {
        findings.push(ValidationError::error("Workflow has no entry node".to_string(), None));
        None
    } else {
        let entry = workflow.node(entry_id);
        if entry.is_none() {
            findings.push(ValidationError::error(
                format!("Entry node '{entry_id}' does not exist"),
                Some(entry_id),
            ));
        }
        entry
    };

    // -----------------------------------------------------------------------
    // 2. Transition endpoints
    // -----------------------------------------------------------------------
    for t in &workflow.transitions {
        if workflow.node(&t.from_node_id).is_none() {
            findings.push(ValidationError::error(
                format!(
                    "Transition '{}' references unknown source node '{}'",
                    t.id, t.from_node_id
                ),
                Some(t.from_node_id.as_str()),
            ));
        }
        if workflow.node(&t.to_node_id).is_none() {
            findings.push(ValidationError::error(
                format!(
                    "Transition '{}' references unknown target node '{}'",
                    t.id, t.to_node_id
                ),
                Some(t.to_node_id.as_str()),
            ));
        }
    }

    // -----------------------------------------------------------------------
    // 3. Orphans
    // -----------------------------------------------------------------------
    let mut referenced: HashSet<&str> = HashSet::new();
    referenced.insert(entry_id);
    for t in &workflow.transitions {
        referenced.insert(t.from_node_id.as_str());
        referenced.insert(t.to_node_id.as_str());
    }
    for id in workflow.nodes.keys() {
        if !referenced.contains(id.as_str()) {
            findings.push(ValidationError::error(
                format!("Node '{id}' is orphaned: no transition references it"),
                Some(id.as_str()),
            ));
        }
    }

    // -----------------------------------------------------------------------
    // 4. Entry trigger must lead somewhere
    // -----------------------------------------------------------------------
    if let Some(node) = entry {
        if matches!(node.kind, NodeKind::Trigger(_)) && workflow.outgoing(entry_id).next().is_none() {
            findings.push(ValidationError::error(
                format!("Entry trigger '{entry_id}' has no outgoing transitions"),
                Some(entry_id),
            ));
        }
    }

    // -----------------------------------------------------------------------
    // 5. End node
    // -----------------------------------------------------------------------
    if workflow.end_node().is_none() {
        findings.push(ValidationError::warning("Workflow has no end node".to_string(), None));
    }

    // -----------------------------------------------------------------------
    // 6. Per-node warnings
    // -----------------------------------------------------------------------
    for (id, node) in &workflow.nodes {
        let outgoing = workflow.outgoing(id).count();
        let incoming = workflow.incoming(id).count();

        if !node.is_end() && outgoing == 0 {
            findings.push(ValidationError::warning(
                format!("Node '{}' ({}) has no outgoing transitions", id, node.label()),
                Some(id.as_str()),
            ));
        }
        if id.as_str() != entry_id && incoming == 0 {
            findings.push(ValidationError::warning(
                format!("Node '{}' ({}) has no incoming transitions", id, node.label()),
                Some(id.as_str()),
            ));
        }
        match &node.kind {
            NodeKind::Condition(_) if outgoing < 2 => {
                findings.push(ValidationError::warning(
                    format!("Condition node '{id}' should have both a yes and a no branch"),
                    Some(id.as_str()),
                ));
            }
            NodeKind::Action(a) if a.actions.is_empty() => {
                findings.push(ValidationError::warning(
                    format!("Action node '{id}' has no actions"),
                    Some(id.as_str()),
                ));
            }
            _ => {}
        }
    }

    let result = ValidationResult::from_findings(findings);
    debug!(
        "validation finished: valid={}, {} finding(s)",
        result.valid,
        result.errors.len()
    );
    result
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Node, StateData, Transition};

    fn linear() -> WorkflowGraph {
        let mut wf = WorkflowGraph::new("Support", "start");
        wf.add_node(Node::trigger("start", "create"));
        wf.add_node(Node::state("open", StateData::new("Open")));
        wf.add_node(Node::end("done", "Closed"));
        wf.add_transition(Transition::new("t1", "start", "open"));
        wf.add_transition(Transition::new("t2", "open", "done"));
        wf
    }

    #[test]
    fn clean_graph_has_no_findings() {
        let result = validate(&linear());
        assert!(result.valid);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
    }

    #[test]
    fn empty_entry_is_an_error() {
        let mut wf = linear();
        wf.entry_node_id.clear();
        let result = validate(&wf);
        assert!(!result.valid);
        assert_eq!(result.errors[0].message, "Workflow has no entry node");
    }

    #[test]
    fn missing_entry_is_an_error() {
        let mut wf = linear();
        wf.entry_node_id = "ghost".into();
        let result = validate(&wf);
        assert!(!result.valid);
        assert_eq!(result.errors[0].node_id.as_deref(), Some("ghost"));
    }

    #[test]
    fn dangling_transition_reports_each_bad_endpoint() {
        let mut wf = linear();
        wf.add_transition(Transition::new("bad", "nowhere", "nothing"));
        let result = validate(&wf);
        assert!(!result.valid);
        let bad: Vec<_> = result
            .errors_only()
            .filter(|e| e.message.contains("'bad'"))
            .collect();
        assert_eq!(bad.len(), 2);
        assert!(bad[0].message.contains("source node 'nowhere'"));
        assert!(bad[1].message.contains("target node 'nothing'"));
    }

    #[test]
    fn trigger_without_outgoing_is_an_error() {
        let mut wf = WorkflowGraph::new("Lonely", "start");
        wf.add_node(Node::trigger("start", "create"));
        wf.add_node(Node::end("done", "Closed"));
        wf.add_transition(Transition::new("t1", "done", "done"));
        let result = validate(&wf);
        assert!(!result.valid);
        assert!(result
            .errors_only()
            .any(|e| e.message.contains("has no outgoing transitions")));
    }

    #[test]
    fn referenced_dead_end_is_a_warning() {
        let mut wf = linear();
        wf.add_node(Node::state("parked", StateData::new("Parked")));
        wf.add_transition(Transition::new("t3", "open", "parked"));

        let result = validate(&wf);
        assert!(result.valid, "{:?}", result.errors);
        let findings: Vec<&ValidationError> = result
            .errors
            .iter()
            .filter(|e| e.node_id.as_deref() == Some("parked"))
            .collect();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(
            findings[0].message,
            "Node 'parked' (Parked) has no outgoing transitions"
        );
    }

    #[test]
    fn second_trigger_without_incoming_is_a_warning() {
        let mut wf = linear();
        wf.add_node(Node::trigger("alt", "reply"));
        wf.add_transition(Transition::new("t3", "alt", "open"));

        let result = validate(&wf);
        assert!(result.valid, "{:?}", result.errors);
        let findings: Vec<&ValidationError> = result
            .errors
            .iter()
            .filter(|e| e.node_id.as_deref() == Some("alt"))
            .collect();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(
            findings[0].message,
            "Node 'alt' (Trigger: reply) has no incoming transitions"
        );
        // The entry trigger is exempt.
        assert!(!result.errors.iter().any(|e| e.node_id.as_deref() == Some("start")));
    }

    #[test]
    fn missing_end_is_only_a_warning() {
        let mut wf = WorkflowGraph::new("Loop", "start");
        wf.add_node(Node::trigger("start", "create"));
        wf.add_node(Node::state("a", StateData::new("A")));
        wf.add_transition(Transition::new("t1", "start", "a"));
        wf.add_transition(Transition::new("t2", "a", "a"));
        let result = validate(&wf);
        assert!(result.valid);
        assert!(result.warnings().any(|w| w.message == "Workflow has no end node"));
    }

    #[test]
    fn condition_and_action_warnings() {
        let mut wf = linear();
        wf.add_node(Node::condition("check", vec![]));
        wf.add_node(Node::action("noop", vec![]));
        wf.add_transition(Transition::new("t3", "open", "check"));
        wf.add_transition(Transition::new("t4", "check", "noop"));
        wf.add_transition(Transition::new("t5", "noop", "done"));

        let result = validate(&wf);
        assert!(result.valid);
        let messages: Vec<&str> = result.warnings().map(|w| w.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("Condition node 'check'")));
        assert!(messages.iter().any(|m| m.contains("Action node 'noop' has no actions")));
    }

    #[test]
    fn severity_serializes_lowercase() {
        let finding = ValidationError::warning("x".into(), Some("n"));
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["nodeId"], "n");
    }
}
