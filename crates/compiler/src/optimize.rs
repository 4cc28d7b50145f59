//! Deterministic structural repair.
//!
//! `Optimizer::optimize` works on a copy of the input and applies five fixes
//! in a fixed order, each possibly feeding the next:
//! 1. add an `end` node if none exists,
//! 2. connect dead-end nodes to it,
//! 3. give every state an SLA from its label,
//! 4. add an `Escalated` state when SLAs exist but nothing escalates,
//! 5. complete half-wired condition nodes.
//!
//! For any graph whose entry node exists and whose transitions reference
//! existing nodes, the output validates without errors.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::ids::{IdGenerator, UuidIdGenerator};
use crate::models::{BranchKey, Node, NodeKind, Position, StateData, Transition, WorkflowGraph};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Layout knobs for synthesized nodes.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Vertical gap between the lowest node and a synthesized end node.
    pub node_spacing: f64,
    /// Horizontal gap between the rightmost node and a synthesized
    /// escalation state.
    pub escalation_offset: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            node_spacing: 150.0,
            escalation_offset: 250.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    AddEndNode,
    ConnectDeadEnd,
    AddSla,
    AddEscalation,
    FixBranch,
}

/// One repair applied by the optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeResult {
    pub workflow: WorkflowGraph,
    pub changes: Vec<Change>,
}

/// Default SLA for a state, by case-insensitive substring match on its label.
pub fn default_sla_minutes(label: &str) -> u32 {
    let label = label.to_lowercase();
    if label.contains("new") || label.contains("triage") {
        60
    } else if label.contains("progress") {
        240
    } else if label.contains("waiting") {
        480
    } else if label.contains("escalat") {
        120
    } else {
        240
    }
}

/// Repair a workflow with the default configuration and random IDs.
pub fn optimize(workflow: &WorkflowGraph) -> OptimizeResult {
    Optimizer::default().optimize(workflow)
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

pub struct Optimizer {
    ids: Arc<dyn IdGenerator>,
    config: OptimizerConfig,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new(Arc::new(UuidIdGenerator), OptimizerConfig::default())
    }
}

impl Optimizer {
    pub fn new(ids: Arc<dyn IdGenerator>, config: OptimizerConfig) -> Self {
        Self { ids, config }
    }

    /// Return a repaired copy of `workflow` and the changes applied.
    ///
    /// The result validates whenever the input's entry node exists and its
    /// transitions only reference existing nodes. An extra `end` node that no
    /// transition references is not repaired and stays an orphan error.
    #[instrument(skip(self, workflow), fields(workflow_id = %workflow.id))]
    pub fn optimize(&self, workflow: &WorkflowGraph) -> OptimizeResult {
        let mut wf = workflow.clone();
        let mut changes = Vec::new();

        let end_id = self.add_end_node(&mut wf, &mut changes);
        self.connect_dead_ends(&mut wf, &end_id, &mut changes);
        self.add_default_slas(&mut wf, &mut changes);
        self.add_escalation_path(&mut wf, &end_id, &mut changes);
        self.fix_incomplete_branches(&mut wf, &end_id, &mut changes);

        wf.version = wf.version.saturating_add(1);
        wf.updated_at = Utc::now();

        info!(
            "optimized workflow '{}' to version {} with {} change(s)",
            wf.name,
            wf.version,
            changes.len()
        );
        OptimizeResult { workflow: wf, changes }
    }

    fn link(&self, from: &str, to: &str, label: &str) -> Transition {
        Transition::new(self.ids.next_id(), from, to).with_label(label)
    }

    // -----------------------------------------------------------------------
    // Fix 1: missing end node
    // -----------------------------------------------------------------------

    /// Returns the ID of the end node the remaining fixes wire into.
    fn add_end_node(&self, wf: &mut WorkflowGraph, changes: &mut Vec<Change>) -> String {
        if let Some(end) = wf.end_node() {
            return end.id.clone();
        }

        let lowest = wf
            .nodes
            .values()
            .map(|n| n.position)
            .max_by(|a, b| a.y.total_cmp(&b.y))
            .unwrap_or_default();
        let position = Position {
            x: lowest.x,
            y: lowest.y + self.config.node_spacing,
        };

        let id = self.ids.next_id();
        let mut end = Node::end(id.clone(), "End");
        end.position = position;
        wf.add_node(end);

        debug!("added end node '{}'", id);
        changes.push(Change {
            change_type: ChangeType::AddEndNode,
            description: "Added missing end node".to_string(),
            node_id: Some(id.clone()),
        });
        id
    }

    // -----------------------------------------------------------------------
    // Fix 2: dead ends
    // -----------------------------------------------------------------------

    fn connect_dead_ends(&self, wf: &mut WorkflowGraph, end_id: &str, changes: &mut Vec<Change>) {
        let dead_ends: Vec<(String, String)> = wf
            .nodes
            .values()
            .filter(|n| !n.is_end() && wf.outgoing(&n.id).next().is_none())
            .map(|n| (n.id.clone(), n.label()))
            .collect();

        for (id, label) in dead_ends {
            wf.add_transition(self.link(&id, end_id, "Close"));
            changes.push(Change {
                change_type: ChangeType::ConnectDeadEnd,
                description: format!("Connected dead end '{label}' to the end node"),
                node_id: Some(id),
            });
        }
    }

    // -----------------------------------------------------------------------
    // Fix 3: default SLAs
    // -----------------------------------------------------------------------

    fn add_default_slas(&self, wf: &mut WorkflowGraph, changes: &mut Vec<Change>) {
        for node in wf.nodes.values_mut() {
            let NodeKind::State(state) = &mut node.kind else {
                continue;
            };
            if state.sla_minutes.is_some() {
                continue;
            }
            let minutes = default_sla_minutes(&state.label);
            state.sla_minutes = Some(minutes);
            changes.push(Change {
                change_type: ChangeType::AddSla,
                description: format!("Set {minutes} minute SLA on '{}'", state.label),
                node_id: Some(node.id.clone()),
            });
        }
    }

    // -----------------------------------------------------------------------
    // Fix 4: escalation path
    // -----------------------------------------------------------------------

    fn add_escalation_path(&self, wf: &mut WorkflowGraph, end_id: &str, changes: &mut Vec<Change>) {
        let sla_states: Vec<&Node> = wf
            .nodes
            .values()
            .filter(|n| matches!(&n.kind, NodeKind::State(s) if s.sla_minutes.is_some()))
            .collect();
        if sla_states.is_empty() {
            return;
        }
        // Only authored labels count; trigger and delay labels echo event names.
        let has_escalation = wf.nodes.values().any(|n| match &n.kind {
            NodeKind::State(s) => s.label.to_lowercase().contains("escalat"),
            NodeKind::End(e) => e.label.to_lowercase().contains("escalat"),
            _ => false,
        });
        if has_escalation {
            return;
        }

        let max_x = wf
            .nodes
            .values()
            .map(|n| n.position.x)
            .fold(f64::NEG_INFINITY, f64::max);
        let min_y = sla_states
            .iter()
            .map(|n| n.position.y)
            .fold(f64::INFINITY, f64::min);
        let sources: Vec<String> = sla_states.iter().map(|n| n.id.clone()).collect();

        let id = self.ids.next_id();
        let mut escalated = Node::state(id.clone(), StateData::new("Escalated"));
        escalated.position = Position {
            x: max_x + self.config.escalation_offset,
            y: min_y,
        };
        wf.add_node(escalated);

        for source in &sources {
            wf.add_transition(self.link(source, &id, "SLA Breach"));
        }
        wf.add_transition(self.link(&id, end_id, "Resolve"));

        debug!("added escalation state '{}' fed by {} states", id, sources.len());
        changes.push(Change {
            change_type: ChangeType::AddEscalation,
            description: format!(
                "Added Escalated state reached from {} state(s) on SLA breach",
                sources.len()
            ),
            node_id: Some(id),
        });
    }

    // -----------------------------------------------------------------------
    // Fix 5: incomplete branches
    // -----------------------------------------------------------------------

    fn fix_incomplete_branches(
        &self,
        wf: &mut WorkflowGraph,
        end_id: &str,
        changes: &mut Vec<Change>,
    ) {
        let incomplete: Vec<(String, BranchKey)> = wf
            .nodes
            .values()
            .filter(|n| matches!(n.kind, NodeKind::Condition(_)))
            .filter_map(|n| {
                let outgoing: Vec<&Transition> = wf.outgoing(&n.id).collect();
                if outgoing.len() >= 2 {
                    return None;
                }
                let has_yes = outgoing
                    .iter()
                    .any(|t| t.branch_key.is_some_and(BranchKey::is_affirmative));
                let missing = if has_yes { BranchKey::No } else { BranchKey::Yes };
                Some((n.id.clone(), missing))
            })
            .collect();

        for (id, missing) in incomplete {
            let label = match missing {
                BranchKey::Yes | BranchKey::True => "Yes",
                BranchKey::No | BranchKey::False => "No",
            };
            wf.add_transition(self.link(&id, end_id, label).with_branch(missing));
            changes.push(Change {
                change_type: ChangeType::FixBranch,
                description: format!("Added missing '{label}' branch to the end node"),
                node_id: Some(id),
            });
        }
    }
}
