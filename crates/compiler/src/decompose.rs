//! Graph → rule decomposition.
//!
//! A ticket's position in a workflow is encoded as a tag,
//! `wf:{workflow}:state:{node}`. Each transition compiles into one rule that
//! fires while the ticket carries the source tag and moves it to the target
//! tag. Because every rule is keyed on its own source tag, the transition
//! list is walked exactly once and cycles need no special handling.
//!
//! Rule order is: entry rules, transition rules (both in transition order),
//! on-enter rules, SLA rules (both in node ID order).

use serde_json::Value;
use tracing::{debug, instrument};
use uuid::Uuid;

use rules::{Condition, Operator, Rule, RuleAction, RuleConditions, RuleType};

use crate::models::{DelayData, Node, NodeKind, Transition, TriggerData, WorkflowGraph};

/// The ticket tag marking membership of `node_id`.
pub fn state_tag(workflow_id: Uuid, node_id: &str) -> String {
    format!("wf:{workflow_id}:state:{node_id}")
}

/// Prefix shared by every rule ID generated for `workflow_id`.
pub fn rule_id_prefix(workflow_id: Uuid) -> String {
    format!("wf-{workflow_id}-")
}

/// Compile a workflow graph into flat rules.
///
/// Never fails: transitions whose endpoints cannot be resolved are skipped,
/// and a missing entry node only suppresses the entry rules.
#[instrument(skip(workflow), fields(workflow_id = %workflow.id))]
pub fn decompose(workflow: &WorkflowGraph) -> Vec<Rule> {
    let compiler = Decomposer { workflow };
    let mut rules = Vec::new();

    let entry_id = workflow.entry_node_id.as_str();
    let entry_trigger = workflow.node(entry_id).and_then(|n| match &n.kind {
        NodeKind::Trigger(t) => Some(t),
        _ => None,
    });

    // -----------------------------------------------------------------------
    // Entry trigger
    // -----------------------------------------------------------------------
    if let Some(trigger) = entry_trigger {
        for t in workflow.outgoing(entry_id) {
            match workflow.node(&t.to_node_id) {
                Some(to) => rules.push(compiler.entry_rule(trigger, t, to)),
                None => debug!("skipping entry transition '{}': unknown target", t.id),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Ordinary transitions
    // -----------------------------------------------------------------------
    for t in &workflow.transitions {
        if entry_trigger.is_some() && t.from_node_id == entry_id {
            continue;
        }
        let (Some(from), Some(to)) = (workflow.node(&t.from_node_id), workflow.node(&t.to_node_id))
        else {
            debug!("skipping transition '{}': unresolved endpoint", t.id);
            continue;
        };
        rules.push(compiler.transition_rule(t, from, to));
    }

    // -----------------------------------------------------------------------
    // State on-enter actions
    // -----------------------------------------------------------------------
    for node in workflow.nodes.values() {
        if let NodeKind::State(state) = &node.kind {
            if let Some(actions) = state.on_enter_actions.as_ref().filter(|a| !a.is_empty()) {
                rules.push(compiler.on_enter_rule(node, actions));
            }
        }
    }

    // -----------------------------------------------------------------------
    // SLA rules
    // -----------------------------------------------------------------------
    for node in workflow.nodes.values() {
        if let NodeKind::State(state) = &node.kind {
            if let Some(minutes) = state.sla_minutes {
                rules.push(compiler.sla_rule(node, minutes));
            }
        }
    }

    debug!("decomposed workflow '{}' into {} rules", workflow.name, rules.len());
    rules
}

/// `minutes / 60`, kept integral when it divides evenly.
fn hours(minutes: u32) -> Value {
    if minutes % 60 == 0 {
        Value::from(minutes / 60)
    } else {
        Value::from(f64::from(minutes) / 60.0)
    }
}

fn idle_for(minutes: u32) -> Condition {
    Condition::new("hours_since_updated", Operator::GreaterThan, hours(minutes))
}

fn event_is(event: &str) -> Condition {
    Condition::new("event", Operator::Is, event)
}

struct Decomposer<'a> {
    workflow: &'a WorkflowGraph,
}

impl Decomposer<'_> {
    fn tag(&self, node: &Node) -> String {
        state_tag(self.workflow.id, &node.id)
    }

    fn in_state(&self, node: &Node) -> Condition {
        Condition::new("tags", Operator::Contains, self.tag(node))
    }

    fn rule_id(&self, suffix: &str) -> String {
        format!("{}{}", rule_id_prefix(self.workflow.id), suffix)
    }

    fn rule(
        &self,
        id: String,
        rule_type: RuleType,
        name: String,
        conditions: Vec<Condition>,
        actions: Vec<RuleAction>,
    ) -> Rule {
        Rule {
            id,
            rule_type,
            name: format!("{}: {}", self.workflow.name, name),
            enabled: self.workflow.enabled,
            conditions: RuleConditions { all: conditions },
            actions,
        }
    }

    fn entry_rule(&self, trigger: &TriggerData, t: &Transition, to: &Node) -> Rule {
        let mut conditions = vec![event_is(&trigger.event)];
        conditions.extend(trigger.conditions.iter().cloned());
        conditions.extend(t.conditions.iter().cloned());

        let mut actions = t.actions.clone();
        actions.push(RuleAction::add_tag(self.tag(to)));

        self.rule(
            self.rule_id(&format!("entry-{}", t.id)),
            RuleType::Trigger,
            format!("Entry → {}", to.label()),
            conditions,
            actions,
        )
    }

    fn transition_rule(&self, t: &Transition, from: &Node, to: &Node) -> Rule {
        let mut conditions = vec![self.in_state(from)];
        let mut rule_type = RuleType::Trigger;

        match &from.kind {
            NodeKind::Condition(c) => match t.branch_key {
                Some(key) if key.is_affirmative() => conditions.extend(c.conditions.iter().cloned()),
                Some(_) => conditions.extend(c.conditions.iter().map(Condition::negated)),
                None => {}
            },
            NodeKind::Delay(DelayData::Time { minutes }) => {
                conditions.push(idle_for(*minutes));
                rule_type = RuleType::Automation;
            }
            NodeKind::Delay(DelayData::Event { event }) => conditions.push(event_is(event)),
            NodeKind::Trigger(_) | NodeKind::State(_) | NodeKind::Action(_) | NodeKind::End(_) => {}
        }
        conditions.extend(t.conditions.iter().cloned());

        let mut actions = t.actions.clone();
        actions.push(RuleAction::remove_tag(self.tag(from)));
        actions.push(RuleAction::add_tag(self.tag(to)));

        self.rule(
            self.rule_id(&format!("t-{}", t.id)),
            rule_type,
            format!("{} → {}", from.label(), to.label()),
            conditions,
            actions,
        )
    }

    fn on_enter_rule(&self, node: &Node, actions: &[RuleAction]) -> Rule {
        self.rule(
            self.rule_id(&format!("enter-{}", node.id)),
            RuleType::Trigger,
            format!("Enter {}", node.label()),
            vec![self.in_state(node)],
            actions.to_vec(),
        )
    }

    fn sla_rule(&self, node: &Node, minutes: u32) -> Rule {
        self.rule(
            self.rule_id(&format!("sla-{}", node.id)),
            RuleType::Sla,
            format!("SLA breach for {}", node.label()),
            vec![self.in_state(node), idle_for(minutes)],
            vec![RuleAction::escalate()],
        )
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BranchKey, StateData};
    use rules::ActionKind;
    use serde_json::json;

    fn branching() -> WorkflowGraph {
        let mut wf = WorkflowGraph::new("Triage", "start");
        wf.add_node(Node::trigger("start", "create"));
        wf.add_node(Node::state("new", StateData::new("New")));
        wf.add_node(Node::condition(
            "urgent",
            vec![Condition::new("priority", Operator::Is, "urgent")],
        ));
        wf.add_node(Node::state("hot", StateData::new("Hot")));
        wf.add_node(Node::state("cold", StateData::new("Cold")));
        wf.add_transition(Transition::new("t1", "start", "new"));
        wf.add_transition(Transition::new("t2", "new", "urgent"));
        wf.add_transition(Transition::new("yes", "urgent", "hot").with_branch(BranchKey::Yes));
        wf.add_transition(Transition::new("no", "urgent", "cold").with_branch(BranchKey::No));
        wf
    }

    fn rule<'a>(rules: &'a [Rule], suffix: &str) -> &'a Rule {
        rules
            .iter()
            .find(|r| r.id.ends_with(suffix))
            .unwrap_or_else(|| panic!("no rule ending in {suffix}"))
    }

    #[test]
    fn yes_branch_keeps_conditions_verbatim() {
        let rules = decompose(&branching());
        let yes = rule(&rules, "-t-yes");
        assert!(yes.has_condition("priority", &Operator::Is, &json!("urgent")));
        assert!(!yes.has_condition("priority", &Operator::IsNot, &json!("urgent")));
    }

    #[test]
    fn no_branch_negates_conditions() {
        let rules = decompose(&branching());
        let no = rule(&rules, "-t-no");
        assert!(no.has_condition("priority", &Operator::IsNot, &json!("urgent")));
        assert!(!no.has_condition("priority", &Operator::Is, &json!("urgent")));
    }

    #[test]
    fn true_and_false_keys_behave_like_yes_and_no() {
        let mut wf = branching();
        wf.transitions[2].branch_key = Some(BranchKey::True);
        wf.transitions[3].branch_key = Some(BranchKey::False);
        let rules = decompose(&wf);
        assert!(rule(&rules, "-t-yes").has_condition("priority", &Operator::Is, &json!("urgent")));
        assert!(rule(&rules, "-t-no").has_condition("priority", &Operator::IsNot, &json!("urgent")));
    }

    #[test]
    fn custom_operator_is_not_negated() {
        let mut wf = branching();
        if let NodeKind::Condition(c) = &mut wf.nodes.get_mut("urgent").unwrap().kind {
            c.conditions = vec![Condition::new(
                "subject",
                Operator::Custom("matches".into()),
                "^URGENT",
            )];
        }
        let rules = decompose(&wf);
        assert!(rule(&rules, "-t-no").has_condition(
            "subject",
            &Operator::Custom("matches".into()),
            &json!("^URGENT")
        ));
    }

    #[test]
    fn time_delay_compiles_to_automation_rule() {
        let mut wf = WorkflowGraph::new("Follow-up", "start");
        wf.add_node(Node::trigger("start", "create"));
        wf.add_node(Node::delay_minutes("wait", 90));
        wf.add_node(Node::end("done", "Closed"));
        wf.add_transition(Transition::new("t1", "start", "wait"));
        wf.add_transition(Transition::new("t2", "wait", "done"));

        let rules = decompose(&wf);
        let delayed = rule(&rules, "-t-t2");
        assert_eq!(delayed.rule_type, RuleType::Automation);
        assert!(delayed.has_condition("hours_since_updated", &Operator::GreaterThan, &json!(1.5)));
    }

    #[test]
    fn event_delay_waits_for_event() {
        let mut wf = WorkflowGraph::new("Await reply", "start");
        wf.add_node(Node::trigger("start", "create"));
        wf.add_node(Node::delay_event("wait", "customer_reply"));
        wf.add_node(Node::end("done", "Closed"));
        wf.add_transition(Transition::new("t1", "start", "wait"));
        wf.add_transition(Transition::new("t2", "wait", "done"));

        let rules = decompose(&wf);
        let delayed = rule(&rules, "-t-t2");
        assert_eq!(delayed.rule_type, RuleType::Trigger);
        assert!(delayed.has_condition("event", &Operator::Is, &json!("customer_reply")));
    }

    #[test]
    fn entry_rule_combines_trigger_and_transition() {
        let mut wf = branching();
        if let NodeKind::Trigger(t) = &mut wf.nodes.get_mut("start").unwrap().kind {
            t.conditions = vec![Condition::new("channel", Operator::Is, "email")];
        }
        wf.transitions[0] = Transition::new("t1", "start", "new")
            .with_conditions(vec![Condition::new("priority", Operator::IsNotEmpty, Value::Null)])
            .with_actions(vec![RuleAction::add_tag("triaged")]);

        let rules = decompose(&wf);
        let entry = &rules[0];
        assert_eq!(entry.rule_type, RuleType::Trigger);
        assert_eq!(entry.name, "Triage: Entry → New");
        let fields: Vec<&str> = entry.conditions.all.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["event", "channel", "priority"]);
        assert_eq!(entry.actions[0], RuleAction::add_tag("triaged"));
        assert_eq!(entry.actions[1], RuleAction::add_tag(state_tag(wf.id, "new")));
    }

    #[test]
    fn transition_actions_precede_tag_moves() {
        let mut wf = branching();
        wf.transitions[1] = Transition::new("t2", "new", "urgent")
            .with_actions(vec![RuleAction::new(ActionKind::Custom("notify".into()), None)]);
        let rules = decompose(&wf);
        let kinds: Vec<&ActionKind> = rule(&rules, "-t-t2").actions.iter().map(|a| &a.kind).collect();
        assert_eq!(
            kinds,
            vec![&ActionKind::Custom("notify".into()), &ActionKind::RemoveTag, &ActionKind::AddTag]
        );
    }

    #[test]
    fn on_enter_and_sla_rules() {
        let mut wf = branching();
        wf.add_node(Node::state(
            "hot",
            StateData::new("Hot")
                .with_sla(120)
                .with_on_enter(vec![RuleAction::add_tag("vip")]),
        ));

        let rules = decompose(&wf);
        let enter = rule(&rules, "-enter-hot");
        assert_eq!(enter.name, "Triage: Enter Hot");
        assert_eq!(enter.actions, vec![RuleAction::add_tag("vip")]);

        let sla = rule(&rules, "-sla-hot");
        assert_eq!(sla.rule_type, RuleType::Sla);
        assert_eq!(sla.name, "Triage: SLA breach for Hot");
        assert!(sla.has_condition("hours_since_updated", &Operator::GreaterThan, &json!(2)));
        assert_eq!(sla.actions, vec![RuleAction::escalate()]);
    }

    #[test]
    fn empty_on_enter_list_emits_nothing() {
        let mut wf = branching();
        wf.add_node(Node::state("hot", StateData::new("Hot").with_on_enter(vec![])));
        assert!(!decompose(&wf).iter().any(|r| r.id.contains("-enter-")));
    }

    #[test]
    fn dangling_references_are_skipped() {
        let mut wf = branching();
        wf.add_transition(Transition::new("ghost", "new", "missing"));
        wf.entry_node_id = "gone".into();

        let rules = decompose(&wf);
        assert!(!rules.iter().any(|r| r.id.contains("ghost")));
        assert!(!rules.iter().any(|r| r.id.contains("-entry-")));
        // The former entry trigger is now an ordinary source node.
        assert!(rules.iter().any(|r| r.id.ends_with("-t-t1")));
    }

    #[test]
    fn non_trigger_entry_compiles_as_ordinary_transition() {
        let mut wf = branching();
        wf.entry_node_id = "new".into();
        let rules = decompose(&wf);
        assert!(!rules.iter().any(|r| r.id.contains("-entry-")));
        assert!(rules.iter().any(|r| r.id.ends_with("-t-t2")));
    }
}
