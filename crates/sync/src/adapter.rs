//! `RuleSync`: compiles workflows and merges the output into the engine's
//! rule collection.
//!
//! The collection is only reachable as a whole (`get_rules` / `set_rules`),
//! so every replacement is a read-modify-write. All of them go through one
//! async mutex held across the pair.

use std::collections::BTreeSet;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use compiler::{decompose, rule_id_prefix, validate, WorkflowGraph};
use rules::{Rule, RuleStore};

use crate::{SyncError, WorkflowRepository};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Refuse to compile workflows whose validation reports errors.
    ///
    /// When unset, such workflows are compiled best-effort and the errors are
    /// logged.
    pub require_valid: bool,
}

// ---------------------------------------------------------------------------
// Output of a sync
// ---------------------------------------------------------------------------

/// What a single workflow sync did to the rule collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub workflow_id: Uuid,
    /// Previously generated rules dropped from the collection.
    pub removed: usize,
    /// Freshly compiled rules appended.
    pub added: usize,
    /// Validation findings of either severity.
    pub findings: usize,
}

// ---------------------------------------------------------------------------
// RuleSync
// ---------------------------------------------------------------------------

pub struct RuleSync<W, R> {
    workflows: W,
    rules: R,
    config: SyncConfig,
    write_lock: Mutex<()>,
}

impl<W: WorkflowRepository, R: RuleStore> RuleSync<W, R> {
    pub fn new(workflows: W, rules: R, config: SyncConfig) -> Self {
        Self {
            workflows,
            rules,
            config,
            write_lock: Mutex::new(()),
        }
    }

    pub fn workflows(&self) -> &W {
        &self.workflows
    }

    pub fn rules(&self) -> &R {
        &self.rules
    }

    pub fn into_parts(self) -> (W, R) {
        (self.workflows, self.rules)
    }

    /// Recompile one workflow. A workflow that no longer exists has its
    /// rules removed.
    #[instrument(skip(self))]
    pub async fn sync_workflow(&self, id: Uuid) -> Result<SyncReport, SyncError> {
        match self.workflows.get_workflow(id).await? {
            Some(workflow) => self.sync_graph(&workflow).await,
            None => {
                let removed = self.replace_workflow_rules(id, Vec::new()).await?;
                info!("workflow {} is gone, removed {} rule(s)", id, removed);
                Ok(SyncReport {
                    workflow_id: id,
                    removed,
                    added: 0,
                    findings: 0,
                })
            }
        }
    }

    /// Recompile every active workflow, in workflow ID order.
    ///
    /// Afterwards, every generated partition that does not belong to an
    /// active workflow is brought in line too: a disabled workflow is
    /// recompiled to disabled rules and a deleted one loses its rules.
    #[instrument(skip(self))]
    pub async fn sync_all(&self) -> Result<Vec<SyncReport>, SyncError> {
        let mut workflows = self.workflows.get_active_workflows().await?;
        workflows.sort_by_key(|wf| wf.id);

        let mut reports = Vec::with_capacity(workflows.len());
        for workflow in &workflows {
            reports.push(self.sync_graph(workflow).await?);
        }
        let active = reports.len();

        let synced: BTreeSet<Uuid> = workflows.iter().map(|wf| wf.id).collect();
        let stale: BTreeSet<Uuid> = self
            .rules
            .get_rules()
            .await?
            .iter()
            .filter_map(|r| partition_of(&r.id))
            .filter(|id| !synced.contains(id))
            .collect();
        for id in stale {
            reports.push(self.sync_inactive(id).await?);
        }

        info!(
            "synced {} active workflow(s) and {} inactive partition(s)",
            active,
            reports.len() - active
        );
        Ok(reports)
    }

    /// Bring the partition of a workflow that is not active in line with the
    /// repository. An invalid disabled workflow that cannot be recompiled
    /// under `require_valid` has its rules dropped instead.
    async fn sync_inactive(&self, id: Uuid) -> Result<SyncReport, SyncError> {
        match self.sync_workflow(id).await {
            Err(SyncError::InvalidWorkflow { error_count, .. }) => {
                let removed = self.replace_workflow_rules(id, Vec::new()).await?;
                warn!(
                    "inactive workflow {} has {} validation error(s), removed {} rule(s)",
                    id, error_count, removed
                );
                Ok(SyncReport {
                    workflow_id: id,
                    removed,
                    added: 0,
                    findings: error_count,
                })
            }
            other => other,
        }
    }

    /// Drop every rule generated for `id`. Returns how many were removed.
    pub async fn remove_workflow(&self, id: Uuid) -> Result<usize, SyncError> {
        self.replace_workflow_rules(id, Vec::new()).await
    }

    /// Compile `workflow` and replace its rule partition.
    #[instrument(skip(self, workflow), fields(workflow_id = %workflow.id))]
    pub async fn sync_graph(&self, workflow: &WorkflowGraph) -> Result<SyncReport, SyncError> {
        let report = validate(workflow);
        if !report.valid {
            let error_count = report.errors_only().count();
            if self.config.require_valid {
                return Err(SyncError::InvalidWorkflow {
                    workflow_id: workflow.id,
                    error_count,
                });
            }
            for finding in report.errors_only() {
                warn!("compiling invalid workflow '{}': {}", workflow.name, finding.message);
            }
        }

        let compiled = decompose(workflow);
        let added = compiled.len();
        let removed = self.replace_workflow_rules(workflow.id, compiled).await?;

        info!(
            "workflow '{}' synced: {} rule(s) removed, {} added",
            workflow.name, removed, added
        );
        Ok(SyncReport {
            workflow_id: workflow.id,
            removed,
            added,
            findings: report.errors.len(),
        })
    }

    /// Swap the `wf-{id}-` partition for `compiled`.
    ///
    /// Rules outside the partition keep their relative order; the new rules
    /// are appended after them.
    async fn replace_workflow_rules(
        &self,
        id: Uuid,
        compiled: Vec<Rule>,
    ) -> Result<usize, SyncError> {
        let prefix = rule_id_prefix(id);

        let _guard = self.write_lock.lock().await;
        let current = self.rules.get_rules().await?;
        let before = current.len();
        let mut kept: Vec<Rule> = current
            .into_iter()
            .filter(|r| !r.id.starts_with(&prefix))
            .collect();
        let removed = before - kept.len();
        kept.extend(compiled);
        self.rules.set_rules(kept).await?;

        Ok(removed)
    }
}

/// The workflow a generated rule belongs to, read from its `wf-{id}-` prefix.
fn partition_of(rule_id: &str) -> Option<Uuid> {
    let rest = rule_id.strip_prefix("wf-")?;
    let id = Uuid::try_parse(rest.get(..36)?).ok()?;
    rest[36..].starts_with('-').then_some(id)
}
