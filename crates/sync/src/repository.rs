//! The `WorkflowRepository` trait: where workflow graphs come from.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use compiler::WorkflowGraph;

use crate::SyncError;

/// Read access to stored workflow graphs.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Every workflow that should currently have rules in the engine.
    async fn get_active_workflows(&self) -> Result<Vec<WorkflowGraph>, SyncError>;

    /// A single workflow, or `None` if it no longer exists.
    async fn get_workflow(&self, id: Uuid) -> Result<Option<WorkflowGraph>, SyncError>;
}

/// Process-local repository. "Active" means `enabled`.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowRepository {
    workflows: RwLock<BTreeMap<Uuid, WorkflowGraph>>,
}

impl InMemoryWorkflowRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workflows(workflows: impl IntoIterator<Item = WorkflowGraph>) -> Self {
        Self {
            workflows: RwLock::new(workflows.into_iter().map(|wf| (wf.id, wf)).collect()),
        }
    }

    /// Insert or replace a workflow.
    pub async fn save(&self, workflow: WorkflowGraph) {
        self.workflows.write().await.insert(workflow.id, workflow);
    }

    /// Returns `true` if a workflow was removed.
    pub async fn delete(&self, id: Uuid) -> bool {
        self.workflows.write().await.remove(&id).is_some()
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn get_active_workflows(&self) -> Result<Vec<WorkflowGraph>, SyncError> {
        Ok(self
            .workflows
            .read()
            .await
            .values()
            .filter(|wf| wf.enabled)
            .cloned()
            .collect())
    }

    async fn get_workflow(&self, id: Uuid) -> Result<Option<WorkflowGraph>, SyncError> {
        Ok(self.workflows.read().await.get(&id).cloned())
    }
}
