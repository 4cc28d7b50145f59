//! Sync-level error types.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The workflow repository failed.
    #[error("workflow repository error: {0}")]
    Repository(String),

    /// Validation found blocking errors and `require_valid` is set.
    #[error("workflow {workflow_id} failed validation with {error_count} error(s)")]
    InvalidWorkflow {
        workflow_id: Uuid,
        error_count: usize,
    },

    /// The rule store failed.
    #[error("rule store error: {0}")]
    Store(#[from] rules::StoreError),
}
