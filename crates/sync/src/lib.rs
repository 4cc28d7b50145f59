//! `rule-sync` crate: keeps the rule engine's collection in step with
//! compiled workflows.
//!
//! Every rule compiled from workflow `W` carries the ID prefix `wf-{W}-`.
//! [`RuleSync`] replaces exactly that partition, leaving hand-authored rules
//! and other workflows' rules untouched.

pub mod error;
pub mod repository;
pub mod adapter;

pub use error::SyncError;
pub use repository::{InMemoryWorkflowRepository, WorkflowRepository};
pub use adapter::{RuleSync, SyncConfig, SyncReport};
