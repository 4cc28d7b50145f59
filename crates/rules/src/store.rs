//! The `RuleStore` trait: the rule engine's side of the sync boundary.

use async_trait::async_trait;

use crate::{Rule, StoreError};

/// The global rule collection owned by the rule-evaluation engine.
///
/// The collection is read and replaced wholesale. Callers that filter and
/// re-append a subset must hold their own lock across the
/// `get_rules` / `set_rules` pair so concurrent writers do not drop each
/// other's updates.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Snapshot of every rule, in engine order.
    async fn get_rules(&self) -> Result<Vec<Rule>, StoreError>;

    /// Replace the whole collection.
    async fn set_rules(&self, rules: Vec<Rule>) -> Result<(), StoreError>;
}
