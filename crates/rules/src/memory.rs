//! `InMemoryRuleStore`: a process-local [`RuleStore`].
//!
//! Useful in tests and for tools that load the collection from a file,
//! mutate it, and write it back.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{Rule, RuleStore, StoreError};

#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    rules: RwLock<Vec<Rule>>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an existing collection.
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self {
            rules: RwLock::new(rules),
        }
    }

    /// Consume the store and return its rules.
    pub fn into_rules(self) -> Vec<Rule> {
        self.rules.into_inner()
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn get_rules(&self) -> Result<Vec<Rule>, StoreError> {
        Ok(self.rules.read().await.clone())
    }

    async fn set_rules(&self, rules: Vec<Rule>) -> Result<(), StoreError> {
        debug!("replacing rule collection with {} rules", rules.len());
        *self.rules.write().await = rules;
        Ok(())
    }
}
