//! `rules` crate: the flat condition → action vocabulary shared by the
//! workflow compiler and the rule-evaluation engine.
//!
//! The compiler produces [`Rule`] values; the engine owns the collection they
//! land in, reachable through the [`RuleStore`] trait.

pub mod error;
pub mod model;
pub mod store;
pub mod memory;

pub use error::StoreError;
pub use model::{ActionKind, Condition, Operator, Rule, RuleAction, RuleConditions, RuleType};
pub use store::RuleStore;
pub use memory::InMemoryRuleStore;
