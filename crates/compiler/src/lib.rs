//! `compiler` crate: workflow graph model, validation, decomposition into
//! flat rules, and the deterministic repair pass.
//!
//! All three entry points are pure, synchronous functions over an immutable
//! [`WorkflowGraph`]:
//! - [`validate`] reports blocking errors and advisory warnings.
//! - [`decompose`] compiles the graph into [`rules::Rule`]s.
//! - [`optimize`] returns a repaired copy plus the list of changes made.

pub mod models;
pub mod error;
pub mod ids;
pub mod validate;
pub mod decompose;
pub mod optimize;

pub use models::{
    ActionData, BranchKey, ConditionData, ConditionLogic, DelayData, EndData, Node, NodeKind,
    Position, StateData, Transition, TriggerData, WorkflowGraph,
};
pub use error::CompilerError;
pub use ids::{IdGenerator, SequentialIdGenerator, UuidIdGenerator};
pub use validate::{validate, Severity, ValidationError, ValidationResult};
pub use decompose::{decompose, rule_id_prefix, state_tag};
pub use optimize::{optimize, Change, ChangeType, OptimizeResult, Optimizer, OptimizerConfig};
