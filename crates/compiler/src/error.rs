//! Compiler-level error types.
//!
//! Validation findings are not errors; they are returned as data by
//! [`validate`](crate::validate). This type only covers loading a graph.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompilerError {
    /// The workflow definition is not valid JSON or does not match the model.
    #[error("invalid workflow definition: {0}")]
    InvalidDefinition(#[from] serde_json::Error),

    /// A `nodes` map entry is keyed differently from the node's own ID.
    #[error("node stored under key '{key}' has id '{id}'")]
    NodeIdMismatch { key: String, id: String },
}
