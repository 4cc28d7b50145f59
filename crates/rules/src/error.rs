//! Rule-store error type.

use thiserror::Error;

/// Errors returned by a [`RuleStore`](crate::RuleStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing collection could not be read.
    #[error("failed to read rules: {0}")]
    Read(String),

    /// The backing collection could not be written.
    #[error("failed to write rules: {0}")]
    Write(String),

    #[error("rule serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
