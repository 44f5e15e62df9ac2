//! Error types for traversal and migration.
//!
//! Collaborators (traversables, write batches, user handlers) report failures as
//! `anyhow::Error`; the engine converts them into [`TraversalError`] at its boundary
//! so callers always see one structured error type.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraversalError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Fetch error for batch {batch_index}: {reason}")]
    Fetch { batch_index: usize, reason: String },
    #[error("Handler error for batch {batch_index}: {reason}")]
    Handler { batch_index: usize, reason: String },
    #[error("Commit error for batch {batch_index}: {reason}")]
    Commit { batch_index: usize, reason: String },
    #[error("Stage error for batch {batch_index}: {reason}")]
    Stage { batch_index: usize, reason: String },
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl TraversalError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        TraversalError::Configuration(reason.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        TraversalError::Validation(reason.into())
    }

    /// Convert a failure returned by a batch handler.
    ///
    /// Handlers that already fail with a `TraversalError` (the migrator reports
    /// commit and stage failures this way) keep their variant; anything else is
    /// wrapped as a `Handler` error for the given batch.
    pub fn from_handler(batch_index: usize, error: anyhow::Error) -> Self {
        match error.downcast::<TraversalError>() {
            Ok(traversal_error) => traversal_error,
            Err(other) => TraversalError::Handler {
                batch_index,
                reason: format!("{other:#}"),
            },
        }
    }

    /// Batch index the error is attributed to, when it belongs to a batch.
    pub fn batch_index(&self) -> Option<usize> {
        match self {
            TraversalError::Fetch { batch_index, .. }
            | TraversalError::Handler { batch_index, .. }
            | TraversalError::Commit { batch_index, .. }
            | TraversalError::Stage { batch_index, .. } => Some(*batch_index),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for TraversalError {
    fn from(error: config::ConfigError) -> Self {
        TraversalError::Configuration(error.to_string())
    }
}

impl From<serde_json::Error> for TraversalError {
    fn from(error: serde_json::Error) -> Self {
        TraversalError::Validation(format!("JSON serialization error: {error}"))
    }
}

pub type TraversalResult<T> = std::result::Result<T, TraversalError>;
