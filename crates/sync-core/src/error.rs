//! Error types for a synchronization pass.
//!
//! Validation errors are local to one record and never abort a pass.
//! Storage errors are classified by the caller as structural (fatal) or
//! per-record depending on which stage raised them.

use std::time::Duration;
use thiserror::Error;

/// A record failed structural validation before identity resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A configured natural-key field is absent or null.
    #[error("natural key field '{field}' is missing")]
    MissingKeyField { field: String },

    /// A natural-key field is present but blank after trimming.
    #[error("natural key field '{field}' is empty")]
    EmptyKeyField { field: String },

    /// The modification timestamp field is absent or null.
    #[error("modification timestamp field '{field}' is missing or null")]
    MissingModifiedAt { field: String },

    /// The modification timestamp field holds a non-timestamp value.
    #[error("modification timestamp field '{field}' holds a {kind} value, expected timestamp")]
    InvalidModifiedAt { field: String, kind: &'static str },

    /// The source could not convert a column of this row.
    #[error("field '{field}' could not be read: {reason}")]
    UnreadableField { field: String, reason: String },
}

/// Errors surfaced by the stages of a synchronization pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Record-level validation failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A source or destination call failed.
    #[error("{operation} failed: {message}")]
    Storage { operation: String, message: String },

    /// A source or destination call did not finish within the configured timeout.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    /// Too many consecutive per-record storage failures.
    #[error("circuit breaker tripped after {consecutive_errors} consecutive errors")]
    CircuitBreakerTripped { consecutive_errors: usize },

    /// The caller cancelled the pass.
    #[error("pass cancelled by caller")]
    Cancelled,
}

impl SyncError {
    /// Build a storage error from any displayable cause, keeping its context chain.
    pub fn storage(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Storage {
            operation: operation.into(),
            message: format!("{cause:#}"),
        }
    }
}

/// Result type for sync-core operations.
pub type Result<T> = std::result::Result<T, SyncError>;
