//! Error types for recollect-core

use std::time::Duration;

use thiserror::Error;

/// Result type alias for recollect operations
pub type Result<T> = std::result::Result<T, RecollectError>;

/// Main error type for recollect operations
#[derive(Error, Debug)]
pub enum RecollectError {
    /// Payload validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Queue submission and retrieval errors
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Graph write errors
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Persistence-related errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl RecollectError {
    /// True when retrying the same input can never succeed
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::Validation(_) => true,
            Self::Graph(e) => e.is_permanent(),
            Self::Queue(_) | Self::Persistence(_) => false,
        }
    }
}

/// Category of a validation failure, as reported to API callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    /// A required field was absent
    MissingField,
    /// `kind` is not one of the recognised interaction kinds
    InvalidKind,
    /// `timestamp` is not a finite, non-negative number of seconds
    InvalidTimestamp,
    /// An identifier field is not a valid UUID
    InvalidIdentifier,
    /// `metadata` is not a JSON object
    InvalidMetadata,
}

impl ValidationErrorKind {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingField => "missing-field",
            Self::InvalidKind => "invalid-kind",
            Self::InvalidTimestamp => "invalid-timestamp",
            Self::InvalidIdentifier => "invalid-identifier",
            Self::InvalidMetadata => "invalid-metadata",
        }
    }
}

impl std::fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A payload failed structural validation and was never queued
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} ({field}): {detail}")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub field: &'static str,
    pub detail: String,
}

impl ValidationError {
    pub fn missing_field(field: &'static str) -> Self {
        Self {
            kind: ValidationErrorKind::MissingField,
            field,
            detail: format!("'{}' is required", field),
        }
    }

    pub fn invalid_kind(value: impl Into<String>) -> Self {
        Self {
            kind: ValidationErrorKind::InvalidKind,
            field: "kind",
            detail: format!("unknown interaction kind '{}'", value.into()),
        }
    }

    pub fn invalid_timestamp(detail: impl Into<String>) -> Self {
        Self {
            kind: ValidationErrorKind::InvalidTimestamp,
            field: "timestamp",
            detail: detail.into(),
        }
    }

    pub fn invalid_identifier(field: &'static str, detail: impl Into<String>) -> Self {
        Self {
            kind: ValidationErrorKind::InvalidIdentifier,
            field,
            detail: detail.into(),
        }
    }

    pub fn invalid_metadata(detail: impl Into<String>) -> Self {
        Self {
            kind: ValidationErrorKind::InvalidMetadata,
            field: "metadata",
            detail: detail.into(),
        }
    }
}

/// Queue-specific errors
#[derive(Error, Debug)]
pub enum QueueError {
    /// The transport failed while talking to the queue
    #[error("Transport error: {0}")]
    Transport(String),

    /// The queue is not accepting work
    #[error("Queue unavailable: {0}")]
    Unavailable(String),

    /// Submission did not complete in time
    #[error("Queue submission timed out after {0:?}")]
    Timeout(Duration),

    /// Batch exceeds what the implementation accepts
    #[error("Batch of {size} exceeds limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    /// Message body could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Graph-specific errors
#[derive(Error, Debug)]
pub enum GraphError {
    /// Referenced node does not exist
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Edge would connect a node to itself
    #[error("Self-loop on node {0}")]
    SelfLoop(String),

    /// Nodes and edge belong to different users
    #[error("Owner mismatch: {0}")]
    OwnerMismatch(String),

    /// A node already exists under this ID with another label
    #[error("Node {id} is a {existing}, not a {requested}")]
    LabelConflict {
        id: String,
        existing: String,
        requested: String,
    },

    /// Backend failure
    #[error("Backend error: {0}")]
    Backend(String),
}

impl GraphError {
    /// Conflicts in the data itself, as opposed to backend trouble
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::SelfLoop(_) | Self::OwnerMismatch(_) | Self::LabelConflict { .. }
        )
    }
}

/// Persistence-specific errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored row could not be decoded
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// Lock poisoned by a panicking writer
    #[error("Lock poisoned: {0}")]
    Poisoned(String),
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        PersistenceError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::Serialization(err.to_string())
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for RecollectError {
    fn from(err: rusqlite::Error) -> Self {
        RecollectError::Persistence(PersistenceError::Database(err.to_string()))
    }
}
