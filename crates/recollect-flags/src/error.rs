//! Flag evaluation errors

use thiserror::Error;

/// Why a flag could not be evaluated
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlagError {
    /// The source has no value for the key
    #[error("flag not found: {0}")]
    NotFound(String),

    /// The source itself failed
    #[error("flag source error for {key}: {reason}")]
    Source { key: String, reason: String },

    /// The stored value does not have the requested type
    #[error("wrong type for {key}: expected {expected} ({reason})")]
    WrongType {
        key: String,
        expected: &'static str,
        reason: String,
    },

    /// A flag file could not be read or parsed
    #[error("invalid flag file {path}: {reason}")]
    File { path: String, reason: String },
}
