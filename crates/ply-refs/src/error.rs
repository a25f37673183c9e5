//! Error types for reference operations.

use ply_types::Hash;
use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// The reference was not found.
    #[error("ref not found: {name}")]
    NotFound { name: String },

    /// A reference with this name already exists.
    #[error("ref already exists: {name}")]
    AlreadyExists { name: String },

    /// The branch or tag name is invalid.
    #[error("invalid ref name: {name}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A tag is immutable and cannot be updated.
    #[error("tag is immutable: {name}")]
    TagImmutable { name: String },

    /// Cannot delete the currently checked-out branch.
    #[error("cannot delete current branch: {name}")]
    DeleteCurrentBranch { name: String },

    /// A compare-and-set found a different target than expected.
    #[error("ref {name} moved: expected {expected:?}, found {actual:?}")]
    StaleRef {
        name: String,
        expected: Option<Hash>,
        actual: Option<Hash>,
    },

    /// The repo state changed since the caller read it.
    #[error("repo state changed concurrently")]
    StaleState,

    /// The repo state has not been initialised.
    #[error("repo state not initialised")]
    NoRepoState,

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error during file-based ref operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for ref operations.
pub type RefResult<T> = std::result::Result<T, RefError>;
