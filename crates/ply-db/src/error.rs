//! Error types for the database crate.

use ply_list::ListError;
use ply_refs::RefError;
use ply_types::Hash;
use ply_value::ValueError;

/// Errors from database, commit and repo-environment operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A commit spec did not resolve to a commit.
    #[error("revision not found: {0}")]
    RevisionNotFound(String),

    /// A commit spec could not be parsed.
    #[error("invalid commit spec {spec:?}: {reason}")]
    InvalidCommitSpec { spec: String, reason: String },

    /// One of the session's roots could not be loaded.
    #[error("{root} root {hash} is unreadable: {source}")]
    RootUnreadable {
        root: String,
        hash: Hash,
        #[source]
        source: Box<DbError>,
    },

    /// The ref store has no repo state yet.
    #[error("repository not initialised")]
    NotInitialised,

    /// A branch with this name already exists.
    #[error("branch already exists: {0}")]
    BranchExists(String),

    /// A fast-forward was requested to a commit that does not descend from
    /// the branch head.
    #[error("branch {branch} cannot fast-forward from {from} to {to}")]
    NotFastForward { branch: String, from: Hash, to: Hash },

    /// A stored value has the right type but malformed content.
    #[error("malformed {what}: {reason}")]
    Malformed { what: String, reason: String },

    #[error("value error: {0}")]
    Value(#[from] ValueError),

    #[error("list error: {0}")]
    List(#[from] ListError),

    #[error("ref error: {0}")]
    Ref(#[from] RefError),
}

/// Convenience alias for database results.
pub type DbResult<T> = Result<T, DbError>;
