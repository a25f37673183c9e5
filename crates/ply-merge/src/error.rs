//! Error types for merging.

use ply_db::DbError;
use ply_diff::DiffError;
use ply_list::ListError;
use ply_types::Hash;

/// Errors from the merge engine.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// Tables the merge would modify also have uncommitted changes.
    #[error("merge would overwrite uncommitted changes to: {}", .tables.join(", "))]
    WouldStompChanges { tables: Vec<String> },

    /// One side dropped a table the other side changed.
    #[error("table {table} was deleted on one side and modified on the other")]
    TableDeletedAndModified { table: String },

    /// Both sides changed a table's schema in different ways.
    #[error("table {table} has conflicting schema changes")]
    SchemaConflict { table: String },

    #[error("commits {ours} and {theirs} share no history")]
    NoCommonAncestor { ours: Hash, theirs: Hash },

    #[error("a merge is already in progress")]
    MergeInProgress,

    #[error("no merge in progress")]
    NoMergeInProgress,

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error(transparent)]
    List(#[from] ListError),
}

pub type MergeResult<T> = Result<T, MergeError>;
