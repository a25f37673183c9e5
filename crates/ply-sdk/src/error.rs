use thiserror::Error;

use ply_db::DbError;
use ply_merge::MergeError;
use ply_refs::RefError;
use ply_stage::StageError;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("nothing to commit")]
    NothingToCommit,

    #[error("unresolved conflicts in: {}", .tables.join(", "))]
    UnresolvedConflicts { tables: Vec<String> },

    #[error("uncommitted changes in: {}", .tables.join(", "))]
    DirtyWorkingSet { tables: Vec<String> },

    #[error("a merge is in progress")]
    MergeInProgress,

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error("ref error: {0}")]
    Ref(#[from] RefError),
}

pub type SdkResult<T> = Result<T, SdkError>;
