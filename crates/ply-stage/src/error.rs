//! Error types for staging.

use ply_db::DbError;

/// Errors from staging operations. Every variant leaves the working and
/// staged pointers exactly as they were.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Named tables exist in none of the roots consulted.
    #[error("table(s) not found: {}", .missing.join(", "))]
    TableNotFound { missing: Vec<String> },

    /// Named tables still have conflicting rows from a merge.
    #[error("table(s) in conflict: {}", .tables.join(", "))]
    TablesInConflict { tables: Vec<String> },

    #[error(transparent)]
    Db(#[from] DbError),
}

impl StageError {
    /// Whether the failure came from reading or writing storage rather than
    /// from validating the request.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, StageError::Db(_))
    }
}

pub type StageResult<T> = Result<T, StageError>;
