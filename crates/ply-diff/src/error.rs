//! Error types for the diff crate.

use ply_list::ListError;
use ply_value::ValueError;

/// Errors that can occur during diff operations.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// The diff was cancelled or its consumer went away.
    #[error("diff cancelled")]
    Cancelled,

    /// Loading a tree node failed.
    #[error("list error: {0}")]
    List(#[from] ListError),

    /// Reading child values failed.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// The worker thread running a streamed diff panicked.
    #[error("diff worker panicked")]
    WorkerPanicked,
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
