use ply_types::Hash;
use ply_value::ValueError;

/// Errors from list operations.
#[derive(Debug, thiserror::Error)]
pub enum ListError {
    /// A point access or edit position is past the end of the list.
    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: u64, len: u64 },

    /// A range is inverted or extends past the end of the list.
    #[error("invalid range {start}..{end} for list of length {len}")]
    InvalidRange { start: u64, end: u64, len: u64 },

    /// A child ref resolved to something other than a list node.
    #[error("expected a list node at {hash}, found {found}")]
    NotANode { hash: Hash, found: String },

    /// Value resolution or decoding failed.
    #[error("value error: {0}")]
    Value(#[from] ValueError),
}

/// Result alias for list operations.
pub type ListResult<T> = Result<T, ListError>;
