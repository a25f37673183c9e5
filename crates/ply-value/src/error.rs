use ply_types::Hash;

/// Errors from value encoding, decoding and resolution.
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    /// A ref points at a hash the chunk store does not have.
    #[error("value not found: {0}")]
    NotFound(Hash),

    /// Bytes could not be decoded as a value.
    #[error("decode error: {0}")]
    Decode(String),

    /// A stored chunk exists but does not decode.
    #[error("corrupt value {hash}: {reason}")]
    Corrupt { hash: Hash, reason: String },

    /// A value decoded fine but is not of the type the caller expected.
    #[error("unexpected type: expected {expected}, found {actual}")]
    UnexpectedType { expected: String, actual: String },

    /// A struct is missing a required field.
    #[error("struct {name} is missing field {field}")]
    MissingField { name: String, field: String },

    /// Chunk store failure.
    #[error("store error: {0}")]
    Store(#[from] ply_store::StoreError),
}

/// Result alias for value operations.
pub type ValueResult<T> = Result<T, ValueError>;
