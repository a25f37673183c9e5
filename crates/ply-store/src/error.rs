use ply_types::Hash;

/// Errors from chunk store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested chunk was not found.
    #[error("chunk not found: {0}")]
    NotFound(Hash),

    /// A chunk's bytes do not hash to the address it was stored under.
    #[error("hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch { expected: Hash, computed: Hash },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The chunk data on disk is malformed or cannot be decompressed.
    #[error("corrupt chunk {hash}: {reason}")]
    CorruptChunk { hash: Hash, reason: String },

    /// A remote or otherwise indirect backend failed.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
