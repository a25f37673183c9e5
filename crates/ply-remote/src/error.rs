use ply_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("framing error: {0}")]
    Framing(String),

    #[error("checksum mismatch: header {expected:#010x}, payload {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("frame tag {header} does not match message tag {payload}")]
    TagMismatch { header: u8, payload: u8 },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("remote error: code={code}, message={message}")]
    Remote { code: u32, message: String },

    #[error("unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse { expected: &'static str, actual: &'static str },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RemoteResult<T> = Result<T, RemoteError>;
