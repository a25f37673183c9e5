use serde::{Deserialize, Serialize};

use ply_store::Chunk;
use ply_types::Hash;

/// Default cap on an encoded message.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 128 * 1024 * 1024;

/// Error codes carried by [`ChunkMessage::Error`].
pub mod codes {
    pub const BAD_REQUEST: u32 = 400;
    pub const HASH_MISMATCH: u32 = 422;
    pub const STORE_FAILURE: u32 = 500;
}

/// Requests and responses of the chunk transfer protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkMessage {
    HasChunks { hashes: Vec<Hash> },
    /// The requested hashes the server does not have.
    HasChunksResponse { absent: Vec<Hash> },
    GetChunks { hashes: Vec<Hash> },
    /// Chunks the server has, in request order; missing ones are skipped.
    GetChunksResponse { chunks: Vec<Chunk> },
    PutChunks { chunks: Vec<Chunk> },
    PutChunksResponse { stored: u32 },
    Error { code: u32, message: String },
}

impl ChunkMessage {
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::HasChunks { .. } => 1,
            Self::HasChunksResponse { .. } => 2,
            Self::GetChunks { .. } => 3,
            Self::GetChunksResponse { .. } => 4,
            Self::PutChunks { .. } => 5,
            Self::PutChunksResponse { .. } => 6,
            Self::Error { .. } => 255,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::HasChunks { .. } => "HasChunks",
            Self::HasChunksResponse { .. } => "HasChunksResponse",
            Self::GetChunks { .. } => "GetChunks",
            Self::GetChunksResponse { .. } => "GetChunksResponse",
            Self::PutChunks { .. } => "PutChunks",
            Self::PutChunksResponse { .. } => "PutChunksResponse",
            Self::Error { .. } => "Error",
        }
    }
}
