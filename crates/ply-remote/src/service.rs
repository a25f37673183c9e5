use std::sync::Arc;

use tracing::{debug, warn};

use ply_store::{ChunkStore, StoreError};

use crate::codec::ChunkCodec;
use crate::error::RemoteResult;
use crate::message::{codes, ChunkMessage};

/// Server side of the chunk protocol over any [`ChunkStore`].
pub struct ChunkService {
    store: Arc<dyn ChunkStore>,
    codec: ChunkCodec,
}

impl ChunkService {
    pub fn new(store: Arc<dyn ChunkStore>, codec: ChunkCodec) -> Self {
        Self { store, codec }
    }

    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }

    /// Answer one request. Failures become [`ChunkMessage::Error`] replies.
    pub fn handle(&self, request: ChunkMessage) -> ChunkMessage {
        let kind = request.type_name();
        let reply = match request {
            ChunkMessage::HasChunks { hashes } => self
                .store
                .has_many(&hashes)
                .map(|absent| ChunkMessage::HasChunksResponse {
                    // Keep request order for the caller.
                    absent: hashes.into_iter().filter(|h| absent.contains(h)).collect(),
                }),
            ChunkMessage::GetChunks { hashes } => self
                .store
                .get_many(&hashes)
                .map(|chunks| ChunkMessage::GetChunksResponse { chunks }),
            ChunkMessage::PutChunks { chunks } => {
                let stored = chunks.len() as u32;
                self.store
                    .put_many(chunks)
                    .map(|()| ChunkMessage::PutChunksResponse { stored })
            }
            other => {
                warn!(kind = other.type_name(), "unexpected request");
                return ChunkMessage::Error {
                    code: codes::BAD_REQUEST,
                    message: format!("{} is not a request", other.type_name()),
                };
            }
        };
        match reply {
            Ok(reply) => {
                debug!(request = kind, reply = reply.type_name(), "chunk request served");
                reply
            }
            Err(e) => {
                warn!(request = kind, error = %e, "chunk request failed");
                let code = match e {
                    StoreError::HashMismatch { .. } => codes::HASH_MISMATCH,
                    _ => codes::STORE_FAILURE,
                };
                ChunkMessage::Error {
                    code,
                    message: e.to_string(),
                }
            }
        }
    }

    /// Decode a request frame, answer it and encode the reply.
    pub fn handle_frame(&self, frame: &[u8]) -> RemoteResult<Vec<u8>> {
        let reply = match self.codec.decode(frame) {
            Ok((request, _)) => self.handle(request),
            Err(e) => ChunkMessage::Error {
                code: codes::BAD_REQUEST,
                message: e.to_string(),
            },
        };
        self.codec.encode(&reply)
    }
}
