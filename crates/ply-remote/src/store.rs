use std::collections::HashSet;
use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};
use tracing::{trace, warn};

use ply_store::{Chunk, ChunkStore, StoreError, StoreResult};
use ply_types::Hash;

use crate::codec::{ChunkCodec, RemoteConfig};
use crate::error::{RemoteError, RemoteResult};
use crate::message::ChunkMessage;
use crate::transport::ChunkTransport;

/// A [`ChunkStore`] whose chunks live behind a [`ChunkTransport`].
///
/// Calls block on a private single-threaded runtime, so the store must not
/// be used from inside another tokio runtime's async context.
pub struct RemoteChunkStore {
    transport: Arc<dyn ChunkTransport>,
    codec: ChunkCodec,
    runtime: Runtime,
}

impl RemoteChunkStore {
    pub fn new(transport: Arc<dyn ChunkTransport>, config: &RemoteConfig) -> RemoteResult<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            transport,
            codec: ChunkCodec::new(config),
            runtime,
        })
    }

    /// Send one request and wait for its reply. Error replies become
    /// [`RemoteError::Remote`].
    pub fn request(&self, msg: &ChunkMessage) -> RemoteResult<ChunkMessage> {
        let frame = self.codec.encode(msg)?;
        trace!(request = msg.type_name(), bytes = frame.len(), "remote chunk request");
        let reply = self.runtime.block_on(self.transport.call(frame))?;
        let (reply, _) = self.codec.decode(&reply)?;
        match reply {
            ChunkMessage::Error { code, message } => Err(RemoteError::Remote { code, message }),
            reply => Ok(reply),
        }
    }

    fn fetch(&self, hashes: &[Hash]) -> RemoteResult<Vec<Chunk>> {
        match self.request(&ChunkMessage::GetChunks { hashes: hashes.to_vec() })? {
            ChunkMessage::GetChunksResponse { mut chunks } => {
                for chunk in &chunks {
                    chunk.verify()?;
                }
                let wanted: HashSet<Hash> = hashes.iter().copied().collect();
                let received = chunks.len();
                chunks.retain(|c| wanted.contains(&c.hash()));
                if chunks.len() < received {
                    warn!(dropped = received - chunks.len(), "remote sent unrequested chunks");
                }
                Ok(chunks)
            }
            other => Err(unexpected("GetChunksResponse", &other)),
        }
    }

    fn absent(&self, hashes: &[Hash]) -> RemoteResult<HashSet<Hash>> {
        match self.request(&ChunkMessage::HasChunks { hashes: hashes.to_vec() })? {
            ChunkMessage::HasChunksResponse { absent } => Ok(absent.into_iter().collect()),
            other => Err(unexpected("HasChunksResponse", &other)),
        }
    }

    fn send(&self, chunks: Vec<Chunk>) -> RemoteResult<()> {
        match self.request(&ChunkMessage::PutChunks { chunks })? {
            ChunkMessage::PutChunksResponse { .. } => Ok(()),
            other => Err(unexpected("PutChunksResponse", &other)),
        }
    }
}

fn unexpected(expected: &'static str, actual: &ChunkMessage) -> RemoteError {
    RemoteError::UnexpectedResponse {
        expected,
        actual: actual.type_name(),
    }
}

fn backend(e: RemoteError) -> StoreError {
    match e {
        RemoteError::Store(e) => e,
        other => StoreError::Backend(other.to_string()),
    }
}

impl ChunkStore for RemoteChunkStore {
    fn get(&self, hash: &Hash) -> StoreResult<Option<Chunk>> {
        Ok(self
            .fetch(std::slice::from_ref(hash))
            .map_err(backend)?
            .into_iter()
            .find(|c| c.hash() == *hash))
    }

    fn put(&self, chunk: Chunk) -> StoreResult<()> {
        chunk.verify()?;
        self.send(vec![chunk]).map_err(backend)
    }

    fn has(&self, hash: &Hash) -> StoreResult<bool> {
        Ok(self
            .absent(std::slice::from_ref(hash))
            .map_err(backend)?
            .is_empty())
    }

    fn has_many(&self, hashes: &[Hash]) -> StoreResult<HashSet<Hash>> {
        self.absent(hashes).map_err(backend)
    }

    fn get_many(&self, hashes: &[Hash]) -> StoreResult<Vec<Chunk>> {
        self.fetch(hashes).map_err(backend)
    }

    fn put_many(&self, chunks: Vec<Chunk>) -> StoreResult<()> {
        for chunk in &chunks {
            chunk.verify()?;
        }
        self.send(chunks).map_err(backend)
    }
}
