use std::collections::HashMap;
use std::sync::RwLock;

use ply_types::Hash;
use tracing::trace;

use crate::chunk::Chunk;
use crate::error::StoreResult;
use crate::traits::ChunkStore;

/// In-memory, HashMap-based chunk store.
///
/// Intended for tests and embedding. Chunks are held behind a `RwLock` for
/// safe concurrent access and cloned on read.
pub struct InMemoryChunkStore {
    chunks: RwLock<HashMap<Hash, Chunk>>,
}

impl InMemoryChunkStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
        }
    }

    /// Number of chunks currently stored.
    pub fn len(&self) -> usize {
        self.chunks.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.chunks.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored chunks.
    pub fn total_bytes(&self) -> u64 {
        self.chunks
            .read()
            .expect("lock poisoned")
            .values()
            .map(|chunk| chunk.len() as u64)
            .sum()
    }

    /// Return a sorted list of all chunk hashes in the store.
    pub fn all_hashes(&self) -> Vec<Hash> {
        let map = self.chunks.read().expect("lock poisoned");
        let mut hashes: Vec<Hash> = map.keys().copied().collect();
        hashes.sort();
        hashes
    }
}

impl Default for InMemoryChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkStore for InMemoryChunkStore {
    fn get(&self, hash: &Hash) -> StoreResult<Option<Chunk>> {
        let map = self.chunks.read().expect("lock poisoned");
        Ok(map.get(hash).cloned())
    }

    fn put(&self, chunk: Chunk) -> StoreResult<()> {
        chunk.verify()?;
        let mut map = self.chunks.write().expect("lock poisoned");
        trace!(hash = %chunk.hash().short_hex(), len = chunk.len(), "put chunk");
        map.entry(chunk.hash()).or_insert(chunk);
        Ok(())
    }

    fn has(&self, hash: &Hash) -> StoreResult<bool> {
        let map = self.chunks.read().expect("lock poisoned");
        Ok(map.contains_key(hash))
    }

    fn put_many(&self, chunks: Vec<Chunk>) -> StoreResult<()> {
        for chunk in &chunks {
            chunk.verify()?;
        }
        let mut map = self.chunks.write().expect("lock poisoned");
        for chunk in chunks {
            map.entry(chunk.hash()).or_insert(chunk);
        }
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryChunkStore")
            .field("chunk_count", &self.len())
            .finish()
    }
}
