use std::collections::HashSet;

use ply_types::Hash;

use crate::chunk::Chunk;
use crate::error::StoreResult;

/// Content-addressed chunk store.
///
/// All implementations must satisfy these invariants:
/// - Chunks are immutable once written; the same bytes always map to the
///   same hash.
/// - `put` rejects a chunk whose hash does not match its bytes.
/// - Concurrent reads are always safe.
/// - All I/O errors are propagated, never silently ignored.
pub trait ChunkStore: Send + Sync {
    /// Read a chunk by hash.
    ///
    /// Returns `Ok(None)` if the chunk does not exist.
    fn get(&self, hash: &Hash) -> StoreResult<Option<Chunk>>;

    /// Store a chunk. Writing a chunk that already exists is a no-op.
    fn put(&self, chunk: Chunk) -> StoreResult<()>;

    /// Check whether a chunk exists.
    fn has(&self, hash: &Hash) -> StoreResult<bool>;

    /// Return the subset of `hashes` that are **absent** from the store.
    fn has_many(&self, hashes: &[Hash]) -> StoreResult<HashSet<Hash>> {
        let mut absent = HashSet::new();
        for hash in hashes {
            if !self.has(hash)? {
                absent.insert(*hash);
            }
        }
        Ok(absent)
    }

    /// Read every present chunk among `hashes`, in request order.
    ///
    /// Missing chunks are skipped; callers compare hashes to detect them.
    fn get_many(&self, hashes: &[Hash]) -> StoreResult<Vec<Chunk>> {
        let mut chunks = Vec::with_capacity(hashes.len());
        for hash in hashes {
            if let Some(chunk) = self.get(hash)? {
                chunks.push(chunk);
            }
        }
        Ok(chunks)
    }

    /// Store several chunks.
    fn put_many(&self, chunks: Vec<Chunk>) -> StoreResult<()> {
        for chunk in chunks {
            self.put(chunk)?;
        }
        Ok(())
    }
}
