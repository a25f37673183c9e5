use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use ply_store::{Chunk, ChunkStore};
use ply_types::Hash;

use crate::codec;
use crate::error::{ValueError, ValueResult};
use crate::reference::Ref;
use crate::types::Type;
use crate::value::Value;

/// Content-defined chunking parameters.
///
/// These must stay fixed for every version of a collection written to one
/// store, otherwise unchanged regions stop sharing chunks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Rolling-hash window in bytes (default: 67).
    pub window: usize,
    /// Number of low hash bits that must all be set to end a chunk
    /// (default: 12, about 4 KiB average chunks).
    pub pattern_bits: u32,
}

impl ChunkConfig {
    /// Bit mask a rolling hash is tested against.
    pub fn pattern_mask(&self) -> u32 {
        if self.pattern_bits >= 32 {
            u32::MAX
        } else {
            (1u32 << self.pattern_bits) - 1
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            window: 67,
            pattern_bits: 12,
        }
    }
}

/// Read/write capability over a chunk store.
///
/// Every operation that may dereference a [`Ref`] takes a `ValueStore`
/// explicitly; there is no ambient global store. Cloning is cheap.
#[derive(Clone)]
pub struct ValueStore {
    chunks: Arc<dyn ChunkStore>,
    config: ChunkConfig,
}

impl ValueStore {
    /// Wrap a chunk store with the default chunking parameters.
    pub fn new(chunks: Arc<dyn ChunkStore>) -> Self {
        Self::with_config(chunks, ChunkConfig::default())
    }

    pub fn with_config(chunks: Arc<dyn ChunkStore>, config: ChunkConfig) -> Self {
        Self { chunks, config }
    }

    pub fn chunk_config(&self) -> &ChunkConfig {
        &self.config
    }

    pub fn chunks(&self) -> &Arc<dyn ChunkStore> {
        &self.chunks
    }

    /// Fetch and decode the value stored under `hash`.
    pub fn read_value(&self, hash: &Hash) -> ValueResult<Value> {
        let chunk = self
            .chunks
            .get(hash)?
            .ok_or(ValueError::NotFound(*hash))?;
        decode_chunk(&chunk)
    }

    /// Fetch several values in one batch, preserving request order.
    ///
    /// Results are matched to requests by hash, whatever order the store
    /// answers in. Fails with `NotFound` naming the first missing hash.
    pub fn read_values(&self, hashes: &[Hash]) -> ValueResult<Vec<Value>> {
        let chunks = self.chunks.get_many(hashes)?;
        let by_hash: std::collections::HashMap<Hash, Chunk> =
            chunks.into_iter().map(|c| (c.hash(), c)).collect();
        hashes
            .iter()
            .map(|h| {
                let chunk = by_hash.get(h).ok_or(ValueError::NotFound(*h))?;
                decode_chunk(chunk)
            })
            .collect()
    }

    /// Encode and store a value, returning a ref to it.
    pub fn write_value(&self, value: &Value) -> ValueResult<Ref> {
        let data = codec::encode(value);
        let chunk = Chunk::new(data);
        let r = Ref::from_parts(chunk.hash(), Type::of(value), value.max_ref_height() + 1);
        trace!(hash = %r.target_hash().short_hex(), len = chunk.len(), "write value");
        self.chunks.put(chunk)?;
        Ok(r)
    }
}

fn decode_chunk(chunk: &Chunk) -> ValueResult<Value> {
    codec::decode(chunk.data()).map_err(|e| match e {
        ValueError::Decode(reason) => ValueError::Corrupt {
            hash: chunk.hash(),
            reason,
        },
        other => other,
    })
}

impl std::fmt::Debug for ValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
