//! Content-defined chunking.
//!
//! Items are appended to a level; each item's boundary bytes pass through a
//! buzhash window, and a chunk ends after any item during which the hash
//! matched the configured bit pattern. Finished chunks are written to the
//! store and their [`MetaTuple`]s become the items of the level above.

use std::mem;
use std::sync::{Arc, OnceLock};

use ply_value::{ChunkConfig, MetaTuple, Sequence, Value, ValueStore};

use crate::error::ListResult;
use crate::node::{build_node, collapse, SequenceItem};

const TABLE_SEED: u64 = 0x706c_795f_6275_7a68;

fn buzhash_table() -> &'static [u32; 256] {
    static TABLE: OnceLock<[u32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        // splitmix64
        let mut state = TABLE_SEED;
        let mut table = [0u32; 256];
        for slot in table.iter_mut() {
            state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
            let mut z = state;
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
            z ^= z >> 31;
            *slot = (z >> 32) as u32;
        }
        table
    })
}

/// Buzhash over a fixed-size byte window.
///
/// The hasher remembers whether any byte since the last [`reset`](Self::reset)
/// produced a hash matching the boundary pattern.
#[derive(Clone, Debug)]
pub struct RollingHasher {
    window: Vec<u8>,
    pos: usize,
    filled: usize,
    hash: u32,
    mask: u32,
    crossed: bool,
}

impl RollingHasher {
    pub fn new(config: &ChunkConfig) -> Self {
        Self {
            window: vec![0; config.window.max(1)],
            pos: 0,
            filled: 0,
            hash: 0,
            mask: config.pattern_mask(),
            crossed: false,
        }
    }

    pub fn hash_byte(&mut self, byte: u8) {
        let table = buzhash_table();
        let size = self.window.len();
        self.hash = self.hash.rotate_left(1) ^ table[byte as usize];
        if self.filled == size {
            let out = self.window[self.pos];
            self.hash ^= table[out as usize].rotate_left((size % 32) as u32);
        } else {
            self.filled += 1;
        }
        self.window[self.pos] = byte;
        self.pos = (self.pos + 1) % size;
        if self.hash & self.mask == self.mask {
            self.crossed = true;
        }
    }

    pub fn hash_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.hash_byte(b);
        }
    }

    pub fn crossed_boundary(&self) -> bool {
        self.crossed
    }

    /// Forget all history, as at the start of a new chunk.
    pub fn reset(&mut self) {
        self.window.fill(0);
        self.pos = 0;
        self.filled = 0;
        self.hash = 0;
        self.crossed = false;
    }
}

/// A chunk written by a [`LevelChunker`].
#[derive(Clone, Debug)]
pub(crate) struct Chunked {
    pub(crate) seq: Arc<Sequence>,
    pub(crate) tuple: MetaTuple,
}

/// Chunker for a single tree level.
pub(crate) struct LevelChunker {
    store: ValueStore,
    level: u32,
    hasher: RollingHasher,
    pending: Vec<SequenceItem>,
    scratch: Vec<u8>,
    emitted: Vec<Chunked>,
}

impl LevelChunker {
    pub(crate) fn new(store: ValueStore, level: u32) -> Self {
        let hasher = RollingHasher::new(store.chunk_config());
        Self {
            store,
            level,
            hasher,
            pending: Vec::new(),
            scratch: Vec::new(),
            emitted: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, item: SequenceItem) -> ListResult<()> {
        self.scratch.clear();
        item.boundary_bytes(&mut self.scratch);
        self.hasher.hash_bytes(&self.scratch);
        self.pending.push(item);
        if self.hasher.crossed_boundary() {
            self.emit()?;
        }
        Ok(())
    }

    /// True when no items are waiting, i.e. the next item starts a chunk.
    pub(crate) fn is_fresh(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn take_emitted(&mut self) -> Vec<Chunked> {
        mem::take(&mut self.emitted)
    }

    pub(crate) fn take_pending(&mut self) -> Vec<SequenceItem> {
        self.hasher.reset();
        mem::take(&mut self.pending)
    }

    /// Close the trailing chunk and return everything emitted so far.
    pub(crate) fn finish(&mut self) -> ListResult<Vec<Chunked>> {
        if !self.pending.is_empty() {
            self.emit()?;
        }
        Ok(self.take_emitted())
    }

    fn emit(&mut self) -> ListResult<()> {
        let items = mem::take(&mut self.pending);
        let seq = Arc::new(build_node(self.level, items));
        let child = self.store.write_value(&Value::List(seq.clone()))?;
        let tuple = MetaTuple {
            child,
            num_leaves: seq.num_leaves(),
        };
        self.emitted.push(Chunked { seq, tuple });
        self.hasher.reset();
        Ok(())
    }
}

/// Streaming bottom-up tree builder.
///
/// Values are appended in order; chunks closed at one level feed the level
/// above, which is created on demand. [`done`](Self::done) flushes every level
/// and returns the canonical root.
pub struct SequenceChunker {
    store: ValueStore,
    base_level: u32,
    levels: Vec<LevelChunker>,
}

impl SequenceChunker {
    pub fn new(store: ValueStore) -> Self {
        Self::at_level(store, 0)
    }

    /// A chunker whose lowest level holds meta tuples at `level`.
    pub(crate) fn at_level(store: ValueStore, level: u32) -> Self {
        let first = LevelChunker::new(store.clone(), level);
        Self {
            store,
            base_level: level,
            levels: vec![first],
        }
    }

    pub fn append(&mut self, value: Value) -> ListResult<()> {
        self.push_at(0, SequenceItem::Value(value))
    }

    pub(crate) fn append_tuple(&mut self, tuple: MetaTuple) -> ListResult<()> {
        self.push_at(0, SequenceItem::Tuple(tuple))
    }

    fn push_at(&mut self, depth: usize, item: SequenceItem) -> ListResult<()> {
        self.levels[depth].push(item)?;
        let closed = self.levels[depth].take_emitted();
        self.promote(depth, closed)
    }

    fn promote(&mut self, depth: usize, closed: Vec<Chunked>) -> ListResult<()> {
        for chunk in closed {
            if self.levels.len() == depth + 1 {
                let level = self.base_level + depth as u32 + 1;
                self.levels.push(LevelChunker::new(self.store.clone(), level));
            }
            self.push_at(depth + 1, SequenceItem::Tuple(chunk.tuple))?;
        }
        Ok(())
    }

    /// Flush all levels and return the root node.
    ///
    /// The topmost level's open items become the root without being closed
    /// as a chunk; a meta root with a single child is replaced by that child.
    pub fn done(mut self) -> ListResult<Arc<Sequence>> {
        let mut depth = 0;
        loop {
            if depth + 1 == self.levels.len() {
                let level = self.base_level + depth as u32;
                let items = self.levels[depth].take_pending();
                let root = Arc::new(build_node(level, items));
                return collapse(&self.store, root);
            }
            let closed = self.levels[depth].finish()?;
            self.promote(depth, closed)?;
            depth += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ply_store::InMemoryChunkStore;

    fn store() -> ValueStore {
        ValueStore::with_config(
            Arc::new(InMemoryChunkStore::new()),
            ChunkConfig {
                window: 8,
                pattern_bits: 6,
            },
        )
    }

    fn build(values: impl IntoIterator<Item = Value>) -> Arc<Sequence> {
        let mut chunker = SequenceChunker::new(store());
        for v in values {
            chunker.append(v).unwrap();
        }
        chunker.done().unwrap()
    }

    #[test]
    fn hasher_is_deterministic() {
        let config = ChunkConfig::default();
        let mut a = RollingHasher::new(&config);
        let mut b = RollingHasher::new(&config);
        a.hash_bytes(b"the quick brown fox");
        b.hash_bytes(b"the quick brown fox");
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn hasher_depends_only_on_window() {
        let config = ChunkConfig {
            window: 4,
            pattern_bits: 12,
        };
        let mut a = RollingHasher::new(&config);
        let mut b = RollingHasher::new(&config);
        a.hash_bytes(b"xxxxxxxxabcd");
        b.hash_bytes(b"yyabcd");
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn reset_clears_boundary_flag() {
        let mut h = RollingHasher::new(&ChunkConfig {
            window: 4,
            pattern_bits: 0,
        });
        h.hash_byte(1);
        assert!(h.crossed_boundary());
        h.reset();
        assert!(!h.crossed_boundary());
    }

    #[test]
    fn empty_input_is_empty_leaf() {
        let root = build(std::iter::empty());
        assert_eq!(*root, Sequence::empty());
    }

    #[test]
    fn small_input_stays_a_single_leaf() {
        let root = build((0..3).map(Value::Int));
        assert_eq!(root.num_leaves(), 3);
    }

    #[test]
    fn large_input_builds_meta_levels() {
        let root = build((0..2000).map(Value::Int));
        assert!(root.level() >= 1);
        assert_eq!(root.num_leaves(), 2000);
    }

    #[test]
    fn same_items_give_same_root() {
        let a = build((0..500).map(|i| Value::from(format!("item-{i}"))));
        let b = build((0..500).map(|i| Value::from(format!("item-{i}"))));
        assert_eq!(a, b);
    }

    #[test]
    fn root_never_has_a_single_child() {
        for n in [1u64, 10, 100, 1000] {
            let root = build((0..n).map(Value::Uint));
            if let Some(tuples) = root.tuples() {
                assert!(tuples.len() > 1, "n={n}");
            }
        }
    }
}
