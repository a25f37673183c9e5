//! Content-addressed chunk storage for ply.
//!
//! Everything ply persists (value encodings, prolly-tree nodes, root values
//! and commits) ends up as an immutable [`Chunk`] keyed by the [`Hash`] of
//! its bytes. The store never interprets chunk contents; it is a pure key-value
//! store with batch variants for throughput.
//!
//! # Storage Backends
//!
//! All backends implement the [`ChunkStore`] trait:
//!
//! - [`InMemoryChunkStore`] -- `HashMap`-based store for tests and embedding
//! - [`FileChunkStore`] -- one zstd-compressed file per chunk under a root directory
//!
//! # Design Rules
//!
//! 1. Chunks are immutable once written (content-addressing guarantees this).
//! 2. `put` verifies that a chunk's hash matches its bytes before storing it.
//! 3. Concurrent reads are always safe.
//! 4. All I/O errors are propagated, never silently ignored.
//!
//! [`Hash`]: ply_types::Hash

pub mod chunk;
pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use chunk::Chunk;
pub use error::{StoreError, StoreResult};
pub use file::FileChunkStore;
pub use memory::InMemoryChunkStore;
pub use traits::ChunkStore;
