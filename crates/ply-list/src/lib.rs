//! Prolly-tree lists for ply.
//!
//! A [`List`] is an ordered collection stored as a probabilistically balanced
//! tree. Leaf boundaries are chosen by a rolling hash over the encoded items
//! ([`RollingHasher`]), so the shape of the tree depends only on its contents:
//! building the same items twice gives the same root, and an edit near
//! position *k* re-chunks only the few nodes around *k*. Unchanged subtrees
//! are shared between versions.
//!
//! # Key Types
//!
//! - [`List`]: immutable list handle: point access, iteration, edits
//! - [`SequenceChunker`] / [`ListBuilder`]: bottom-up tree construction
//! - [`SequenceCursor`]: root-to-leaf path used for O(depth) navigation
//! - [`IterConfig`] / [`ordered_range_map`]: ordered parallel iteration
//!   with adaptive batch sizing
//!
//! # Invariants
//!
//! - Every edit returns the same tree (same root hash) as building the
//!   edited items from scratch.
//! - Nodes are immutable and shared through `Arc`; no locking is needed to
//!   read a list from many threads.

pub mod builder;
pub mod chunker;
pub mod cursor;
pub mod error;
pub mod list;
pub mod node;
pub mod parallel;
mod splice;

pub use builder::ListBuilder;
pub use chunker::{RollingHasher, SequenceChunker};
pub use cursor::SequenceCursor;
pub use error::{ListError, ListResult};
pub use list::{List, ListIter};
pub use node::load_node;
pub use parallel::{ordered_range_map, BatchEstimator, IterConfig};
