//! Immutable values and typed refs for ply.
//!
//! A [`Value`] is an immutable, self-describing datum with a deterministic
//! binary encoding. Its hash is the hash of that encoding, so two values that
//! encode identically are the same value and share storage. A [`Ref`] is a
//! typed, height-annotated pointer to a value that lives in the chunk store;
//! it is resolved on demand through a [`ValueStore`] capability rather than
//! through any ambient global store.
//!
//! # Key Types
//!
//! - [`Value`] / [`Struct`]: the value model
//! - [`Type`]: type descriptors carried by refs
//! - [`Ref`]: `{target hash, target type, height}` forward pointer
//! - [`Sequence`] / [`MetaTuple`]: prolly-tree nodes (leaf or meta)
//! - [`ValueStore`] / [`ChunkConfig`]: read/write capability over a chunk store
//!
//! # Invariants
//!
//! - `decode(encode(v)) == v` for every value.
//! - A ref's height is one more than the highest ref its target contains, so
//!   refs only ever point at strictly lower-height content.

pub mod codec;
pub mod error;
pub mod reference;
pub mod sequence;
pub mod store;
pub mod types;
pub mod value;

pub use codec::{decode, encode};
pub use error::{ValueError, ValueResult};
pub use reference::Ref;
pub use sequence::{MetaTuple, Sequence};
pub use store::{ChunkConfig, ValueStore};
pub use types::Type;
pub use value::{Struct, Value};
