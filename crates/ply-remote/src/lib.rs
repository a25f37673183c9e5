//! Remote chunk transfer for ply.
//!
//! A small request/response protocol moves chunks between a client and a
//! server. Messages are bincode-encoded and framed with a length, a type tag
//! and a CRC32 of the payload. The transport is a trait, so the same client
//! can run over an in-process loopback or any byte pipe; the rest of ply
//! only ever sees a [`ChunkStore`](ply_store::ChunkStore).
//!
//! # Key Types
//!
//! - [`ChunkMessage`]: protocol messages
//! - [`ChunkCodec`] / [`RemoteConfig`]: framing and size limits
//! - [`ChunkService`]: server-side dispatcher over a chunk store
//! - [`ChunkTransport`] / [`LoopbackTransport`]: request delivery
//! - [`RemoteChunkStore`]: client-side `ChunkStore`

pub mod codec;
pub mod error;
pub mod message;
pub mod service;
pub mod store;
pub mod transport;

pub use codec::{ChunkCodec, RemoteConfig, HEADER_LEN};
pub use error::{RemoteError, RemoteResult};
pub use message::{codes, ChunkMessage, DEFAULT_MAX_MESSAGE_SIZE};
pub use service::ChunkService;
pub use store::RemoteChunkStore;
pub use transport::{ChunkTransport, LoopbackTransport};
