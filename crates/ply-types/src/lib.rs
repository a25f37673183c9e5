//! Foundation types for ply.
//!
//! Every chunk, value, commit and root in ply is addressed by the BLAKE3 hash
//! of its encoded bytes. This crate owns that identifier and the hasher that
//! produces it; every other ply crate depends on `ply-types`.
//!
//! # Key Types
//!
//! - [`Hash`]: 32-byte content address of an encoded chunk
//! - [`ContentHasher`]: domain-separated BLAKE3 hasher

pub mod error;
pub mod hash;

pub use error::TypeError;
pub use hash::{ContentHasher, Hash};
