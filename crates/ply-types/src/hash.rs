use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Content address of an encoded chunk.
///
/// A `Hash` is the domain-separated BLAKE3 digest of a chunk's bytes.
/// Identical bytes always produce the same `Hash`, so chunks written twice
/// are stored once and every reference can be verified on read.
#[derive(Clone, Copy, PartialEq, Eq, std::hash::Hash, PartialOrd, Ord)]
pub struct Hash([u8; 32]);

impl Hash {
    /// Length in bytes of a hash.
    pub const LEN: usize = 32;

    /// Hash raw chunk bytes.
    pub fn of(data: &[u8]) -> Self {
        ContentHasher::CHUNK.hash(data)
    }

    /// Wrap a pre-computed digest.
    pub const fn from_raw(raw: [u8; 32]) -> Self {
        Self(raw)
    }

    /// The empty hash (all zeros). Used as "no value" in persisted state.
    pub const fn empty() -> Self {
        Self([0u8; 32])
    }

    /// Returns `true` if this is the all-zero hash.
    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// The raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Build from a byte slice that must be exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        if bytes.len() != Self::LEN {
            return Err(TypeError::InvalidLength {
                expected: Self::LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Returns `true` if `s` looks like a full hex hash (64 hex digits).
    pub fn is_hex_hash(s: &str) -> bool {
        s.len() == Self::LEN * 2 && s.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Hash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 32]> for Hash {
    fn from(raw: [u8; 32]) -> Self {
        Self(raw)
    }
}

impl From<Hash> for [u8; 32] {
    fn from(hash: Hash) -> Self {
        hash.0
    }
}

// Persisted ref state is JSON, so hashes travel as hex strings.
impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Domain-separated BLAKE3 content hasher.
///
/// The domain tag is prepended to every hash computation so that hashes
/// produced for different purposes never collide.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for stored chunks (values, sequence nodes, commits).
    pub const CHUNK: Self = Self {
        domain: "ply-chunk-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Hash::from_raw(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected hash.
    pub fn verify(&self, data: &[u8], expected: &Hash) -> bool {
        self.hash(data) == *expected
    }
}
