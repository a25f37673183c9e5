use serde::{Deserialize, Serialize};

use ply_types::Hash;

use crate::error::{StoreError, StoreResult};

/// An immutable, content-addressed unit of storage.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    hash: Hash,
    data: Vec<u8>,
}

impl Chunk {
    /// Create a chunk, computing its hash from the data.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            hash: Hash::of(&data),
            data,
        }
    }

    /// Pair bytes with a claimed hash without checking it.
    ///
    /// Stores call [`Chunk::verify`] before trusting such a chunk.
    pub fn with_hash(hash: Hash, data: Vec<u8>) -> Self {
        Self { hash, data }
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check that the claimed hash matches the bytes.
    pub fn verify(&self) -> StoreResult<()> {
        let computed = Hash::of(&self.data);
        if computed != self.hash {
            return Err(StoreError::HashMismatch {
                expected: self.hash,
                computed,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("hash", &self.hash)
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_computes_hash() {
        let chunk = Chunk::new(b"abc".to_vec());
        assert_eq!(chunk.hash(), Hash::of(b"abc"));
        assert_eq!(chunk.len(), 3);
        assert!(chunk.verify().is_ok());
    }

    #[test]
    fn empty_chunk_is_representable() {
        let chunk = Chunk::new(Vec::new());
        assert!(chunk.is_empty());
        assert!(chunk.verify().is_ok());
    }

    #[test]
    fn verify_detects_tampering() {
        let chunk = Chunk::with_hash(Hash::of(b"abc"), b"abd".to_vec());
        assert!(matches!(
            chunk.verify(),
            Err(StoreError::HashMismatch { .. })
        ));
    }
}
