use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ply_types::Hash;
use tracing::debug;

use crate::chunk::Chunk;
use crate::error::{StoreError, StoreResult};
use crate::traits::ChunkStore;

/// zstd level used for chunk files.
const COMPRESSION_LEVEL: i32 = 3;

/// File-backed chunk store.
///
/// Each chunk lives in its own zstd-compressed file at
/// `<root>/<first 2 hex chars>/<remaining 62 hex chars>`. Writes go to a
/// temporary file in the same directory and are renamed into place, so a
/// crash never leaves a half-written chunk under its final name.
#[derive(Debug)]
pub struct FileChunkStore {
    root: PathBuf,
}

impl FileChunkStore {
    /// Open (or create) a chunk store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn chunk_path(&self, hash: &Hash) -> PathBuf {
        let hex = hash.to_hex();
        self.root.join(&hex[..2]).join(&hex[2..])
    }
}

impl ChunkStore for FileChunkStore {
    fn get(&self, hash: &Hash) -> StoreResult<Option<Chunk>> {
        let path = self.chunk_path(hash);
        let compressed = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let data = zstd::decode_all(compressed.as_slice()).map_err(|e| {
            StoreError::CorruptChunk {
                hash: *hash,
                reason: format!("decompression failed: {e}"),
            }
        })?;
        let chunk = Chunk::with_hash(*hash, data);
        chunk.verify().map_err(|_| StoreError::CorruptChunk {
            hash: *hash,
            reason: "content does not match hash".into(),
        })?;
        Ok(Some(chunk))
    }

    fn put(&self, chunk: Chunk) -> StoreResult<()> {
        chunk.verify()?;
        let path = self.chunk_path(&chunk.hash());
        if path.exists() {
            return Ok(());
        }
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::Backend(format!("invalid chunk path {}", path.display())))?;
        fs::create_dir_all(dir)?;

        let compressed = zstd::encode_all(chunk.data(), COMPRESSION_LEVEL)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&compressed)?;
        tmp.as_file().sync_data()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(
            hash = %chunk.hash().short_hex(),
            raw = chunk.len(),
            stored = compressed.len(),
            "wrote chunk file"
        );
        Ok(())
    }

    fn has(&self, hash: &Hash) -> StoreResult<bool> {
        Ok(self.chunk_path(hash).is_file())
    }
}
