//! File-backed reference store.
//!
//! Refs live in `<root>/refs.json` and the repo state in
//! `<root>/repo_state.json`. Every mutation is applied to a copy of the
//! current table, written to a temporary file and renamed over the old one;
//! the in-memory table only changes once the rename succeeded.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use ply_types::Hash;

use crate::error::{RefError, RefResult};
use crate::table::RefTable;
use crate::traits::RefStore;
use crate::types::{Ref, RepoState};

const REFS_FILE: &str = "refs.json";
const STATE_FILE: &str = "repo_state.json";

/// A [`RefStore`] persisted as JSON files under one directory.
#[derive(Debug)]
pub struct FileRefStore {
    root: PathBuf,
    table: Mutex<RefTable>,
}

impl FileRefStore {
    /// Open (or create) a ref store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> RefResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let refs: BTreeMap<String, Ref> =
            read_json(&root.join(REFS_FILE))?.unwrap_or_default();
        let state: Option<RepoState> = read_json(&root.join(STATE_FILE))?;
        debug!(root = %root.display(), refs = refs.len(), "opened ref store");
        Ok(Self {
            root,
            table: Mutex::new(RefTable { refs, state }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Apply `f` to a copy of the table, persist what changed, then commit
    /// the copy.
    fn mutate<T>(&self, f: impl FnOnce(&mut RefTable) -> RefResult<T>) -> RefResult<T> {
        let mut table = self.table.lock().expect("lock poisoned");
        let mut next = table.clone();
        let out = f(&mut next)?;
        if next.refs != table.refs {
            write_json(&self.root, REFS_FILE, &next.refs)?;
        }
        if next.state != table.state {
            write_json(&self.root, STATE_FILE, &next.state)?;
        }
        *table = next;
        Ok(out)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> RefResult<Option<T>> {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| RefError::Serialization(format!("{}: {e}", path.display()))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_json<T: Serialize>(dir: &Path, file: &str, value: &T) -> RefResult<()> {
    let bytes =
        serde_json::to_vec_pretty(value).map_err(|e| RefError::Serialization(e.to_string()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_data()?;
    tmp.persist(dir.join(file)).map_err(|e| RefError::Io(e.error))?;
    Ok(())
}

impl RefStore for FileRefStore {
    fn read_ref(&self, name: &str) -> RefResult<Option<Ref>> {
        Ok(self.table.lock().expect("lock poisoned").read(name))
    }

    fn write_ref(&self, name: &str, reference: &Ref) -> RefResult<()> {
        self.mutate(|t| t.write(name, reference))
    }

    fn compare_and_set_ref(
        &self,
        name: &str,
        expected: Option<Hash>,
        reference: &Ref,
    ) -> RefResult<()> {
        self.mutate(|t| t.compare_and_set(name, expected, reference))
    }

    fn delete_ref(&self, name: &str) -> RefResult<bool> {
        self.mutate(|t| t.delete(name))
    }

    fn list_refs(&self, prefix: &str) -> RefResult<Vec<(String, Ref)>> {
        Ok(self.table.lock().expect("lock poisoned").list(prefix))
    }

    fn repo_state(&self) -> RefResult<Option<RepoState>> {
        Ok(self.table.lock().expect("lock poisoned").state.clone())
    }

    fn init_repo_state(&self, state: RepoState) -> RefResult<()> {
        self.mutate(|t| t.init_state(state))
    }

    fn update_repo_state(&self, expected: &RepoState, new: RepoState) -> RefResult<()> {
        self.mutate(|t| t.update_state(expected, new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u8) -> Hash {
        Hash::from_raw([n; 32])
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileRefStore::open(dir.path()).unwrap();
            store.write_ref("refs/heads/main", &Ref::branch("main", h(1))).unwrap();
            store.write_ref("refs/tags/v1", &Ref::tag("v1", h(2))).unwrap();
            store.init_repo_state(RepoState::new("main", h(3))).unwrap();
        }
        let store = FileRefStore::open(dir.path()).unwrap();
        assert_eq!(
            store.read_ref("refs/heads/main").unwrap().unwrap().target_hash(),
            h(1)
        );
        assert_eq!(store.tags().unwrap().len(), 1);
        assert_eq!(store.repo_state().unwrap().unwrap().working, h(3));
    }

    #[test]
    fn failed_update_changes_nothing_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRefStore::open(dir.path()).unwrap();
        let initial = RepoState::new("main", h(1));
        store.init_repo_state(initial.clone()).unwrap();
        let before = fs::read(dir.path().join(STATE_FILE)).unwrap();

        let stale = RepoState::new("main", h(9));
        assert!(matches!(
            store.update_repo_state(&stale, RepoState::new("main", h(5))),
            Err(RefError::StaleState)
        ));
        assert_eq!(fs::read(dir.path().join(STATE_FILE)).unwrap(), before);
    }

    #[test]
    fn corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(REFS_FILE), b"{not json").unwrap();
        assert!(matches!(
            FileRefStore::open(dir.path()),
            Err(RefError::Serialization(_))
        ));
    }
}
