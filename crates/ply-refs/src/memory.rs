//! In-memory reference store for tests and ephemeral repositories.

use std::sync::RwLock;

use ply_types::Hash;

use crate::error::RefResult;
use crate::table::RefTable;
use crate::traits::RefStore;
use crate::types::{Ref, RepoState};

/// An in-memory implementation of [`RefStore`]. Data is lost when the store
/// is dropped.
#[derive(Debug, Default)]
pub struct InMemoryRefStore {
    table: RwLock<RefTable>,
}

impl InMemoryRefStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RefStore for InMemoryRefStore {
    fn read_ref(&self, name: &str) -> RefResult<Option<Ref>> {
        Ok(self.table.read().expect("lock poisoned").read(name))
    }

    fn write_ref(&self, name: &str, reference: &Ref) -> RefResult<()> {
        self.table.write().expect("lock poisoned").write(name, reference)
    }

    fn compare_and_set_ref(
        &self,
        name: &str,
        expected: Option<Hash>,
        reference: &Ref,
    ) -> RefResult<()> {
        self.table
            .write()
            .expect("lock poisoned")
            .compare_and_set(name, expected, reference)
    }

    fn delete_ref(&self, name: &str) -> RefResult<bool> {
        self.table.write().expect("lock poisoned").delete(name)
    }

    fn list_refs(&self, prefix: &str) -> RefResult<Vec<(String, Ref)>> {
        Ok(self.table.read().expect("lock poisoned").list(prefix))
    }

    fn repo_state(&self) -> RefResult<Option<RepoState>> {
        Ok(self.table.read().expect("lock poisoned").state.clone())
    }

    fn init_repo_state(&self, state: RepoState) -> RefResult<()> {
        self.table.write().expect("lock poisoned").init_state(state)
    }

    fn update_repo_state(&self, expected: &RepoState, new: RepoState) -> RefResult<()> {
        self.table
            .write()
            .expect("lock poisoned")
            .update_state(expected, new)
    }
}
