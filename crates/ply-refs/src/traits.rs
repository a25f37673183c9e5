//! The [`RefStore`] trait defining the reference storage interface.

use ply_types::Hash;

use crate::error::RefResult;
use crate::types::{Ref, RepoState, BRANCH_PREFIX, TAG_PREFIX};

/// Storage backend for named refs and the repo state.
///
/// Implementations must be thread-safe (`Send + Sync`) and apply each call
/// atomically. Names are canonical (`refs/heads/*`, `refs/tags/*`).
pub trait RefStore: Send + Sync {
    /// Read a ref by its canonical name. `Ok(None)` if it does not exist.
    fn read_ref(&self, name: &str) -> RefResult<Option<Ref>>;

    /// Create or update a ref. Fails with `TagImmutable` when overwriting a
    /// tag.
    fn write_ref(&self, name: &str, reference: &Ref) -> RefResult<()>;

    /// Write `reference` only if the ref currently targets `expected`
    /// (`None`: only if it does not exist).
    fn compare_and_set_ref(
        &self,
        name: &str,
        expected: Option<Hash>,
        reference: &Ref,
    ) -> RefResult<()>;

    /// Delete a ref. Returns whether it existed.
    fn delete_ref(&self, name: &str) -> RefResult<bool>;

    /// All refs whose canonical name starts with `prefix`, sorted by name.
    fn list_refs(&self, prefix: &str) -> RefResult<Vec<(String, Ref)>>;

    /// The repo state, if initialised.
    fn repo_state(&self) -> RefResult<Option<RepoState>>;

    /// Set the initial repo state. Fails with `AlreadyExists` if one is set.
    fn init_repo_state(&self, state: RepoState) -> RefResult<()>;

    /// Replace the repo state if it still equals `expected`, otherwise fail
    /// with `StaleState` and change nothing.
    fn update_repo_state(&self, expected: &RepoState, new: RepoState) -> RefResult<()>;

    fn branches(&self) -> RefResult<Vec<(String, Ref)>> {
        self.list_refs(BRANCH_PREFIX)
    }

    fn tags(&self) -> RefResult<Vec<(String, Ref)>> {
        self.list_refs(TAG_PREFIX)
    }
}
