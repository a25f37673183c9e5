//! The repo environment: one session's head, working and staged roots.

use tracing::{debug, info};

use ply_refs::RepoState;
use ply_types::Hash;

use crate::commit::{Commit, CommitMeta};
use crate::commit_spec::CommitSpec;
use crate::database::Database;
use crate::error::{DbError, DbResult};
use crate::root::RootValue;

/// Label used in `RootUnreadable` errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RootKind {
    Head,
    Working,
    Staged,
}

impl RootKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RootKind::Head => "head",
            RootKind::Working => "working",
            RootKind::Staged => "staged",
        }
    }
}

/// A session over a [`Database`].
///
/// Every pointer move is a compare-and-swap of the whole [`RepoState`], so a
/// concurrent writer makes the later call fail with a stale-state error
/// instead of silently losing an update.
#[derive(Clone)]
pub struct RepoEnv {
    db: Database,
}

impl RepoEnv {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create an empty initial commit on `branch` and check it out.
    pub fn init(db: Database, branch: &str, meta: CommitMeta) -> DbResult<Self> {
        let root = RootValue::empty();
        let commit = db.commit(&root, &[], meta)?;
        db.create_branch(branch, &commit)?;
        db.refs()
            .init_repo_state(RepoState::new(branch, root.hash()))?;
        info!(branch, commit = %commit.hash_of().short_hex(), "initialised repository");
        Ok(Self { db })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn state(&self) -> DbResult<RepoState> {
        self.db.refs().repo_state()?.ok_or(DbError::NotInitialised)
    }

    pub fn current_branch(&self) -> DbResult<String> {
        Ok(self.state()?.head)
    }

    /// Resolve a spec with `HEAD` bound to the current branch.
    pub fn resolve(&self, spec: &CommitSpec) -> DbResult<Commit> {
        let state = self.state()?;
        self.db.resolve(spec, Some(&state.head))
    }

    pub fn head_commit(&self) -> DbResult<Commit> {
        self.resolve(&CommitSpec::head())
    }

    pub fn head_root(&self) -> DbResult<RootValue> {
        let head = self.head_commit()?;
        let hash = head.root().target_hash();
        head.root_value(self.db.values())
            .map_err(|e| unreadable(RootKind::Head, hash, e))
    }

    pub fn working_root(&self) -> DbResult<RootValue> {
        self.load_root(RootKind::Working, self.state()?.working)
    }

    pub fn staged_root(&self) -> DbResult<RootValue> {
        self.load_root(RootKind::Staged, self.state()?.staged)
    }

    /// Load a root by hash, labelling failures with `kind`.
    pub fn load_root(&self, kind: RootKind, hash: Hash) -> DbResult<RootValue> {
        self.db
            .read_root_value(&hash)
            .map_err(|e| unreadable(kind, hash, e))
    }

    /// Write `root` and make it the working root. Returns its hash.
    pub fn update_working_root(&self, root: &RootValue) -> DbResult<Hash> {
        let current = self.state()?;
        let hash = self.db.write_root_value(root)?;
        let next = RepoState {
            working: hash,
            ..current.clone()
        };
        self.update_state(&current, next)?;
        Ok(hash)
    }

    /// Write `root` and make it the staged root. Returns its hash.
    pub fn update_staged_root(&self, root: &RootValue) -> DbResult<Hash> {
        let current = self.state()?;
        let hash = self.db.write_root_value(root)?;
        let next = RepoState {
            staged: hash,
            ..current.clone()
        };
        self.update_state(&current, next)?;
        Ok(hash)
    }

    /// Write both roots, then move both pointers in one swap against
    /// `expected`. Nothing moves if either write fails.
    pub fn update_roots(
        &self,
        expected: &RepoState,
        working: &RootValue,
        staged: &RootValue,
    ) -> DbResult<RepoState> {
        let working = self.db.write_root_value(working)?;
        let staged = self.db.write_root_value(staged)?;
        let next = RepoState {
            working,
            staged,
            ..expected.clone()
        };
        self.update_state(expected, next.clone())?;
        Ok(next)
    }

    pub fn update_state(&self, expected: &RepoState, next: RepoState) -> DbResult<()> {
        self.db.refs().update_repo_state(expected, next)?;
        debug!("repo state swapped");
        Ok(())
    }
}

fn unreadable(kind: RootKind, hash: Hash, source: DbError) -> DbError {
    DbError::RootUnreadable {
        root: kind.as_str().to_string(),
        hash,
        source: Box::new(source),
    }
}
