use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use ply_db::{
    Commit, CommitMeta, CommitSpec, Database, RepoEnv, RootValue, Schema, Table, Tag,
};
use ply_diff::DiffConfig;
use ply_merge::{changed_rows, changed_tables, MergeOutcome};
use ply_refs::{RefStore, RepoState};
use ply_store::ChunkStore;
use ply_value::{ChunkConfig, ValueStore};

use crate::error::{SdkError, SdkResult};
use crate::status::{RowChange, Status};

/// Repository settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    /// Branch created and checked out by [`Repository::init`].
    pub default_branch: String,
    pub chunking: ChunkConfig,
    pub diff: DiffConfig,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            default_branch: "main".into(),
            chunking: ChunkConfig::default(),
            diff: DiffConfig::default(),
        }
    }
}

/// High-level repository API.
pub struct Repository {
    env: RepoEnv,
    config: RepoConfig,
}

impl Repository {
    /// Create a repository with an empty initial commit on the default
    /// branch.
    pub fn init(
        chunks: Arc<dyn ChunkStore>,
        refs: Arc<dyn RefStore>,
        config: RepoConfig,
    ) -> SdkResult<Self> {
        let db = Database::new(ValueStore::with_config(chunks, config.chunking.clone()), refs);
        let meta = CommitMeta::new("ply", "ply@localhost", "Initialize data repository");
        let env = RepoEnv::init(db, &config.default_branch, meta)?;
        Ok(Self { env, config })
    }

    /// Open a repository that was initialised earlier over the same stores.
    pub fn open(
        chunks: Arc<dyn ChunkStore>,
        refs: Arc<dyn RefStore>,
        config: RepoConfig,
    ) -> SdkResult<Self> {
        let db = Database::new(ValueStore::with_config(chunks, config.chunking.clone()), refs);
        let env = RepoEnv::new(db);
        env.state()?;
        Ok(Self { env, config })
    }

    // ---- Accessors ----

    pub fn env(&self) -> &RepoEnv {
        &self.env
    }

    pub fn db(&self) -> &Database {
        self.env.db()
    }

    pub fn values(&self) -> &ValueStore {
        self.env.db().values()
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    // ---- Tables in the working set ----

    /// An empty table in this repository's store.
    pub fn new_table(&self, schema: Schema) -> Table {
        Table::new(self.values().clone(), schema)
    }

    pub fn working_table(&self, name: &str) -> SdkResult<Table> {
        self.env
            .working_root()?
            .get_table(self.values(), name)?
            .ok_or_else(|| SdkError::TableNotFound(name.to_string()))
    }

    /// Write `table` into the working root under `name`.
    pub fn put_table(&self, name: &str, table: &Table) -> SdkResult<()> {
        let working = self.env.working_root()?.put_table(self.values(), name, table)?;
        self.env.update_working_root(&working)?;
        Ok(())
    }

    pub fn drop_table(&self, name: &str) -> SdkResult<()> {
        let working = self.env.working_root()?;
        if !working.has_table(name) {
            return Err(SdkError::TableNotFound(name.to_string()));
        }
        self.env.update_working_root(&working.remove_tables(&[name]))?;
        Ok(())
    }

    pub fn working_root(&self) -> SdkResult<RootValue> {
        Ok(self.env.working_root()?)
    }

    pub fn staged_root(&self) -> SdkResult<RootValue> {
        Ok(self.env.staged_root()?)
    }

    // ---- Staging ----

    pub fn stage_tables(&self, names: &[&str]) -> SdkResult<()> {
        ply_stage::stage_tables(&self.env, names)?;
        Ok(())
    }

    pub fn stage_all(&self) -> SdkResult<()> {
        ply_stage::stage_all_tables(&self.env)?;
        Ok(())
    }

    pub fn unstage_tables(&self, names: &[&str]) -> SdkResult<()> {
        ply_stage::unstage_tables(&self.env, names)?;
        Ok(())
    }

    pub fn status(&self) -> SdkResult<Status> {
        let state = self.env.state()?;
        let head = self.env.head_root()?;
        let staged = self.env.staged_root()?;
        let working = self.env.working_root()?;
        Ok(Status {
            branch: state.head,
            staged: changed_tables(&head, &staged).into_iter().collect(),
            unstaged: changed_tables(&staged, &working).into_iter().collect(),
            merging: state.merge.map(|m| m.source_ref),
        })
    }

    // ---- Commits ----

    /// Commit the staged root to the checked-out branch.
    ///
    /// While a merge is in progress the merged commit becomes the second
    /// parent and the merge is concluded.
    pub fn commit(&self, meta: CommitMeta) -> SdkResult<Commit> {
        let state = self.env.state()?;
        let staged = self.env.staged_root()?;
        let conflicted = self.tables_in_conflict(&staged)?;
        if !conflicted.is_empty() {
            return Err(SdkError::UnresolvedConflicts { tables: conflicted });
        }

        let db = self.env.db();
        let head = self.env.head_commit()?;
        if staged.hash() == head.root().target_hash() && !state.is_merging() {
            return Err(SdkError::NothingToCommit);
        }

        let mut parents = vec![head];
        if let Some(merge) = &state.merge {
            parents.push(db.read_commit(&merge.commit)?);
        }
        let commit = db.commit(&staged, &parents, meta)?;
        db.fast_forward(&state.head, &commit)?;
        if state.is_merging() {
            let concluded = RepoState {
                merge: None,
                ..state.clone()
            };
            if let Err(e) = self.env.update_state(&state, concluded) {
                db.rewind_branch(&state.head, &commit, &parents[0])?;
                return Err(e.into());
            }
        }
        info!(
            branch = %state.head,
            commit = %commit.hash_of().short_hex(),
            parents = parents.len(),
            "committed"
        );
        Ok(commit)
    }

    fn tables_in_conflict(&self, root: &RootValue) -> SdkResult<Vec<String>> {
        let mut out = Vec::new();
        for name in root.table_names() {
            let Some(table) = root.get_table(self.values(), &name)? else {
                continue;
            };
            if table.num_rows_in_conflict() > 0 {
                out.push(name);
            }
        }
        Ok(out)
    }

    /// Resolve a revision such as `main`, `HEAD~2` or a commit hash.
    pub fn resolve(&self, spec: &str) -> SdkResult<Commit> {
        Ok(self.env.resolve(&CommitSpec::parse(spec)?)?)
    }

    pub fn root_at(&self, spec: &str) -> SdkResult<RootValue> {
        Ok(self.resolve(spec)?.root_value(self.values())?)
    }

    /// Up to `limit` commits following first parents from `spec`, newest
    /// first.
    pub fn log(&self, spec: &str, limit: usize) -> SdkResult<Vec<Commit>> {
        let mut out = Vec::new();
        let mut next = Some(self.resolve(spec)?);
        while let Some(commit) = next.take() {
            if out.len() >= limit {
                break;
            }
            next = commit.parent_commits(self.values())?.into_iter().next();
            out.push(commit);
        }
        Ok(out)
    }

    // ---- Branches and tags ----

    pub fn current_branch(&self) -> SdkResult<String> {
        Ok(self.env.current_branch()?)
    }

    pub fn branches(&self) -> SdkResult<Vec<String>> {
        Ok(self.env.db().branch_names()?)
    }

    /// Create a branch at the commit `spec` names.
    pub fn create_branch(&self, name: &str, spec: &str) -> SdkResult<Commit> {
        let commit = self.resolve(spec)?;
        self.env.db().create_branch(name, &commit)?;
        Ok(commit)
    }

    pub fn tag(&self, name: &str, spec: &str, meta: CommitMeta) -> SdkResult<Tag> {
        let commit = self.resolve(spec)?;
        Ok(self.env.db().create_tag(name, &commit, meta)?)
    }

    /// Switch to another branch. Working and staged roots are reset to the
    /// branch's head, so both must be clean.
    pub fn checkout(&self, name: &str) -> SdkResult<()> {
        let state = self.env.state()?;
        if state.is_merging() {
            return Err(SdkError::MergeInProgress);
        }
        let target = self
            .env
            .db()
            .branch_head(name)?
            .ok_or_else(|| SdkError::BranchNotFound(name.to_string()))?;

        let head = self.env.head_root()?;
        let mut dirty = changed_tables(&head, &self.env.working_root()?);
        dirty.extend(changed_tables(&head, &self.env.staged_root()?));
        if !dirty.is_empty() {
            return Err(SdkError::DirtyWorkingSet {
                tables: dirty.into_iter().collect(),
            });
        }

        let root = target.root().target_hash();
        self.env.update_state(
            &state,
            RepoState {
                head: name.to_string(),
                working: root,
                staged: root,
                merge: None,
            },
        )?;
        info!(from = %state.head, to = name, "checked out branch");
        Ok(())
    }

    // ---- Merging ----

    pub fn merge(&self, spec: &str) -> SdkResult<MergeOutcome> {
        Ok(ply_merge::merge(&self.env, &CommitSpec::parse(spec)?)?)
    }

    pub fn abort_merge(&self) -> SdkResult<()> {
        ply_merge::abort_merge(&self.env)?;
        Ok(())
    }

    // ---- Row diffs ----

    /// Rows of `table` that differ between two roots, in key order.
    ///
    /// A table missing from one side counts as empty there.
    pub fn diff_table_rows(
        &self,
        table: &str,
        from: &RootValue,
        to: &RootValue,
    ) -> SdkResult<Vec<RowChange>> {
        let store = self.values();
        let (before, after) = match (from.get_table(store, table)?, to.get_table(store, table)?) {
            (None, None) => return Err(SdkError::TableNotFound(table.to_string())),
            (Some(b), Some(a)) => (b, a),
            (Some(b), None) => {
                let empty = self.new_table(b.schema().clone());
                (b, empty)
            }
            (None, Some(a)) => (self.new_table(a.schema().clone()), a),
        };

        let mut out = Vec::new();
        for (key, row) in changed_rows(&before, &after, &self.config.diff)? {
            let old = before.get_row(&key)?;
            if old != row {
                out.push(RowChange {
                    key,
                    before: old,
                    after: row,
                });
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::status::RowChangeKind;
    use ply_db::{Column, ColumnKind};
    use ply_refs::{FileRefStore, InMemoryRefStore, Ref as NamedRef, RefError, RefResult};
    use ply_remote::{ChunkCodec, ChunkService, LoopbackTransport, RemoteChunkStore, RemoteConfig};
    use ply_store::{FileChunkStore, InMemoryChunkStore};
    use ply_types::Hash;
    use ply_value::Value;

    /// Ref store whose repo-state swaps fail as stale once armed.
    #[derive(Default)]
    struct RacingRefStore {
        inner: InMemoryRefStore,
        stale: AtomicBool,
    }

    impl RefStore for RacingRefStore {
        fn read_ref(&self, name: &str) -> RefResult<Option<NamedRef>> {
            self.inner.read_ref(name)
        }

        fn write_ref(&self, name: &str, reference: &NamedRef) -> RefResult<()> {
            self.inner.write_ref(name, reference)
        }

        fn compare_and_set_ref(
            &self,
            name: &str,
            expected: Option<Hash>,
            reference: &NamedRef,
        ) -> RefResult<()> {
            self.inner.compare_and_set_ref(name, expected, reference)
        }

        fn delete_ref(&self, name: &str) -> RefResult<bool> {
            self.inner.delete_ref(name)
        }

        fn list_refs(&self, prefix: &str) -> RefResult<Vec<(String, NamedRef)>> {
            self.inner.list_refs(prefix)
        }

        fn repo_state(&self) -> RefResult<Option<RepoState>> {
            self.inner.repo_state()
        }

        fn init_repo_state(&self, state: RepoState) -> RefResult<()> {
            self.inner.init_repo_state(state)
        }

        fn update_repo_state(&self, expected: &RepoState, new: RepoState) -> RefResult<()> {
            if self.stale.load(Ordering::SeqCst) {
                return Err(RefError::StaleState);
            }
            self.inner.update_repo_state(expected, new)
        }
    }

    fn repo() -> Repository {
        Repository::init(
            Arc::new(InMemoryChunkStore::new()),
            Arc::new(InMemoryRefStore::new()),
            RepoConfig::default(),
        )
        .unwrap()
    }

    fn meta(msg: &str) -> CommitMeta {
        CommitMeta::new("Ada", "ada@example.com", msg)
    }

    fn people(repo: &Repository, rows: &[(i64, &str)]) -> Table {
        Table::from_rows(
            repo.values().clone(),
            Schema::new(vec![
                Column::key("id", ColumnKind::Int),
                Column::new("name", ColumnKind::String),
            ]),
            rows.iter().map(|(k, v)| (Value::Int(*k), Value::from(*v))),
        )
        .unwrap()
    }

    fn commit_people(repo: &Repository, rows: &[(i64, &str)], msg: &str) -> Commit {
        repo.put_table("people", &people(repo, rows)).unwrap();
        repo.stage_all().unwrap();
        repo.commit(meta(msg)).unwrap()
    }

    // ---- init / open ----

    #[test]
    fn init_checks_out_default_branch() {
        let repo = repo();
        assert_eq!(repo.current_branch().unwrap(), "main");
        assert_eq!(repo.branches().unwrap(), vec!["main"]);
        assert!(repo.status().unwrap().is_clean());
        assert_eq!(repo.log("HEAD", 10).unwrap().len(), 1);
    }

    #[test]
    fn reopen_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let open = || {
            (
                Arc::new(FileChunkStore::open(dir.path().join("chunks")).unwrap()),
                Arc::new(FileRefStore::open(dir.path().join("refs")).unwrap()),
            )
        };

        let (chunks, refs) = open();
        let repo = Repository::init(chunks, refs, RepoConfig::default()).unwrap();
        let c1 = commit_people(&repo, &[(1, "ada")], "first");
        drop(repo);

        let (chunks, refs) = open();
        let repo = Repository::open(chunks, refs, RepoConfig::default()).unwrap();
        assert_eq!(repo.resolve("main").unwrap(), c1);
        let t = repo.working_table("people").unwrap();
        assert_eq!(t.get_row(&Value::Int(1)).unwrap(), Some(Value::from("ada")));
    }

    #[test]
    fn open_needs_an_initialised_repo() {
        let err = Repository::open(
            Arc::new(InMemoryChunkStore::new()),
            Arc::new(InMemoryRefStore::new()),
            RepoConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SdkError::Db(ply_db::DbError::NotInitialised)));
    }

    // ---- commits ----

    #[test]
    fn commit_takes_staged_not_working() {
        let repo = repo();
        let c1 = commit_people(&repo, &[(1, "ada"), (2, "bob")], "people");
        assert_eq!(c1.parents().len(), 1);

        repo.put_table("people", &people(&repo, &[(1, "ada")])).unwrap();
        let status = repo.status().unwrap();
        assert!(status.staged.is_empty());
        assert_eq!(status.unstaged, vec!["people"]);
        assert!(matches!(repo.commit(meta("nothing")), Err(SdkError::NothingToCommit)));

        let head = repo.root_at("HEAD").unwrap();
        let t = head.get_table(repo.values(), "people").unwrap().unwrap();
        assert_eq!(t.row_count(), 2);
    }

    #[test]
    fn log_follows_first_parents() {
        let repo = repo();
        commit_people(&repo, &[(1, "a")], "one");
        commit_people(&repo, &[(1, "b")], "two");
        let c3 = commit_people(&repo, &[(1, "c")], "three");

        let log = repo.log("main", 10).unwrap();
        assert_eq!(log.len(), 4);
        assert_eq!(log[0], c3);
        assert_eq!(log[1].meta().description, "two");
        assert_eq!(repo.log("main", 2).unwrap().len(), 2);
        assert_eq!(repo.resolve("HEAD~2").unwrap().meta().description, "one");
    }

    #[test]
    fn drop_table_is_committed_as_removal() {
        let repo = repo();
        commit_people(&repo, &[(1, "a")], "one");
        repo.drop_table("people").unwrap();
        assert!(matches!(repo.drop_table("people"), Err(SdkError::TableNotFound(_))));
        repo.stage_all().unwrap();
        repo.commit(meta("drop")).unwrap();
        assert!(repo.root_at("HEAD").unwrap().is_empty());
    }

    #[test]
    fn tags_resolve() {
        let repo = repo();
        let c1 = commit_people(&repo, &[(1, "a")], "one");
        commit_people(&repo, &[(1, "b")], "two");
        repo.tag("v1", "HEAD~1", meta("release")).unwrap();
        assert_eq!(repo.resolve("v1").unwrap(), c1);
        assert!(repo.tag("v1", "HEAD", meta("again")).is_err());
    }

    // ---- branches ----

    #[test]
    fn checkout_switches_roots() {
        let repo = repo();
        commit_people(&repo, &[(1, "a")], "one");
        repo.create_branch("dev", "HEAD").unwrap();
        repo.checkout("dev").unwrap();
        commit_people(&repo, &[(1, "a"), (2, "dev")], "dev work");

        repo.checkout("main").unwrap();
        assert_eq!(repo.working_table("people").unwrap().row_count(), 1);
        assert!(repo.status().unwrap().is_clean());
        assert_eq!(repo.branches().unwrap(), vec!["dev", "main"]);
    }

    #[test]
    fn checkout_refuses_dirty_or_unknown() {
        let repo = repo();
        commit_people(&repo, &[(1, "a")], "one");
        repo.create_branch("dev", "HEAD").unwrap();
        repo.put_table("people", &people(&repo, &[(1, "edited")])).unwrap();

        match repo.checkout("dev") {
            Err(SdkError::DirtyWorkingSet { tables }) => assert_eq!(tables, vec!["people"]),
            other => panic!("expected DirtyWorkingSet, got {other:?}"),
        }
        assert_eq!(repo.current_branch().unwrap(), "main");
        assert!(matches!(repo.checkout("nope"), Err(SdkError::BranchNotFound(_))));
    }

    // ---- merging ----

    #[test]
    fn fast_forward_through_the_sdk() {
        let repo = repo();
        commit_people(&repo, &[(1, "a")], "one");
        repo.create_branch("dev", "HEAD").unwrap();
        repo.checkout("dev").unwrap();
        let tip = commit_people(&repo, &[(1, "a"), (2, "b")], "two");
        repo.checkout("main").unwrap();

        let outcome = repo.merge("dev").unwrap();
        assert_eq!(outcome, MergeOutcome::FastForward { commit: tip.hash_of() });
        assert_eq!(repo.resolve("main").unwrap(), tip);
        assert!(repo.status().unwrap().is_clean());
    }

    #[test]
    fn conflicted_merge_to_merge_commit() {
        let repo = repo();
        commit_people(&repo, &[(1, "a"), (2, "b"), (3, "c")], "base");
        repo.create_branch("dev", "HEAD").unwrap();
        repo.checkout("dev").unwrap();
        let theirs = commit_people(&repo, &[(1, "a"), (2, "dev"), (3, "C")], "dev");
        repo.checkout("main").unwrap();
        commit_people(&repo, &[(1, "a"), (2, "main"), (3, "c")], "main");

        let outcome = repo.merge("dev").unwrap();
        assert_eq!(outcome.conflict_count(), 1);
        assert_eq!(repo.status().unwrap().merging.as_deref(), Some("dev"));
        assert!(matches!(
            repo.commit(meta("too early")),
            Err(SdkError::UnresolvedConflicts { .. })
        ));
        assert!(matches!(repo.checkout("dev"), Err(SdkError::MergeInProgress)));

        // Take their row, drop the conflict, stage and commit.
        let merged = repo.working_table("people").unwrap();
        assert_eq!(merged.get_row(&Value::Int(3)).unwrap(), Some(Value::from("C")));
        let resolved = merged
            .put_row(Value::Int(2), Value::from("dev"))
            .unwrap()
            .with_conflicts(Vec::new())
            .unwrap();
        repo.put_table("people", &resolved).unwrap();
        repo.stage_tables(&["people"]).unwrap();

        let commit = repo.commit(meta("merge dev")).unwrap();
        assert!(commit.is_merge());
        assert_eq!(commit.parents()[1], theirs.to_ref());
        let status = repo.status().unwrap();
        assert!(status.is_clean(), "{status:?}");
        assert!(!repo.working_table("people").unwrap().has_conflicts());
    }

    #[test]
    fn stale_state_on_merge_commit_keeps_branch() {
        let refs = Arc::new(RacingRefStore::default());
        let repo = Repository::init(
            Arc::new(InMemoryChunkStore::new()),
            refs.clone(),
            RepoConfig::default(),
        )
        .unwrap();
        commit_people(&repo, &[(1, "a"), (2, "b")], "base");
        repo.create_branch("dev", "HEAD").unwrap();
        repo.checkout("dev").unwrap();
        commit_people(&repo, &[(1, "a"), (2, "dev")], "dev");
        repo.checkout("main").unwrap();
        let head = commit_people(&repo, &[(1, "main"), (2, "b")], "main");

        let outcome = repo.merge("dev").unwrap();
        assert!(!outcome.has_conflicts());

        refs.stale.store(true, Ordering::SeqCst);
        assert!(matches!(
            repo.commit(meta("merge dev")),
            Err(SdkError::Db(ply_db::DbError::Ref(RefError::StaleState)))
        ));
        refs.stale.store(false, Ordering::SeqCst);

        assert_eq!(repo.resolve("main").unwrap(), head);
        assert_eq!(repo.status().unwrap().merging.as_deref(), Some("dev"));
        assert!(repo.commit(meta("merge dev")).unwrap().is_merge());
    }

    // ---- row diffs ----

    #[test]
    fn diff_rows_between_roots() {
        let repo = repo();
        commit_people(&repo, &[(1, "a"), (2, "b"), (3, "c")], "one");
        commit_people(&repo, &[(1, "a"), (2, "B"), (4, "d")], "two");

        let changes = repo
            .diff_table_rows("people", &repo.root_at("HEAD~1").unwrap(), &repo.root_at("HEAD").unwrap())
            .unwrap();
        let kinds: Vec<(Value, RowChangeKind)> =
            changes.iter().map(|c| (c.key.clone(), c.kind())).collect();
        assert_eq!(
            kinds,
            vec![
                (Value::Int(2), RowChangeKind::Modified),
                (Value::Int(3), RowChangeKind::Removed),
                (Value::Int(4), RowChangeKind::Added),
            ]
        );

        let all_new = repo
            .diff_table_rows("people", &RootValue::empty(), &repo.root_at("HEAD").unwrap())
            .unwrap();
        assert_eq!(all_new.len(), 3);
        assert!(matches!(
            repo.diff_table_rows("ghost", &RootValue::empty(), &RootValue::empty()),
            Err(SdkError::TableNotFound(_))
        ));
    }

    // ---- remote storage ----

    #[test]
    fn repository_over_remote_chunks() {
        let server = Arc::new(InMemoryChunkStore::new());
        let service = Arc::new(ChunkService::new(server.clone(), ChunkCodec::default()));
        let remote = RemoteChunkStore::new(
            Arc::new(LoopbackTransport::new(service)),
            &RemoteConfig::default(),
        )
        .unwrap();
        let refs = Arc::new(InMemoryRefStore::new());

        let repo = Repository::init(Arc::new(remote), refs.clone(), RepoConfig::default()).unwrap();
        let c1 = commit_people(&repo, &[(1, "ada"), (2, "bob")], "remote");
        assert!(!server.is_empty());

        let local = Repository::open(server, refs, RepoConfig::default()).unwrap();
        assert_eq!(local.resolve("main").unwrap(), c1);
        assert_eq!(local.working_table("people").unwrap().row_count(), 2);
    }
}
