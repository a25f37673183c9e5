use tracing::debug;

use ply_db::{
    move_tables_between_roots, union_table_names, RepoEnv, RootKind, RootValue,
};
use ply_refs::RepoState;
use ply_value::ValueStore;

use crate::error::{StageError, StageResult};

/// Check that every name exists in at least one of `roots`.
///
/// All missing names are reported together.
pub fn validate_tables<S: AsRef<str>>(names: &[S], roots: &[&RootValue]) -> StageResult<()> {
    let missing: Vec<String> = names
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| !roots.iter().any(|root| root.has_table(name)))
        .map(str::to_string)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(StageError::TableNotFound { missing })
    }
}

/// Move the named tables from the working root into the staged root.
///
/// A table absent from the working root is removed from the staged root.
/// Tables whose conflict marker has no rows left get the marker cleared on
/// the way; any table with conflicting rows fails the whole call.
pub fn stage_tables<S: AsRef<str>>(env: &RepoEnv, names: &[S]) -> StageResult<()> {
    let (state, staged, working) = load_roots(env)?;
    stage_in(env, &state, names, &staged, working)
}

/// [`stage_tables`] over every table in either the staged or working root.
pub fn stage_all_tables(env: &RepoEnv) -> StageResult<()> {
    let (state, staged, working) = load_roots(env)?;
    let names = union_table_names(&staged, &working);
    stage_in(env, &state, &names, &staged, working)
}

/// Reset the named tables in the staged root to their head versions.
pub fn unstage_tables<S: AsRef<str>>(env: &RepoEnv, names: &[S]) -> StageResult<()> {
    let state = env.state()?;
    let staged = env.load_root(RootKind::Staged, state.staged)?;
    let head = env.head_root()?;
    validate_tables(names, &[&staged, &head])?;

    let staged = move_tables_between_roots(names, &head, &staged);
    let hash = env.db().write_root_value(&staged)?;
    env.update_state(
        &state,
        RepoState {
            staged: hash,
            ..state.clone()
        },
    )?;
    debug!(tables = names.len(), staged = %hash.short_hex(), "unstaged tables");
    Ok(())
}

fn load_roots(env: &RepoEnv) -> StageResult<(RepoState, RootValue, RootValue)> {
    let state = env.state()?;
    let staged = env.load_root(RootKind::Staged, state.staged)?;
    let working = env.load_root(RootKind::Working, state.working)?;
    Ok((state, staged, working))
}

fn stage_in<S: AsRef<str>>(
    env: &RepoEnv,
    state: &RepoState,
    names: &[S],
    staged: &RootValue,
    working: RootValue,
) -> StageResult<()> {
    validate_tables(names, &[staged, &working])?;
    let working = clear_resolved_conflicts(env.db().values(), names, working)?;
    let staged = move_tables_between_roots(names, &working, staged);

    // Both roots are written before either pointer moves.
    let next = env.update_roots(state, &working, &staged)?;
    debug!(
        tables = names.len(),
        working = %next.working.short_hex(),
        staged = %next.staged.short_hex(),
        "staged tables"
    );
    Ok(())
}

fn clear_resolved_conflicts<S: AsRef<str>>(
    store: &ValueStore,
    names: &[S],
    mut working: RootValue,
) -> StageResult<RootValue> {
    let mut in_conflict = Vec::new();
    for name in names.iter().map(AsRef::as_ref) {
        let Some(table) = working.get_table(store, name)? else {
            continue;
        };
        if !table.has_conflicts() {
            continue;
        }
        if table.num_rows_in_conflict() > 0 {
            in_conflict.push(name.to_string());
        } else {
            debug!(table = name, "clearing resolved conflict marker");
            working = working.put_table(store, name, &table.clear_conflicts())?;
        }
    }
    if in_conflict.is_empty() {
        Ok(working)
    } else {
        Err(StageError::TablesInConflict {
            tables: in_conflict,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use ply_db::{Column, ColumnKind, CommitMeta, Conflict, Database, Schema, Table};
    use ply_refs::InMemoryRefStore;
    use ply_store::{Chunk, ChunkStore, InMemoryChunkStore, StoreError, StoreResult};
    use ply_types::Hash;
    use ply_value::Value;

    /// Chunk store whose writes start failing once armed.
    #[derive(Default)]
    struct FailingChunkStore {
        inner: InMemoryChunkStore,
        fail_puts: AtomicBool,
    }

    impl FailingChunkStore {
        fn arm(&self) {
            self.fail_puts.store(true, Ordering::SeqCst);
        }
    }

    impl ChunkStore for FailingChunkStore {
        fn get(&self, hash: &Hash) -> StoreResult<Option<Chunk>> {
            self.inner.get(hash)
        }

        fn put(&self, chunk: Chunk) -> StoreResult<()> {
            if self.fail_puts.load(Ordering::SeqCst) {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            self.inner.put(chunk)
        }

        fn has(&self, hash: &Hash) -> StoreResult<bool> {
            self.inner.has(hash)
        }
    }

    fn env_over(chunks: Arc<dyn ChunkStore>) -> RepoEnv {
        let db = Database::new(ValueStore::new(chunks), Arc::new(InMemoryRefStore::new()));
        RepoEnv::init(db, "main", CommitMeta::new("Ada", "ada@example.com", "init")).unwrap()
    }

    fn env() -> RepoEnv {
        env_over(Arc::new(InMemoryChunkStore::new()))
    }

    fn table(env: &RepoEnv, rows: i64) -> Table {
        Table::from_rows(
            env.db().values().clone(),
            Schema::new(vec![Column::key("id", ColumnKind::Int)]),
            (0..rows).map(|i| (Value::Int(i), Value::from(format!("row {i}")))),
        )
        .unwrap()
    }

    fn conflicted(env: &RepoEnv, conflicts: i64) -> Table {
        let list = (0..conflicts)
            .map(|i| Conflict {
                key: Value::Int(i),
                base: None,
                ours: Some(Value::from("ours")),
                theirs: Some(Value::from("theirs")),
            })
            .collect();
        table(env, 5).with_conflicts(list).unwrap()
    }

    fn set_working(env: &RepoEnv, tables: Vec<(&str, Table)>) -> RootValue {
        let store = env.db().values();
        let root = tables.iter().fold(RootValue::empty(), |root, (name, t)| {
            root.put_table(store, name, t).unwrap()
        });
        env.update_working_root(&root).unwrap();
        root
    }

    // ---- validation ----

    #[test]
    fn validate_reports_every_missing_table() {
        let env = env();
        let a = set_working(&env, vec![("a", table(&env, 1))]);
        let err = validate_tables(&["a", "x", "y"], &[&a, &RootValue::empty()]).unwrap_err();
        match err {
            StageError::TableNotFound { missing } => assert_eq!(missing, vec!["x", "y"]),
            other => panic!("unexpected {other:?}"),
        }
        validate_tables::<&str>(&[], &[]).unwrap();
    }

    #[test]
    fn staging_missing_table_changes_nothing() {
        let env = env();
        set_working(&env, vec![("a", table(&env, 1))]);
        let before = env.state().unwrap();
        assert!(matches!(
            stage_tables(&env, &["a", "nope"]),
            Err(StageError::TableNotFound { .. })
        ));
        assert_eq!(env.state().unwrap(), before);
    }

    // ---- staging ----

    #[test]
    fn stage_moves_only_named_tables() {
        let env = env();
        let working = set_working(&env, vec![("a", table(&env, 3)), ("b", table(&env, 4))]);
        stage_tables(&env, &["a"]).unwrap();

        let staged = env.staged_root().unwrap();
        assert_eq!(staged.table_names(), vec!["a"]);
        assert_eq!(staged.table_hash("a"), working.table_hash("a"));
        assert_eq!(env.working_root().unwrap(), working);
    }

    #[test]
    fn stage_all_includes_deletions() {
        let env = env();
        set_working(&env, vec![("a", table(&env, 3)), ("b", table(&env, 4))]);
        stage_all_tables(&env).unwrap();
        assert_eq!(env.staged_root().unwrap().table_names(), vec!["a", "b"]);

        set_working(&env, vec![("b", table(&env, 4))]);
        stage_all_tables(&env).unwrap();
        assert_eq!(env.staged_root().unwrap().table_names(), vec!["b"]);
        assert_eq!(env.staged_root().unwrap(), env.working_root().unwrap());
    }

    #[test]
    fn conflicts_abort_the_whole_call() {
        let env = env();
        set_working(&env, vec![("a", table(&env, 3)), ("b", conflicted(&env, 2))]);
        let before = env.state().unwrap();

        match stage_tables(&env, &["a", "b"]) {
            Err(StageError::TablesInConflict { tables }) => assert_eq!(tables, vec!["b"]),
            other => panic!("expected TablesInConflict, got {other:?}"),
        }
        let after = env.state().unwrap();
        assert_eq!(after.working, before.working);
        assert_eq!(after.staged, before.staged);
    }

    #[test]
    fn resolved_marker_is_cleared_in_both_roots() {
        let env = env();
        set_working(&env, vec![("b", conflicted(&env, 0))]);
        stage_tables(&env, &["b"]).unwrap();

        let store = env.db().values();
        let working = env.working_root().unwrap().get_table(store, "b").unwrap().unwrap();
        let staged = env.staged_root().unwrap().get_table(store, "b").unwrap().unwrap();
        assert!(!working.has_conflicts());
        assert!(!staged.has_conflicts());
        assert_eq!(working, staged);
    }

    #[test]
    fn unstage_restores_head_version() {
        let env = env();
        set_working(&env, vec![("a", table(&env, 3))]);
        stage_all_tables(&env).unwrap();
        unstage_tables(&env, &["a"]).unwrap();
        assert!(env.staged_root().unwrap().is_empty());
        assert!(env.working_root().unwrap().has_table("a"));
    }

    // ---- failure rollback ----

    #[test]
    fn write_failure_leaves_pointers_untouched() {
        let chunks = Arc::new(FailingChunkStore::default());
        let env = env_over(chunks.clone());
        set_working(&env, vec![("a", table(&env, 3)), ("b", conflicted(&env, 0))]);
        let before = env.state().unwrap();

        chunks.arm();
        let err = stage_all_tables(&env).unwrap_err();
        assert!(err.is_storage_failure());
        assert_eq!(env.state().unwrap(), before);
    }
}
