//! Merging whole root values and commits.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use ply_db::{Commit, Database, RootValue, Table};
use ply_diff::DiffConfig;
use ply_value::ValueStore;

use crate::error::{MergeError, MergeResult};
use crate::table_merge::{changed_rows, merge_table, stats_for, MergeStats, TableMergeOp};

/// Merged root plus stats for every table that took changes from `theirs`.
pub type RootMerge = (RootValue, BTreeMap<String, MergeStats>);

/// Three-way merge of root values.
pub fn merge_roots(
    store: &ValueStore,
    base: &RootValue,
    ours: &RootValue,
    theirs: &RootValue,
    config: &DiffConfig,
) -> MergeResult<RootMerge> {
    let names: BTreeSet<String> = base
        .table_names()
        .into_iter()
        .chain(ours.table_names())
        .chain(theirs.table_names())
        .collect();

    let mut merged = ours.clone();
    let mut stats = BTreeMap::new();
    for name in names {
        let (b, o, t) = (
            base.table_hash(&name),
            ours.table_hash(&name),
            theirs.table_hash(&name),
        );
        if o == t || b == t {
            continue;
        }

        let load = |root: &RootValue| root.get_table(store, &name);
        if b == o {
            // Only theirs changed: take their table as is.
            let table_stats = match (load(base)?, load(theirs)?) {
                (None, Some(added)) => {
                    let empty = Table::new(store.clone(), added.schema().clone());
                    stats_for(&empty, &changed_rows(&empty, &added, config)?, TableMergeOp::Added)?
                }
                (Some(removed), None) => {
                    let empty = Table::new(store.clone(), removed.schema().clone());
                    stats_for(&removed, &changed_rows(&removed, &empty, config)?, TableMergeOp::Removed)?
                }
                (Some(before), Some(after)) => {
                    stats_for(&before, &changed_rows(&before, &after, config)?, TableMergeOp::Modified)?
                }
                (None, None) => continue,
            };
            merged = match theirs.table_ref(&name) {
                Some(r) => merged.put_table_ref(&name, r.clone()),
                None => merged.remove_tables(&[name.as_str()]),
            };
            stats.insert(name, table_stats);
            continue;
        }

        // Both sides changed the table, and differently.
        let (Some(our_table), Some(their_table)) = (load(ours)?, load(theirs)?) else {
            return Err(MergeError::TableDeletedAndModified { table: name });
        };
        let base_table = match load(base)? {
            Some(t) => t,
            None => Table::new(store.clone(), our_table.schema().clone()),
        };
        let (table, table_stats) = merge_table(&name, &base_table, &our_table, &their_table, config)?;
        merged = merged.put_table(store, &name, &table)?;
        stats.insert(name, table_stats);
    }
    Ok((merged, stats))
}

/// Merge `theirs` into `ours` using their nearest common ancestor as base.
pub fn merge_commits(db: &Database, ours: &Commit, theirs: &Commit) -> MergeResult<RootMerge> {
    let base = db
        .common_ancestor(ours, theirs)?
        .ok_or_else(|| MergeError::NoCommonAncestor {
            ours: ours.hash_of(),
            theirs: theirs.hash_of(),
        })?;
    debug!(
        ours = %ours.hash_of().short_hex(),
        theirs = %theirs.hash_of().short_hex(),
        base = %base.hash_of().short_hex(),
        "three-way merge"
    );
    let store = db.values();
    merge_roots(
        store,
        &base.root_value(store)?,
        &ours.root_value(store)?,
        &theirs.root_value(store)?,
        &DiffConfig::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ply_db::{Column, ColumnKind, CommitMeta, Schema};
    use ply_refs::InMemoryRefStore;
    use ply_store::InMemoryChunkStore;
    use ply_value::Value;
    use std::sync::Arc;

    fn db() -> Database {
        Database::new(
            ValueStore::new(Arc::new(InMemoryChunkStore::new())),
            Arc::new(InMemoryRefStore::new()),
        )
    }

    fn table(db: &Database, rows: &[(i64, &str)]) -> Table {
        Table::from_rows(
            db.values().clone(),
            Schema::new(vec![Column::key("id", ColumnKind::Int)]),
            rows.iter().map(|(k, v)| (Value::Int(*k), Value::from(*v))),
        )
        .unwrap()
    }

    fn root(db: &Database, tables: &[(&str, Table)]) -> RootValue {
        tables.iter().fold(RootValue::empty(), |r, (name, t)| {
            r.put_table(db.values(), name, t).unwrap()
        })
    }

    fn meta(msg: &str) -> CommitMeta {
        CommitMeta::new("Ada", "ada@example.com", msg).with_timestamp_ms(0)
    }

    #[test]
    fn one_sided_table_changes() {
        let db = db();
        let t = table(&db, &[(1, "a"), (2, "b")]);
        let base = root(&db, &[("keep", t.clone()), ("gone", t.clone())]);
        let ours = base.clone();
        let theirs = root(
            &db,
            &[("keep", table(&db, &[(1, "a"), (2, "B"), (3, "c")])), ("new", t.clone())],
        );

        let (merged, stats) =
            merge_roots(db.values(), &base, &ours, &theirs, &DiffConfig::default()).unwrap();
        assert_eq!(merged, theirs);
        assert_eq!(stats["keep"].operation, TableMergeOp::Modified);
        assert_eq!((stats["keep"].adds, stats["keep"].modifications), (1, 1));
        assert_eq!(stats["gone"].operation, TableMergeOp::Removed);
        assert_eq!(stats["gone"].deletes, 2);
        assert_eq!(stats["new"].operation, TableMergeOp::Added);
        assert_eq!(stats["new"].adds, 2);
    }

    #[test]
    fn ours_only_changes_are_kept_without_stats() {
        let db = db();
        let base = root(&db, &[("t", table(&db, &[(1, "a")]))]);
        let ours = root(&db, &[("t", table(&db, &[(1, "z")]))]);
        let (merged, stats) =
            merge_roots(db.values(), &base, &ours, &base, &DiffConfig::default()).unwrap();
        assert_eq!(merged, ours);
        assert!(stats.is_empty());
    }

    #[test]
    fn delete_versus_modify_is_an_error() {
        let db = db();
        let base = root(&db, &[("t", table(&db, &[(1, "a")]))]);
        let ours = RootValue::empty();
        let theirs = root(&db, &[("t", table(&db, &[(1, "b")]))]);
        assert!(matches!(
            merge_roots(db.values(), &base, &ours, &theirs, &DiffConfig::default()),
            Err(MergeError::TableDeletedAndModified { .. })
        ));
    }

    #[test]
    fn commits_merge_from_common_ancestor() {
        let db = db();
        let c0 = db
            .commit(&root(&db, &[("t", table(&db, &[(1, "a"), (2, "b"), (3, "c")]))]), &[], meta("c0"))
            .unwrap();
        let ours = db
            .commit(&root(&db, &[("t", table(&db, &[(1, "A"), (2, "b"), (3, "c")]))]), &[c0.clone()], meta("ours"))
            .unwrap();
        let theirs = db
            .commit(&root(&db, &[("t", table(&db, &[(1, "a"), (2, "b"), (3, "C")]))]), &[c0], meta("theirs"))
            .unwrap();

        let (merged, stats) = merge_commits(&db, &ours, &theirs).unwrap();
        let t = merged.get_table(db.values(), "t").unwrap().unwrap();
        assert_eq!(t.get_row(&Value::Int(1)).unwrap(), Some(Value::from("A")));
        assert_eq!(t.get_row(&Value::Int(3)).unwrap(), Some(Value::from("C")));
        assert_eq!(stats["t"].conflicts, 0);
    }

    #[test]
    fn unrelated_commits_fail() {
        let db = db();
        let a = db.commit(&RootValue::empty(), &[], meta("a")).unwrap();
        let b = db
            .commit(&root(&db, &[("t", table(&db, &[]))]), &[], meta("b"))
            .unwrap();
        assert!(matches!(
            merge_commits(&db, &a, &b),
            Err(MergeError::NoCommonAncestor { .. })
        ));
    }
}
