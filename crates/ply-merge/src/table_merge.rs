//! Row-level three-way merge of one table.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use ply_db::{split_row, Conflict, Schema, Table};
use ply_diff::{diff_all, DiffConfig};
use ply_value::Value;

use crate::error::{MergeError, MergeResult};

/// What a merge did to one table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableMergeOp {
    Added,
    Removed,
    Modified,
}

/// Per-table merge accounting, counted relative to the merge base.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub operation: TableMergeOp,
    pub adds: u64,
    pub deletes: u64,
    pub modifications: u64,
    pub conflicts: u64,
}

impl MergeStats {
    pub fn new(operation: TableMergeOp) -> Self {
        Self {
            operation,
            adds: 0,
            deletes: 0,
            modifications: 0,
            conflicts: 0,
        }
    }
}

/// Rows whose key is new, gone or changed on one side: key → that side's
/// row value, `None` when the side deleted it.
pub type RowChanges = BTreeMap<Value, Option<Value>>;

/// Collect the row changes from `base` to `side` using the list diff.
///
/// Rows are sorted by key, so a changed row shows up as a deletion and an
/// insertion of the same key inside one splice; the insertion wins. A coarse
/// splice can cover rows that did not change, so every candidate is checked
/// against the base row before it is reported.
pub fn changed_rows(base: &Table, side: &Table, config: &DiffConfig) -> MergeResult<RowChanges> {
    let mut candidates = RowChanges::new();
    for s in diff_all(base.rows(), side.rows(), config)? {
        for row in base.rows().iter_from(s.splice_at)?.take(s.delete_count as usize) {
            let row = row?;
            let (key, _) = split_row(&row)?;
            candidates.insert(key.clone(), None);
        }
        for row in side.rows().iter_from(s.insert_from)?.take(s.insert_count as usize) {
            let row = row?;
            let (key, value) = split_row(&row)?;
            candidates.insert(key.clone(), Some(value.clone()));
        }
    }

    let mut out = RowChanges::new();
    for (key, row) in candidates {
        if base.get_row(&key)? != row {
            out.insert(key, row);
        }
    }
    Ok(out)
}

/// Count `changes` as adds, deletes and modifications against `base`.
pub fn stats_for(base: &Table, changes: &RowChanges, operation: TableMergeOp) -> MergeResult<MergeStats> {
    let mut stats = MergeStats::new(operation);
    for (key, row) in changes {
        match (base.get_row(key)?.is_some(), row.is_some()) {
            (false, true) => stats.adds += 1,
            (true, true) => stats.modifications += 1,
            (true, false) => stats.deletes += 1,
            (false, false) => {}
        }
    }
    Ok(stats)
}

fn merge_schema(name: &str, base: &Schema, ours: &Schema, theirs: &Schema) -> MergeResult<Schema> {
    if ours == theirs || base == theirs {
        Ok(ours.clone())
    } else if base == ours {
        Ok(theirs.clone())
    } else {
        Err(MergeError::SchemaConflict {
            table: name.to_string(),
        })
    }
}

/// Three-way merge of a table changed on both sides.
///
/// Changes made on only one side are applied. The same change on both sides
/// applies once. Different changes to the same key keep our row and record a
/// [`Conflict`].
pub fn merge_table(
    name: &str,
    base: &Table,
    ours: &Table,
    theirs: &Table,
    config: &DiffConfig,
) -> MergeResult<(Table, MergeStats)> {
    let schema = merge_schema(name, base.schema(), ours.schema(), theirs.schema())?;
    let ours_changes = changed_rows(base, ours, config)?;
    let theirs_changes = changed_rows(base, theirs, config)?;

    let mut merged = ours.with_schema(schema);
    let mut stats = MergeStats::new(TableMergeOp::Modified);
    let mut conflicts = Vec::new();

    for (key, theirs_row) in theirs_changes {
        match ours_changes.get(&key) {
            Some(ours_row) if *ours_row == theirs_row => {}
            Some(ours_row) => conflicts.push(Conflict {
                base: base.get_row(&key)?,
                ours: ours_row.clone(),
                theirs: theirs_row,
                key,
            }),
            None => {
                let in_base = base.get_row(&key)?.is_some();
                merged = match theirs_row {
                    Some(value) => {
                        if in_base {
                            stats.modifications += 1;
                        } else {
                            stats.adds += 1;
                        }
                        merged.put_row(key, value)?
                    }
                    None => {
                        stats.deletes += 1;
                        merged.delete_row(&key)?
                    }
                };
            }
        }
    }

    stats.conflicts = conflicts.len() as u64;
    if !conflicts.is_empty() {
        let fresh: BTreeSet<&Value> = conflicts.iter().map(|c| &c.key).collect();
        let mut all: Vec<Conflict> = merged
            .conflicts()?
            .into_iter()
            .filter(|c| !fresh.contains(&c.key))
            .collect();
        all.extend(conflicts);
        merged = merged.with_conflicts(all)?;
    }
    debug!(
        table = name,
        adds = stats.adds,
        deletes = stats.deletes,
        modifications = stats.modifications,
        conflicts = stats.conflicts,
        "merged table"
    );
    Ok((merged, stats))
}
