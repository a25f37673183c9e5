//! The merge protocol over a repo environment.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use ply_db::{move_tables_between_roots, union_table_names, Commit, CommitSpec, RepoEnv, RootValue};
use ply_refs::{MergeState, RepoState};
use ply_types::Hash;

use crate::error::{MergeError, MergeResult};
use crate::root_merge::merge_commits;
use crate::table_merge::MergeStats;

/// Result of [`merge`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeOutcome {
    /// Their commit is already part of our history.
    UpToDate,
    /// The branch moved forward to their commit.
    FastForward { commit: Hash },
    /// A three-way merge was written to the working and staged roots and a
    /// merge is now in progress.
    Merged {
        commit: Hash,
        stats: BTreeMap<String, MergeStats>,
    },
}

impl MergeOutcome {
    pub fn conflict_count(&self) -> u64 {
        match self {
            MergeOutcome::Merged { stats, .. } => stats.values().map(|s| s.conflicts).sum(),
            _ => 0,
        }
    }

    pub fn has_conflicts(&self) -> bool {
        self.conflict_count() > 0
    }

    /// Tables left with conflicting rows, in name order.
    pub fn tables_in_conflict(&self) -> Vec<String> {
        match self {
            MergeOutcome::Merged { stats, .. } => stats
                .iter()
                .filter(|(_, s)| s.conflicts > 0)
                .map(|(name, _)| name.clone())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Names of tables whose hash differs between two roots.
pub fn changed_tables(from: &RootValue, to: &RootValue) -> BTreeSet<String> {
    union_table_names(from, to)
        .into_iter()
        .filter(|name| from.table_hash(name) != to.table_hash(name))
        .collect()
}

/// Tables a merge of `theirs` would touch that also have uncommitted
/// working or staged changes.
pub fn merge_would_stomp_changes(env: &RepoEnv, theirs: &Commit) -> MergeResult<Vec<String>> {
    let head = env.head_root()?;
    let their_root = theirs.root_value(env.db().values())?;
    let working = env.working_root()?;
    let staged = env.staged_root()?;

    let touched = changed_tables(&head, &their_root);
    let mut dirty = changed_tables(&head, &working);
    dirty.extend(changed_tables(&head, &staged));
    Ok(touched.intersection(&dirty).cloned().collect())
}

/// Merge the commit named by `spec` into the checked-out branch.
pub fn merge(env: &RepoEnv, spec: &CommitSpec) -> MergeResult<MergeOutcome> {
    let state = env.state()?;
    if state.is_merging() {
        return Err(MergeError::MergeInProgress);
    }
    let db = env.db();
    let ours = env.head_commit()?;
    let theirs = env.resolve(spec)?;
    let (our_hash, their_hash) = (ours.hash_of(), theirs.hash_of());

    if our_hash == their_hash || db.can_fast_forward_to(&theirs, &ours)? {
        info!(commit = %their_hash.short_hex(), "already up to date");
        return Ok(MergeOutcome::UpToDate);
    }

    let stomped = merge_would_stomp_changes(env, &theirs)?;
    if !stomped.is_empty() {
        return Err(MergeError::WouldStompChanges { tables: stomped });
    }

    let head = env.head_root()?;
    let working = env.working_root()?;
    let staged = env.staged_root()?;

    if db.can_fast_forward_to(&ours, &theirs)? {
        let target = theirs.root_value(db.values())?;
        let next = carry_changes(env, &state, &head, &working, &staged, &target, None)?;
        db.fast_forward(&state.head, &theirs)?;
        if let Err(e) = env.update_state(&state, next) {
            db.rewind_branch(&state.head, &theirs, &ours)?;
            return Err(e.into());
        }
        info!(
            branch = %state.head,
            from = %our_hash.short_hex(),
            to = %their_hash.short_hex(),
            "fast-forward merge"
        );
        return Ok(MergeOutcome::FastForward { commit: their_hash });
    }

    let (merged, stats) = merge_commits(db, &ours, &theirs)?;
    let merge_state = MergeState {
        source_ref: spec.to_string(),
        commit: their_hash,
        pre_merge_working: state.working,
    };
    let next = carry_changes(env, &state, &head, &working, &staged, &merged, Some(merge_state))?;
    env.update_state(&state, next)?;
    let outcome = MergeOutcome::Merged {
        commit: their_hash,
        stats,
    };
    info!(
        branch = %state.head,
        theirs = %their_hash.short_hex(),
        conflicts = outcome.conflict_count(),
        "three-way merge recorded"
    );
    Ok(outcome)
}

/// New repo state whose working and staged roots are `target` plus the
/// tables that had uncommitted changes relative to `head`.
fn carry_changes(
    env: &RepoEnv,
    state: &RepoState,
    head: &RootValue,
    working: &RootValue,
    staged: &RootValue,
    target: &RootValue,
    merge: Option<MergeState>,
) -> MergeResult<RepoState> {
    let dirty_working: Vec<String> = changed_tables(head, working).into_iter().collect();
    let dirty_staged: Vec<String> = changed_tables(head, staged).into_iter().collect();
    let working = move_tables_between_roots(&dirty_working, working, target);
    let staged = move_tables_between_roots(&dirty_staged, staged, target);
    let db = env.db();
    Ok(RepoState {
        working: db.write_root_value(&working)?,
        staged: db.write_root_value(&staged)?,
        merge,
        ..state.clone()
    })
}

/// Abandon an in-progress merge.
///
/// The working root returns to what it was before the merge and the staged
/// root to the head root.
pub fn abort_merge(env: &RepoEnv) -> MergeResult<()> {
    let state = env.state()?;
    let Some(merge) = state.merge.clone() else {
        return Err(MergeError::NoMergeInProgress);
    };
    let head = env.head_commit()?;
    let next = RepoState {
        working: merge.pre_merge_working,
        staged: head.root().target_hash(),
        merge: None,
        ..state.clone()
    };
    env.update_state(&state, next)?;
    info!(source = %merge.source_ref, "merge aborted");
    Ok(())
}
