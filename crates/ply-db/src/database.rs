//! The database: content-addressed values plus named refs.

use std::collections::{BTreeSet, BinaryHeap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use ply_refs::{Ref as NamedRef, RefError, RefStore, BRANCH_PREFIX, TAG_PREFIX};
use ply_types::Hash;
use ply_value::{Ref, ValueError, ValueStore};

use crate::commit::{Commit, CommitMeta, Tag};
use crate::commit_spec::{AncestorStep, CommitSpec, SpecBase};
use crate::error::{DbError, DbResult};
use crate::root::RootValue;

/// Values and refs of one repository.
///
/// Cloning is cheap; clones share both stores.
#[derive(Clone)]
pub struct Database {
    values: ValueStore,
    refs: Arc<dyn RefStore>,
}

impl Database {
    pub fn new(values: ValueStore, refs: Arc<dyn RefStore>) -> Self {
        Self { values, refs }
    }

    pub fn values(&self) -> &ValueStore {
        &self.values
    }

    pub fn refs(&self) -> &Arc<dyn RefStore> {
        &self.refs
    }

    // ---------------------------------------------------------------
    // Root values
    // ---------------------------------------------------------------

    pub fn write_root_value(&self, root: &RootValue) -> DbResult<Hash> {
        let r = self.values.write_value(&root.to_value())?;
        debug!(root = %r.target_hash().short_hex(), tables = root.table_names().len(), "wrote root value");
        Ok(r.target_hash())
    }

    pub fn read_root_value(&self, hash: &Hash) -> DbResult<RootValue> {
        RootValue::from_value(&self.values.read_value(hash)?)
    }

    // ---------------------------------------------------------------
    // Commits
    // ---------------------------------------------------------------

    /// Write `root` and a commit of it with the given parents.
    pub fn commit(&self, root: &RootValue, parents: &[Commit], meta: CommitMeta) -> DbResult<Commit> {
        let root_ref = self.values.write_value(&root.to_value())?;
        let parents = parents.iter().map(Commit::to_ref).collect();
        let commit = Commit::new(root_ref, parents, meta);
        let r = self.values.write_value(&commit.to_value())?;
        debug!(
            commit = %r.target_hash().short_hex(),
            height = r.height(),
            parents = commit.parents().len(),
            "wrote commit"
        );
        Ok(commit)
    }

    pub fn read_commit(&self, hash: &Hash) -> DbResult<Commit> {
        match self.values.read_value(hash) {
            Ok(value) => Commit::from_value(&value),
            Err(ValueError::NotFound(_)) => Err(DbError::RevisionNotFound(hash.to_hex())),
            Err(e) => Err(e.into()),
        }
    }

    /// The commit stored under `hash`, or `None` when nothing is stored
    /// there or the value is not a commit.
    fn commit_at(&self, hash: &Hash) -> DbResult<Option<Commit>> {
        let value = match self.values.read_value(hash) {
            Ok(value) => value,
            Err(ValueError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !Commit::is_commit_value(&value) {
            debug!(hash = %hash.short_hex(), "hash names a non-commit value");
            return Ok(None);
        }
        Commit::from_value(&value).map(Some)
    }

    fn read_ref_commit(&self, r: &Ref) -> DbResult<Commit> {
        self.read_commit(&r.target_hash())
    }

    // ---------------------------------------------------------------
    // Branches and tags
    // ---------------------------------------------------------------

    pub fn branch_head(&self, name: &str) -> DbResult<Option<Commit>> {
        match self.refs.read_ref(&format!("{BRANCH_PREFIX}{name}"))? {
            Some(r) => Ok(Some(self.read_commit(&r.target_hash())?)),
            None => Ok(None),
        }
    }

    pub fn branch_names(&self) -> DbResult<Vec<String>> {
        Ok(self
            .refs
            .branches()?
            .into_iter()
            .map(|(_, r)| r.short_name().to_string())
            .collect())
    }

    /// Point `name` at `commit` unconditionally.
    pub fn set_branch(&self, name: &str, commit: &Commit) -> DbResult<()> {
        let target = commit.hash_of();
        self.refs
            .write_ref(&format!("{BRANCH_PREFIX}{name}"), &NamedRef::branch(name, target))?;
        info!(branch = name, commit = %target.short_hex(), "branch moved");
        Ok(())
    }

    /// Create a new branch at `commit`. Fails if the branch exists.
    pub fn create_branch(&self, name: &str, commit: &Commit) -> DbResult<()> {
        let target = commit.hash_of();
        match self.refs.compare_and_set_ref(
            &format!("{BRANCH_PREFIX}{name}"),
            None,
            &NamedRef::branch(name, target),
        ) {
            Ok(()) => {
                info!(branch = name, commit = %target.short_hex(), "branch created");
                Ok(())
            }
            Err(RefError::StaleRef { .. }) => Err(DbError::BranchExists(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Tag `commit`. Tags are immutable, so an existing name is an error.
    pub fn create_tag(&self, name: &str, commit: &Commit, meta: CommitMeta) -> DbResult<Tag> {
        let tag = Tag::new(commit.to_ref(), meta);
        let r = self.values.write_value(&tag.to_value())?;
        let canonical = format!("{TAG_PREFIX}{name}");
        match self
            .refs
            .compare_and_set_ref(&canonical, None, &NamedRef::tag(name, r.target_hash()))
        {
            Ok(()) => Ok(tag),
            Err(RefError::StaleRef { .. }) => {
                Err(RefError::AlreadyExists { name: canonical }.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Move `branch` to `commit` if that is a fast-forward.
    ///
    /// The branch must exist. Moving to its current head is a no-op.
    pub fn fast_forward(&self, branch: &str, commit: &Commit) -> DbResult<()> {
        let name = format!("{BRANCH_PREFIX}{branch}");
        let current = self
            .refs
            .read_ref(&name)?
            .ok_or_else(|| DbError::RevisionNotFound(branch.to_string()))?
            .target_hash();
        let target = commit.hash_of();
        if current == target {
            return Ok(());
        }
        let head = self.read_commit(&current)?;
        if !self.can_fast_forward_to(&head, commit)? {
            return Err(DbError::NotFastForward {
                branch: branch.to_string(),
                from: current,
                to: target,
            });
        }
        self.refs
            .compare_and_set_ref(&name, Some(current), &NamedRef::branch(branch, target))?;
        info!(
            branch,
            from = %current.short_hex(),
            to = %target.short_hex(),
            "fast-forward"
        );
        Ok(())
    }

    /// Move `branch` back from `from` to `to`, undoing a fast-forward whose
    /// follow-up state change failed. Fails if the branch has moved since.
    pub fn rewind_branch(&self, branch: &str, from: &Commit, to: &Commit) -> DbResult<()> {
        let target = to.hash_of();
        self.refs.compare_and_set_ref(
            &format!("{BRANCH_PREFIX}{branch}"),
            Some(from.hash_of()),
            &NamedRef::branch(branch, target),
        )?;
        warn!(branch, to = %target.short_hex(), "branch rewound");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Revision resolution
    // ---------------------------------------------------------------

    /// Resolve a spec. `current_branch` is what `HEAD` stands for.
    pub fn resolve(&self, spec: &CommitSpec, current_branch: Option<&str>) -> DbResult<Commit> {
        let not_found = || DbError::RevisionNotFound(spec.to_string());
        let mut commit = match &spec.base {
            SpecBase::Head => {
                let branch = current_branch.ok_or(DbError::NotInitialised)?;
                self.branch_head(branch)?.ok_or_else(not_found)?
            }
            SpecBase::Hash(h) => self.commit_at(h)?.ok_or_else(not_found)?,
            SpecBase::Name(name) => {
                if let Some(c) = self.branch_head(name)? {
                    c
                } else if let Some(r) = self.refs.read_ref(&format!("{TAG_PREFIX}{name}"))? {
                    let tag = Tag::from_value(&self.values.read_value(&r.target_hash())?)?;
                    self.read_ref_commit(&tag.commit)?
                } else {
                    return Err(not_found());
                }
            }
        };

        for step in &spec.steps {
            match *step {
                AncestorStep::FirstParent(n) => {
                    for _ in 0..n {
                        let parent = commit.parents().first().ok_or_else(not_found)?.clone();
                        commit = self.read_ref_commit(&parent)?;
                    }
                }
                AncestorStep::Parent(n) => {
                    let parent = n
                        .checked_sub(1)
                        .and_then(|i| commit.parents().get(i as usize))
                        .ok_or_else(not_found)?
                        .clone();
                    commit = self.read_ref_commit(&parent)?;
                }
            }
        }
        Ok(commit)
    }

    // ---------------------------------------------------------------
    // Ancestry
    // ---------------------------------------------------------------

    /// Whether `ancestor` is a strict ancestor of `descendant`.
    ///
    /// Parents below the ancestor's height are never loaded.
    pub fn can_fast_forward_to(&self, ancestor: &Commit, descendant: &Commit) -> DbResult<bool> {
        let target = ancestor.hash_of();
        let floor = ancestor.height();
        let mut seen = HashSet::new();
        let mut queue: Vec<Ref> = descendant.parents().to_vec();
        while let Some(r) = queue.pop() {
            if r.height() < floor || !seen.insert(r.target_hash()) {
                continue;
            }
            if r.target_hash() == target {
                return Ok(true);
            }
            if r.height() > floor {
                queue.extend(self.read_ref_commit(&r)?.parents().iter().cloned());
            }
        }
        Ok(false)
    }

    /// The best common ancestor of `a` and `b`, if they share history.
    ///
    /// Both sides are walked from the tallest commit down, so the first
    /// height at which the frontiers meet yields the nearest ancestor.
    pub fn common_ancestor(&self, a: &Commit, b: &Commit) -> DbResult<Option<Commit>> {
        let mut left = BinaryHeap::from([(a.height(), a.hash_of())]);
        let mut right = BinaryHeap::from([(b.height(), b.hash_of())]);

        while let (Some(&(lh, _)), Some(&(rh, _))) = (left.peek(), right.peek()) {
            if lh > rh {
                let popped = pop_height(&mut left, lh);
                self.push_parents(&mut left, &popped)?;
            } else if rh > lh {
                let popped = pop_height(&mut right, rh);
                self.push_parents(&mut right, &popped)?;
            } else {
                let l = pop_height(&mut left, lh);
                let r = pop_height(&mut right, rh);
                if let Some(common) = l.intersection(&r).next() {
                    return Ok(Some(self.read_commit(common)?));
                }
                self.push_parents(&mut left, &l)?;
                self.push_parents(&mut right, &r)?;
            }
        }
        Ok(None)
    }

    fn push_parents(&self, heap: &mut BinaryHeap<(u64, Hash)>, commits: &BTreeSet<Hash>) -> DbResult<()> {
        for h in commits {
            for p in self.read_commit(h)?.parents() {
                heap.push((p.height(), p.target_hash()));
            }
        }
        Ok(())
    }
}

fn pop_height(heap: &mut BinaryHeap<(u64, Hash)>, height: u64) -> BTreeSet<Hash> {
    let mut out = BTreeSet::new();
    while let Some(&(h, hash)) = heap.peek() {
        if h != height {
            break;
        }
        heap.pop();
        out.insert(hash);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, ColumnKind, Schema, Table};
    use ply_refs::InMemoryRefStore;
    use ply_store::InMemoryChunkStore;
    use ply_value::Value;

    fn db() -> Database {
        Database::new(
            ValueStore::new(Arc::new(InMemoryChunkStore::new())),
            Arc::new(InMemoryRefStore::new()),
        )
    }

    fn meta(msg: &str) -> CommitMeta {
        CommitMeta::new("Ada", "ada@example.com", msg).with_timestamp_ms(0)
    }

    fn root_with(db: &Database, n: i64) -> RootValue {
        let t = Table::from_rows(
            db.values().clone(),
            Schema::new(vec![Column::key("id", ColumnKind::Int)]),
            (0..n).map(|i| (Value::Int(i), Value::Null)),
        )
        .unwrap();
        RootValue::empty().put_table(db.values(), "t", &t).unwrap()
    }

    /// c0 - c1 - c2        (main)
    ///        \
    ///         f1 - f2     (feature)
    ///               \
    ///   c2 + f2 ---- m    (merge of both)
    fn history(db: &Database) -> Vec<Commit> {
        let c0 = db.commit(&RootValue::empty(), &[], meta("c0")).unwrap();
        let c1 = db.commit(&root_with(db, 1), &[c0.clone()], meta("c1")).unwrap();
        let c2 = db.commit(&root_with(db, 2), &[c1.clone()], meta("c2")).unwrap();
        let f1 = db.commit(&root_with(db, 10), &[c1.clone()], meta("f1")).unwrap();
        let f2 = db.commit(&root_with(db, 11), &[f1.clone()], meta("f2")).unwrap();
        let m = db
            .commit(&root_with(db, 12), &[c2.clone(), f2.clone()], meta("m"))
            .unwrap();
        vec![c0, c1, c2, f1, f2, m]
    }

    // ---- roots and commits ----

    #[test]
    fn root_value_round_trip() {
        let db = db();
        let root = root_with(&db, 5);
        let h = db.write_root_value(&root).unwrap();
        assert_eq!(h, root.hash());
        assert_eq!(db.read_root_value(&h).unwrap(), root);
    }

    #[test]
    fn read_missing_commit() {
        let db = db();
        assert!(matches!(
            db.read_commit(&Hash::of(b"nope")),
            Err(DbError::RevisionNotFound(_))
        ));
    }

    // ---- branches ----

    #[test]
    fn create_branch_twice_fails() {
        let db = db();
        let c = db.commit(&RootValue::empty(), &[], meta("c")).unwrap();
        db.create_branch("main", &c).unwrap();
        assert!(matches!(db.create_branch("main", &c), Err(DbError::BranchExists(_))));
        assert_eq!(db.branch_head("main").unwrap(), Some(c));
        assert_eq!(db.branch_names().unwrap(), vec!["main"]);
    }

    #[test]
    fn fast_forward_only_moves_forward() {
        let db = db();
        let h = history(&db);
        db.create_branch("main", &h[1]).unwrap();
        db.fast_forward("main", &h[2]).unwrap();
        assert_eq!(db.branch_head("main").unwrap().unwrap(), h[2]);

        // f2 is not a descendant of c2.
        assert!(matches!(
            db.fast_forward("main", &h[4]),
            Err(DbError::NotFastForward { .. })
        ));
        db.fast_forward("main", &h[5]).unwrap();
        db.fast_forward("main", &h[5]).unwrap();
    }

    #[test]
    fn rewind_only_from_expected_head() {
        let db = db();
        let h = history(&db);
        db.create_branch("main", &h[1]).unwrap();
        db.fast_forward("main", &h[2]).unwrap();
        db.rewind_branch("main", &h[2], &h[1]).unwrap();
        assert_eq!(db.branch_head("main").unwrap().unwrap(), h[1]);

        assert!(matches!(
            db.rewind_branch("main", &h[2], &h[0]),
            Err(DbError::Ref(RefError::StaleRef { .. }))
        ));
        assert_eq!(db.branch_head("main").unwrap().unwrap(), h[1]);
    }

    #[test]
    fn tags_resolve_and_are_immutable() {
        let db = db();
        let h = history(&db);
        db.create_tag("v1", &h[2], meta("release")).unwrap();
        let spec = CommitSpec::parse("v1").unwrap();
        assert_eq!(db.resolve(&spec, None).unwrap(), h[2]);
        assert!(db.create_tag("v1", &h[3], meta("again")).is_err());
    }

    // ---- resolution ----

    #[test]
    fn resolve_walks() {
        let db = db();
        let h = history(&db);
        db.create_branch("main", &h[5]).unwrap();
        let r = |s: &str| db.resolve(&CommitSpec::parse(s).unwrap(), Some("main"));

        assert_eq!(r("HEAD").unwrap(), h[5]);
        assert_eq!(r("HEAD~1").unwrap(), h[2]);
        assert_eq!(r("HEAD^2").unwrap(), h[4]);
        assert_eq!(r("main^2~1").unwrap(), h[3]);
        assert_eq!(r("HEAD~3").unwrap(), h[0]);
        assert!(matches!(r("HEAD~4"), Err(DbError::RevisionNotFound(_))));
        assert!(matches!(r("HEAD^3"), Err(DbError::RevisionNotFound(_))));
        assert!(matches!(r("nope"), Err(DbError::RevisionNotFound(_))));
        assert_eq!(r(&h[3].hash_of().to_hex()).unwrap(), h[3]);
    }

    #[test]
    fn hash_of_non_commit_is_not_a_revision() {
        let db = db();
        let h = history(&db);
        db.create_branch("main", &h[1]).unwrap();
        let r = |s: &str| db.resolve(&CommitSpec::parse(s).unwrap(), Some("main"));

        let root = h[1].root().target_hash();
        match r(&root.to_hex()) {
            Err(DbError::RevisionNotFound(s)) => assert_eq!(s, root.to_hex()),
            other => panic!("expected RevisionNotFound, got {other:?}"),
        }
        let meta_hash = db.values().write_value(&meta("loose").to_value()).unwrap().target_hash();
        assert!(matches!(
            r(&format!("{}~1", meta_hash.to_hex())),
            Err(DbError::RevisionNotFound(_))
        ));
        assert!(matches!(
            r(&Hash::of(b"absent").to_hex()),
            Err(DbError::RevisionNotFound(_))
        ));
    }

    #[test]
    fn head_needs_a_branch() {
        let db = db();
        assert!(matches!(
            db.resolve(&CommitSpec::head(), None),
            Err(DbError::NotInitialised)
        ));
    }

    // ---- ancestry ----

    #[test]
    fn strict_ancestry() {
        let db = db();
        let h = history(&db);
        assert!(db.can_fast_forward_to(&h[0], &h[2]).unwrap());
        assert!(db.can_fast_forward_to(&h[3], &h[5]).unwrap());
        assert!(!db.can_fast_forward_to(&h[2], &h[2]).unwrap());
        assert!(!db.can_fast_forward_to(&h[2], &h[4]).unwrap());
        assert!(!db.can_fast_forward_to(&h[5], &h[0]).unwrap());
    }

    #[test]
    fn common_ancestors() {
        let db = db();
        let h = history(&db);
        assert_eq!(db.common_ancestor(&h[2], &h[4]).unwrap(), Some(h[1].clone()));
        assert_eq!(db.common_ancestor(&h[4], &h[2]).unwrap(), Some(h[1].clone()));
        assert_eq!(db.common_ancestor(&h[0], &h[5]).unwrap(), Some(h[0].clone()));
        assert_eq!(db.common_ancestor(&h[5], &h[5]).unwrap(), Some(h[5].clone()));
        assert_eq!(db.common_ancestor(&h[3], &h[5]).unwrap(), Some(h[3].clone()));
    }

    #[test]
    fn unrelated_histories() {
        let db = db();
        let a = db.commit(&RootValue::empty(), &[], meta("a")).unwrap();
        let b = db.commit(&root_with(&db, 1), &[], meta("b")).unwrap();
        assert_eq!(db.common_ancestor(&a, &b).unwrap(), None);
    }
}
