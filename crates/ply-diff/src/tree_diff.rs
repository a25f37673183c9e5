//! Indexed prolly-tree diff.
//!
//! Both trees are walked top-down. At each step the taller side is replaced
//! by the concatenation of its children, so the two sides are compared at
//! the same level. Meta levels are compared by child hash; only differing
//! child ranges are loaded and compared further.

use std::sync::Arc;

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use ply_list::{List, ListError};
use ply_types::Hash;
use ply_value::{Sequence, Value, ValueStore};

use crate::cancel::CancelToken;
use crate::error::{DiffError, DiffResult};
use crate::splice::{calc_splices, Splice};

/// Edit-script cell limit used below the top level.
pub const DEFAULT_MAX_SPLICE_MATRIX_SIZE: u64 = 20_000_000;

/// Diff settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Largest `rows * cols` region handed to the edit-script algorithm at
    /// the top level; larger regions are reported as one splice.
    pub max_splice_matrix_size: u64,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            max_splice_matrix_size: DEFAULT_MAX_SPLICE_MATRIX_SIZE,
        }
    }
}

/// Diff `before` against `after`, sending splices to `sink` in order.
///
/// Fails with `Cancelled` if `cancel` is set or the receiving side of `sink`
/// is dropped.
pub fn diff(
    before: &List,
    after: &List,
    config: &DiffConfig,
    cancel: &CancelToken,
    sink: &Sender<Splice>,
) -> DiffResult<()> {
    let mut emit = |s: Splice| sink.send(s).is_ok();
    run(before, after, config, cancel, &mut emit)
}

/// Diff `before` against `after` and collect every splice.
pub fn diff_all(before: &List, after: &List, config: &DiffConfig) -> DiffResult<Vec<Splice>> {
    let mut out = Vec::new();
    let mut emit = |s: Splice| {
        out.push(s);
        true
    };
    run(before, after, config, &CancelToken::new(), &mut emit)?;
    Ok(out)
}

fn run(
    before: &List,
    after: &List,
    config: &DiffConfig,
    cancel: &CancelToken,
    emit: &mut dyn FnMut(Splice) -> bool,
) -> DiffResult<()> {
    if before.hash() == after.hash() {
        return Ok(());
    }
    let mut differ = Differ {
        before: before.store(),
        after: after.store(),
        cancel,
        emit,
    };
    if before.is_empty() {
        return differ.send(Splice::new(0, 0, after.len(), 0));
    }
    if after.is_empty() {
        return differ.send(Splice::new(0, before.len(), 0, 0));
    }
    debug!(
        before_len = before.len(),
        after_len = after.len(),
        "diff lists"
    );
    differ.diff_level(
        before.root().clone(),
        0,
        after.root().clone(),
        0,
        config.max_splice_matrix_size,
    )
}

struct Differ<'a, F: ?Sized> {
    before: &'a ValueStore,
    after: &'a ValueStore,
    cancel: &'a CancelToken,
    emit: &'a mut F,
}

impl<F> Differ<'_, F>
where
    F: FnMut(Splice) -> bool + ?Sized,
{
    fn send(&mut self, splice: Splice) -> DiffResult<()> {
        if self.cancel.is_cancelled() || !(self.emit)(splice) {
            return Err(DiffError::Cancelled);
        }
        Ok(())
    }

    fn diff_level(
        &mut self,
        last: Arc<Sequence>,
        last_offset: u64,
        current: Arc<Sequence>,
        current_offset: u64,
        max_matrix_size: u64,
    ) -> DiffResult<()> {
        if self.cancel.is_cancelled() {
            return Err(DiffError::Cancelled);
        }
        if last.level() > current.level() {
            let lowered = composite_children(self.before, &last, 0, last.len() as u64)?;
            return self.diff_level(lowered, last_offset, current, current_offset, max_matrix_size);
        }
        if current.level() > last.level() {
            let lowered = composite_children(self.after, &current, 0, current.len() as u64)?;
            return self.diff_level(last, last_offset, lowered, current_offset, max_matrix_size);
        }

        let splices = calc_splices(&item_hashes(&last), &item_hashes(&current), max_matrix_size);
        for s in splices {
            if last.is_leaf() {
                self.send(Splice::new(
                    last_offset + s.splice_at,
                    s.delete_count,
                    s.insert_count,
                    current_offset + s.insert_from,
                ))?;
                continue;
            }

            let remove_begin = leaves_before(&last, s.splice_at);
            let add_begin = leaves_before(&current, s.insert_from);

            if s.delete_count == 0 || s.insert_count == 0 {
                // Whole subtrees added or removed: map straight to leaf
                // coordinates.
                let remove_end = leaves_before(&last, s.splice_at + s.delete_count);
                let add_end = leaves_before(&current, s.insert_from + s.insert_count);
                self.send(Splice::new(
                    last_offset + remove_begin,
                    remove_end - remove_begin,
                    add_end - add_begin,
                    current_offset + add_begin,
                ))?;
                continue;
            }

            trace!(
                level = last.level(),
                at = s.splice_at,
                removed = s.delete_count,
                added = s.insert_count,
                "descend into changed children"
            );
            let last_child = composite_children(self.before, &last, s.splice_at, s.delete_count)?;
            let current_child =
                composite_children(self.after, &current, s.insert_from, s.insert_count)?;
            self.diff_level(
                last_child,
                last_offset + remove_begin,
                current_child,
                current_offset + add_begin,
                DEFAULT_MAX_SPLICE_MATRIX_SIZE,
            )?;
        }
        Ok(())
    }
}

/// Comparison keys for a node's entries: item hashes at leaves, child
/// hashes at meta levels.
fn item_hashes(seq: &Sequence) -> Vec<Hash> {
    match seq {
        Sequence::Leaf(items) => items.iter().map(Value::hash).collect(),
        Sequence::Meta { tuples, .. } => tuples.iter().map(|t| t.child.target_hash()).collect(),
    }
}

/// Leaf items beneath the first `idx` entries of `seq`.
fn leaves_before(seq: &Sequence, idx: u64) -> u64 {
    match seq {
        Sequence::Leaf(_) => idx,
        Sequence::Meta { tuples, .. } => tuples
            .iter()
            .take(idx as usize)
            .map(|t| t.num_leaves)
            .sum(),
    }
}

/// Load children `start..start + len` of a meta node and concatenate them
/// into one node one level down.
fn composite_children(
    store: &ValueStore,
    seq: &Sequence,
    start: u64,
    len: u64,
) -> DiffResult<Arc<Sequence>> {
    let (level, tuples) = match seq {
        Sequence::Meta { level, tuples } => (*level, tuples),
        Sequence::Leaf(_) => return Ok(Arc::new(seq.clone())),
    };
    let start = start as usize;
    let end = (start + len as usize).min(tuples.len());
    let hashes: Vec<Hash> = tuples[start..end]
        .iter()
        .map(|t| t.child.target_hash())
        .collect();
    let children = store.read_values(&hashes)?;

    let mut values = Vec::new();
    let mut metas = Vec::new();
    for (child, hash) in children.into_iter().zip(&hashes) {
        let node = match child {
            Value::List(node) => node,
            other => {
                return Err(ListError::NotANode {
                    hash: *hash,
                    found: other.kind_name().to_string(),
                }
                .into())
            }
        };
        match node.as_ref() {
            Sequence::Leaf(items) => values.extend(items.iter().cloned()),
            Sequence::Meta { tuples, .. } => metas.extend(tuples.iter().cloned()),
        }
    }
    if level == 1 {
        Ok(Arc::new(Sequence::Leaf(values)))
    } else {
        Ok(Arc::new(Sequence::Meta {
            level: level - 1,
            tuples: metas,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::apply_splices;
    use ply_store::InMemoryChunkStore;
    use ply_value::ChunkConfig;
    use proptest::prelude::*;

    fn store() -> ValueStore {
        ValueStore::with_config(
            Arc::new(InMemoryChunkStore::new()),
            ChunkConfig {
                window: 8,
                pattern_bits: 6,
            },
        )
    }

    fn list(store: &ValueStore, items: &[i64]) -> List {
        List::from_values(store.clone(), items.iter().copied().map(Value::Int)).unwrap()
    }

    fn ints(items: &[i64]) -> Vec<Value> {
        items.iter().copied().map(Value::Int).collect()
    }

    // ---- shortcuts ----

    #[test]
    fn equal_lists_have_no_splices() {
        let s = store();
        let items: Vec<i64> = (0..1000).collect();
        let a = list(&s, &items);
        let b = list(&s, &items);
        assert!(diff_all(&a, &b, &DiffConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn empty_before_is_one_insert() {
        let s = store();
        let a = list(&s, &[]);
        let b = list(&s, &[1, 2, 3]);
        assert_eq!(
            diff_all(&a, &b, &DiffConfig::default()).unwrap(),
            vec![Splice::new(0, 0, 3, 0)]
        );
    }

    #[test]
    fn empty_after_is_one_delete() {
        let s = store();
        let a = list(&s, &[1, 2, 3, 4]);
        let b = list(&s, &[]);
        assert_eq!(
            diff_all(&a, &b, &DiffConfig::default()).unwrap(),
            vec![Splice::new(0, 4, 0, 0)]
        );
    }

    // ---- tree walk ----

    #[test]
    fn single_change_in_large_list() {
        let s = store();
        let items: Vec<i64> = (0..5000).collect();
        let a = list(&s, &items);
        let b = a.set(2500, Value::from("x")).unwrap();
        assert!(a.height() > 0);
        assert_eq!(
            diff_all(&a, &b, &DiffConfig::default()).unwrap(),
            vec![Splice::new(2500, 1, 1, 2500)]
        );
    }

    #[test]
    fn different_heights() {
        let s = store();
        let short = list(&s, &[1, 2, 3]);
        let items: Vec<i64> = (0..3000).collect();
        let tall = list(&s, &items);
        let splices = diff_all(&short, &tall, &DiffConfig::default()).unwrap();
        let rebuilt = apply_splices(&ints(&[1, 2, 3]), &tall.to_vec().unwrap(), &splices);
        assert_eq!(rebuilt, tall.to_vec().unwrap());
    }

    #[test]
    fn splices_are_ordered() {
        let s = store();
        let items: Vec<i64> = (0..4000).collect();
        let a = list(&s, &items);
        let b = a
            .set(10, Value::Int(-1))
            .and_then(|l| l.remove(2000))
            .and_then(|l| l.insert(3500, Value::Int(-2)))
            .unwrap();
        let splices = diff_all(&a, &b, &DiffConfig::default()).unwrap();
        assert!(splices.windows(2).all(|w| w[0].splice_at < w[1].splice_at));
        assert_eq!(splices.len(), 3);
    }

    #[test]
    fn tiny_matrix_gives_coarse_but_valid_splices() {
        // Default chunking keeps eight items in a single leaf.
        let s = ValueStore::new(Arc::new(InMemoryChunkStore::new()));
        let before = [1, 2, 3, 4, 5, 6, 7, 8];
        let after = [1, 20, 3, 40, 5, 60, 7, 8];
        let a = list(&s, &before);
        let b = list(&s, &after);
        let config = DiffConfig {
            max_splice_matrix_size: 1,
        };
        let splices = diff_all(&a, &b, &config).unwrap();
        assert_eq!(splices, vec![Splice::new(1, 5, 5, 1)]);
    }

    // ---- cancellation ----

    #[test]
    fn cancelled_token_stops_diff() {
        let s = store();
        let a = list(&s, &[1, 2, 3]);
        let b = list(&s, &[1, 9, 3]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let (tx, _rx) = crossbeam_channel::unbounded();
        assert!(matches!(
            diff(&a, &b, &DiffConfig::default(), &cancel, &tx),
            Err(DiffError::Cancelled)
        ));
    }

    #[test]
    fn dropped_receiver_cancels() {
        let s = store();
        let a = list(&s, &[1, 2, 3]);
        let b = list(&s, &[1, 9, 3]);
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(rx);
        assert!(matches!(
            diff(&a, &b, &DiffConfig::default(), &CancelToken::new(), &tx),
            Err(DiffError::Cancelled)
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(40))]

        #[test]
        fn splices_rebuild_after(
            before in prop::collection::vec(0i64..40, 0..400),
            after in prop::collection::vec(0i64..40, 0..400),
        ) {
            let s = store();
            let a = list(&s, &before);
            let b = list(&s, &after);
            let splices = diff_all(&a, &b, &DiffConfig::default()).unwrap();
            prop_assert!(splices.windows(2).all(|w| w[0].splice_at + w[0].delete_count <= w[1].splice_at));
            prop_assert_eq!(apply_splices(&ints(&before), &ints(&after), &splices), ints(&after));
        }

        #[test]
        fn list_against_itself_is_empty(items in prop::collection::vec(any::<i64>(), 0..600)) {
            let s = store();
            let a = list(&s, &items);
            let rebuilt = list(&s, &items);
            prop_assert!(diff_all(&a, &a, &DiffConfig::default()).unwrap().is_empty());
            prop_assert!(diff_all(&a, &rebuilt, &DiffConfig::default()).unwrap().is_empty());
            if !items.is_empty() {
                let round_trip = a.set(0, Value::from("x")).and_then(|l| l.set(0, Value::Int(items[0]))).unwrap();
                prop_assert!(diff_all(&a, &round_trip, &DiffConfig::default()).unwrap().is_empty());
            }
        }

        #[test]
        fn coarse_splices_rebuild_after(
            before in prop::collection::vec(0i64..40, 1..400),
            after in prop::collection::vec(0i64..40, 1..400),
        ) {
            let s = store();
            let a = list(&s, &before);
            let b = list(&s, &after);
            let config = DiffConfig { max_splice_matrix_size: 4 };
            let splices = diff_all(&a, &b, &config).unwrap();
            prop_assert_eq!(apply_splices(&ints(&before), &ints(&after), &splices), ints(&after));
        }
    }
}
