use std::sync::Arc;

use ply_value::{Sequence, Value, ValueStore};

use crate::error::{ListError, ListResult};
use crate::node::{load_node, node_item, SequenceItem};

#[derive(Clone, Debug)]
struct Frame {
    seq: Arc<Sequence>,
    idx: usize,
}

/// Outcome of [`SequenceCursor::advance`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Step {
    /// Moved within the current node.
    SameNode,
    /// Moved to the first entry of the next node at this level.
    NextNode,
    /// Moved past the last entry at this level.
    End,
}

/// A root-to-node path through a prolly tree.
///
/// The cursor addresses one entry of one node; the frames above it record
/// which child was taken at each meta level. Moving between siblings loads
/// at most one node per level.
#[derive(Clone, Debug)]
pub struct SequenceCursor {
    store: ValueStore,
    path: Vec<Frame>,
}

impl SequenceCursor {
    /// Position a cursor at leaf item `index`.
    ///
    /// `index` may equal the item count, in which case the cursor sits one
    /// past the last item of the last leaf.
    pub fn at_index(store: ValueStore, root: Arc<Sequence>, index: u64) -> ListResult<Self> {
        let len = root.num_leaves();
        if index > len {
            return Err(ListError::IndexOutOfBounds { index, len });
        }
        let mut path = Vec::with_capacity(root.level() as usize + 1);
        let mut seq = root;
        let mut remaining = index;
        loop {
            let child = match seq.as_ref() {
                Sequence::Leaf(items) => {
                    let idx = remaining.min(items.len() as u64) as usize;
                    path.push(Frame { seq, idx });
                    return Ok(Self { store, path });
                }
                Sequence::Meta { tuples, .. } => {
                    if tuples.is_empty() {
                        return Err(ListError::NotANode {
                            hash: Value::List(seq.clone()).hash(),
                            found: "empty meta node".into(),
                        });
                    }
                    let mut i = 0;
                    while i + 1 < tuples.len() && remaining >= tuples[i].num_leaves {
                        remaining -= tuples[i].num_leaves;
                        i += 1;
                    }
                    let child = load_node(&store, &tuples[i].child)?;
                    path.push(Frame { seq: seq.clone(), idx: i });
                    child
                }
            };
            seq = child;
        }
    }

    /// True while the cursor addresses an entry.
    pub fn valid(&self) -> bool {
        self.path
            .last()
            .is_some_and(|frame| frame.idx < frame.seq.len())
    }

    /// The leaf value under the cursor, if it addresses one.
    pub fn current_value(&self) -> Option<&Value> {
        let frame = self.path.last()?;
        frame.seq.values()?.get(frame.idx)
    }

    pub(crate) fn current_item(&self) -> Option<SequenceItem> {
        let frame = self.path.last()?;
        node_item(&frame.seq, frame.idx)
    }

    /// The node the cursor is in.
    pub fn node(&self) -> &Arc<Sequence> {
        &self.path[self.path.len() - 1].seq
    }

    /// Position within [`node`](Self::node).
    pub fn index_in_node(&self) -> usize {
        self.path[self.path.len() - 1].idx
    }

    /// The cursor one level up, addressing the tuple of the current node.
    pub fn parent(&self) -> Option<SequenceCursor> {
        if self.path.len() < 2 {
            return None;
        }
        Some(SequenceCursor {
            store: self.store.clone(),
            path: self.path[..self.path.len() - 1].to_vec(),
        })
    }

    pub(crate) fn advance(&mut self) -> ListResult<Step> {
        if !self.valid() {
            return Ok(Step::End);
        }
        let depth = self.path.len() - 1;
        self.path[depth].idx += 1;
        if self.path[depth].idx < self.path[depth].seq.len() {
            return Ok(Step::SameNode);
        }

        // Climb to the nearest ancestor with a next sibling.
        let mut d = depth;
        loop {
            if d == 0 {
                return Ok(Step::End);
            }
            d -= 1;
            if self.path[d].idx + 1 < self.path[d].seq.len() {
                self.path[d].idx += 1;
                break;
            }
        }

        // Descend along first children back to this cursor's level.
        for level in d..depth {
            let frame = &self.path[level];
            let tuple = frame
                .seq
                .tuples()
                .and_then(|t| t.get(frame.idx))
                .cloned()
                .ok_or_else(|| ListError::NotANode {
                    hash: Value::List(frame.seq.clone()).hash(),
                    found: "leaf above meta".into(),
                })?;
            let child = load_node(&self.store, &tuple.child)?;
            self.path[level + 1] = Frame { seq: child, idx: 0 };
        }
        Ok(Step::NextNode)
    }
}
