//! Tree node helpers shared by the chunker, cursor and splice code.

use std::sync::Arc;

use ply_value::{codec, MetaTuple, Ref, Sequence, Value, ValueStore};
use tracing::trace;

use crate::error::{ListError, ListResult};

/// One entry of a node at any level: a leaf value or a meta tuple.
#[derive(Clone, Debug)]
pub(crate) enum SequenceItem {
    Value(Value),
    Tuple(MetaTuple),
}

impl SequenceItem {
    /// Bytes fed to the rolling hasher for this item.
    ///
    /// Leaf values contribute their encoding, meta tuples their child hash.
    pub(crate) fn boundary_bytes(&self, buf: &mut Vec<u8>) {
        match self {
            SequenceItem::Value(v) => codec::encode_into(buf, v),
            SequenceItem::Tuple(t) => buf.extend_from_slice(t.child.target_hash().as_bytes()),
        }
    }
}

/// Entry `idx` of `node` as an owned item.
pub(crate) fn node_item(node: &Sequence, idx: usize) -> Option<SequenceItem> {
    match node {
        Sequence::Leaf(items) => items.get(idx).cloned().map(SequenceItem::Value),
        Sequence::Meta { tuples, .. } => tuples.get(idx).cloned().map(SequenceItem::Tuple),
    }
}

/// Assemble a node at `level` from items of the matching kind.
pub(crate) fn build_node(level: u32, items: Vec<SequenceItem>) -> Sequence {
    if level == 0 {
        let values = items
            .into_iter()
            .filter_map(|item| match item {
                SequenceItem::Value(v) => Some(v),
                SequenceItem::Tuple(_) => None,
            })
            .collect();
        Sequence::Leaf(values)
    } else {
        let tuples = items
            .into_iter()
            .filter_map(|item| match item {
                SequenceItem::Tuple(t) => Some(t),
                SequenceItem::Value(_) => None,
            })
            .collect();
        Sequence::Meta { level, tuples }
    }
}

/// Resolve a child ref to the node it points at.
pub fn load_node(store: &ValueStore, child: &Ref) -> ListResult<Arc<Sequence>> {
    trace!(hash = %child.target_hash().short_hex(), "load node");
    match store.read_value(&child.target_hash())? {
        Value::List(seq) => Ok(seq),
        other => Err(ListError::NotANode {
            hash: child.target_hash(),
            found: other.kind_name().to_string(),
        }),
    }
}

/// Replace a meta root holding a single child by that child, repeatedly.
pub(crate) fn collapse(store: &ValueStore, mut root: Arc<Sequence>) -> ListResult<Arc<Sequence>> {
    loop {
        let only_child = match root.as_ref() {
            Sequence::Meta { tuples, .. } if tuples.len() == 1 => tuples[0].child.clone(),
            _ => return Ok(root),
        };
        root = load_node(store, &only_child)?;
    }
}
