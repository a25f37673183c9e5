//! Incremental edits.
//!
//! An edit re-chunks from the start of the node containing the edit point
//! and keeps going until a new chunk boundary lines up with an old node
//! boundary. The replaced nodes' tuples are then spliced into the parent
//! level the same way, up to the root.

use std::sync::Arc;

use ply_value::{Sequence, Value, ValueStore};
use tracing::trace;

use crate::chunker::{Chunked, LevelChunker, SequenceChunker};
use crate::cursor::{SequenceCursor, Step};
use crate::error::ListResult;
use crate::node::{collapse, node_item, SequenceItem};

/// Replace `delete` items at `index` with `insert`, returning the new root.
///
/// Bounds are checked by the caller.
pub(crate) fn splice_sequence(
    store: &ValueStore,
    root: &Arc<Sequence>,
    index: u64,
    delete: u64,
    insert: Vec<Value>,
) -> ListResult<Arc<Sequence>> {
    if delete == 0 && insert.is_empty() {
        return Ok(root.clone());
    }
    trace!(index, delete, insert = insert.len(), "splice");
    let cursor = SequenceCursor::at_index(store.clone(), root.clone(), index)?;
    let items = insert.into_iter().map(SequenceItem::Value).collect();
    splice_level(store, cursor, delete, items)
}

fn splice_level(
    store: &ValueStore,
    mut cursor: SequenceCursor,
    delete: u64,
    insert: Vec<SequenceItem>,
) -> ListResult<Arc<Sequence>> {
    let node = cursor.node().clone();
    let level = node.level();
    let parent = cursor.parent();
    let offset = cursor.index_in_node();

    let mut chunker = LevelChunker::new(store.clone(), level);
    for i in 0..offset {
        if let Some(item) = node_item(&node, i) {
            chunker.push(item)?;
        }
    }
    for item in insert {
        chunker.push(item)?;
    }

    // Old nodes at this level whose content has been consumed.
    let mut crossed = 0u64;
    for _ in 0..delete {
        match cursor.advance()? {
            Step::SameNode => {}
            Step::NextNode => crossed += 1,
            Step::End => break,
        }
    }

    let consumed = loop {
        if !cursor.valid() {
            break crossed + 1;
        }
        if cursor.index_in_node() == 0 && chunker.is_fresh() {
            break crossed;
        }
        if let Some(item) = cursor.current_item() {
            chunker.push(item)?;
        }
        if cursor.advance()? == Step::NextNode {
            crossed += 1;
        }
    };

    let chunks = chunker.finish()?;
    match parent {
        Some(parent) => {
            let tuples = chunks
                .into_iter()
                .map(|c| SequenceItem::Tuple(c.tuple))
                .collect();
            splice_level(store, parent, consumed, tuples)
        }
        None => finish_root(store, level, chunks),
    }
}

fn finish_root(store: &ValueStore, level: u32, mut chunks: Vec<Chunked>) -> ListResult<Arc<Sequence>> {
    if chunks.len() <= 1 {
        return match chunks.pop() {
            Some(only) => collapse(store, only.seq),
            None => Ok(Arc::new(Sequence::empty())),
        };
    }
    let mut up = SequenceChunker::at_level(store.clone(), level + 1);
    for chunk in chunks {
        up.append_tuple(chunk.tuple)?;
    }
    up.done()
}
