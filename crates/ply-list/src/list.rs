use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use ply_types::Hash;
use ply_value::{codec, Sequence, Value, ValueError, ValueStore};

use crate::chunker::SequenceChunker;
use crate::cursor::SequenceCursor;
use crate::error::{ListError, ListResult};
use crate::parallel::{ordered_range_map, IterConfig};
use crate::splice::splice_sequence;

/// An immutable, content-addressed list.
///
/// Every edit returns a new `List`; the receiver is left unchanged and the
/// two share all untouched subtrees.
#[derive(Clone)]
pub struct List {
    store: ValueStore,
    root: Arc<Sequence>,
}

impl List {
    /// The empty list.
    pub fn new(store: ValueStore) -> Self {
        Self {
            store,
            root: Arc::new(Sequence::empty()),
        }
    }

    /// Build a list from values in order.
    pub fn from_values(
        store: ValueStore,
        values: impl IntoIterator<Item = Value>,
    ) -> ListResult<Self> {
        let mut chunker = SequenceChunker::new(store.clone());
        for v in values {
            chunker.append(v)?;
        }
        let root = chunker.done()?;
        Ok(Self { store, root })
    }

    pub fn from_sequence(store: ValueStore, root: Arc<Sequence>) -> Self {
        Self { store, root }
    }

    /// Interpret a `Value::List` as a list handle.
    pub fn from_value(store: ValueStore, value: &Value) -> ListResult<Self> {
        match value {
            Value::List(root) => Ok(Self::from_sequence(store, root.clone())),
            other => Err(ValueError::UnexpectedType {
                expected: "List".into(),
                actual: other.type_of().to_string(),
            }
            .into()),
        }
    }

    pub fn to_value(&self) -> Value {
        Value::List(self.root.clone())
    }

    pub fn root(&self) -> &Arc<Sequence> {
        &self.root
    }

    pub fn store(&self) -> &ValueStore {
        &self.store
    }

    pub fn len(&self) -> u64 {
        self.root.num_leaves()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hash of the root node; equal lists have equal hashes.
    pub fn hash(&self) -> Hash {
        self.to_value().hash()
    }

    /// Levels above the leaves (0 for a single-leaf list).
    pub fn height(&self) -> u32 {
        self.root.level()
    }

    pub fn get(&self, index: u64) -> ListResult<Value> {
        let len = self.len();
        if index >= len {
            return Err(ListError::IndexOutOfBounds { index, len });
        }
        let cursor = SequenceCursor::at_index(self.store.clone(), self.root.clone(), index)?;
        cursor
            .current_value()
            .cloned()
            .ok_or(ListError::IndexOutOfBounds { index, len })
    }

    pub fn iter(&self) -> ListIter {
        ListIter {
            cursor: SequenceCursor::at_index(self.store.clone(), self.root.clone(), 0).ok(),
        }
    }

    /// Iterate from `index` to the end.
    pub fn iter_from(&self, index: u64) -> ListResult<ListIter> {
        let cursor = SequenceCursor::at_index(self.store.clone(), self.root.clone(), index)?;
        Ok(ListIter {
            cursor: Some(cursor),
        })
    }

    /// Visit items `start..end` in order, returning the number of encoded
    /// bytes visited.
    pub fn iter_range(
        &self,
        start: u64,
        end: u64,
        mut f: impl FnMut(&Value, u64),
    ) -> ListResult<u64> {
        let len = self.len();
        if start > end || end > len {
            return Err(ListError::InvalidRange { start, end, len });
        }
        if start == end {
            return Ok(0);
        }
        let mut cursor = SequenceCursor::at_index(self.store.clone(), self.root.clone(), start)?;
        let mut bytes = 0u64;
        let mut scratch = Vec::new();
        for index in start..end {
            let Some(value) = cursor.current_value() else {
                return Err(ListError::IndexOutOfBounds { index, len });
            };
            scratch.clear();
            codec::encode_into(&mut scratch, value);
            bytes += scratch.len() as u64;
            f(value, index);
            cursor.advance()?;
        }
        Ok(bytes)
    }

    /// Visit every item in index order, reading batches in parallel.
    ///
    /// The callback runs on the calling thread and may stop iteration early.
    pub fn iter_all(
        &self,
        config: &IterConfig,
        mut f: impl FnMut(Value, u64) -> ControlFlow<()>,
    ) -> ListResult<()> {
        let mut next_index = 0u64;
        ordered_range_map(
            self.len(),
            config,
            |range| {
                let mut batch = Vec::with_capacity((range.end - range.start) as usize);
                let bytes = self.iter_range(range.start, range.end, |v, _| batch.push(v.clone()))?;
                Ok((batch, bytes))
            },
            |batch| {
                for value in batch {
                    let index = next_index;
                    next_index += 1;
                    if f(value, index).is_break() {
                        return ControlFlow::Break(());
                    }
                }
                ControlFlow::Continue(())
            },
        )
    }

    pub fn to_vec(&self) -> ListResult<Vec<Value>> {
        self.iter().collect()
    }

    /// Remove `delete` items at `index` and insert `insert` in their place.
    pub fn splice(&self, index: u64, delete: u64, insert: Vec<Value>) -> ListResult<List> {
        let len = self.len();
        if index > len {
            return Err(ListError::IndexOutOfBounds { index, len });
        }
        match index.checked_add(delete) {
            Some(end) if end <= len => {}
            _ => {
                return Err(ListError::InvalidRange {
                    start: index,
                    end: index.saturating_add(delete),
                    len,
                })
            }
        }
        let root = splice_sequence(&self.store, &self.root, index, delete, insert)?;
        Ok(Self::from_sequence(self.store.clone(), root))
    }

    pub fn insert(&self, index: u64, value: Value) -> ListResult<List> {
        self.splice(index, 0, vec![value])
    }

    pub fn remove(&self, index: u64) -> ListResult<List> {
        let len = self.len();
        if index >= len {
            return Err(ListError::IndexOutOfBounds { index, len });
        }
        self.splice(index, 1, Vec::new())
    }

    pub fn set(&self, index: u64, value: Value) -> ListResult<List> {
        let len = self.len();
        if index >= len {
            return Err(ListError::IndexOutOfBounds { index, len });
        }
        self.splice(index, 1, vec![value])
    }

    pub fn append(&self, values: Vec<Value>) -> ListResult<List> {
        self.splice(self.len(), 0, values)
    }

    /// This list followed by `other`.
    ///
    /// Chunk boundaries depend on content, so the seam cannot be joined
    /// by grafting nodes. The items of `other` are read and re-chunked
    /// onto the end of this list, which costs O(len(other)). Concat onto
    /// an empty list reuses `other`'s tree as is. Put the longer list on
    /// the left when the order is free.
    pub fn concat(&self, other: &List) -> ListResult<List> {
        if other.is_empty() {
            return Ok(self.clone());
        }
        if self.is_empty() {
            return Ok(Self::from_sequence(self.store.clone(), other.root.clone()));
        }
        self.append(other.to_vec()?)
    }
}

impl PartialEq for List {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

impl Eq for List {}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List")
            .field("len", &self.len())
            .field("height", &self.height())
            .field("hash", &self.hash())
            .finish()
    }
}

/// Sequential iterator over a list's items.
pub struct ListIter {
    cursor: Option<SequenceCursor>,
}

impl Iterator for ListIter {
    type Item = ListResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor.as_mut()?;
        let value = cursor.current_value()?.clone();
        if let Err(e) = cursor.advance() {
            self.cursor = None;
            return Some(Err(e));
        }
        Some(Ok(value))
    }
}
