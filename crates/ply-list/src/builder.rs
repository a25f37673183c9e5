use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};
use ply_value::{Value, ValueStore};
use tracing::debug;

use crate::chunker::SequenceChunker;
use crate::error::ListResult;
use crate::list::List;

/// Incremental list construction from a stream of values.
pub struct ListBuilder {
    store: ValueStore,
    chunker: SequenceChunker,
    count: u64,
}

impl ListBuilder {
    pub fn new(store: ValueStore) -> Self {
        Self {
            chunker: SequenceChunker::new(store.clone()),
            store,
            count: 0,
        }
    }

    pub fn push(&mut self, value: Value) -> ListResult<()> {
        self.chunker.append(value)?;
        self.count += 1;
        Ok(())
    }

    /// Values pushed so far.
    pub fn len(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn finish(self) -> ListResult<List> {
        let root = self.chunker.done()?;
        debug!(len = self.count, level = root.level(), "list built");
        Ok(List::from_sequence(self.store, root))
    }

    /// Build a list on a background thread from values sent on the returned
    /// channel. The list is complete once the sender is dropped.
    pub fn spawn(store: ValueStore, capacity: usize) -> (Sender<Value>, JoinHandle<ListResult<List>>) {
        let (tx, rx) = bounded(capacity.max(1));
        let handle = thread::spawn(move || {
            let mut builder = ListBuilder::new(store);
            for value in rx {
                builder.push(value)?;
            }
            builder.finish()
        });
        (tx, handle)
    }
}
