use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver};
use tracing::warn;

use ply_list::List;

use crate::cancel::CancelToken;
use crate::error::{DiffError, DiffResult};
use crate::splice::Splice;
use crate::tree_diff::{diff, DiffConfig};

/// A diff running on its own thread, read as an iterator of splices.
///
/// The iterator ends after the last splice, or yields the diff's error once
/// the splices produced before it have been read. Dropping the stream
/// cancels the diff and waits for the thread to finish.
pub struct DiffStream {
    rx: Option<Receiver<Splice>>,
    cancel: CancelToken,
    handle: Option<JoinHandle<DiffResult<()>>>,
}

impl DiffStream {
    /// Start diffing `before` against `after`, buffering up to `buffer`
    /// splices ahead of the reader.
    pub fn spawn(before: List, after: List, config: DiffConfig, buffer: usize) -> Self {
        let (tx, rx) = bounded(buffer.max(1));
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let handle = thread::spawn(move || diff(&before, &after, &config, &worker_cancel, &tx));
        Self {
            rx: Some(rx),
            cancel,
            handle: Some(handle),
        }
    }

    /// Ask the worker to stop; splices already buffered are still returned.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn join(&mut self) -> DiffResult<()> {
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or(Err(DiffError::WorkerPanicked)),
            None => Ok(()),
        }
    }
}

impl Iterator for DiffStream {
    type Item = DiffResult<Splice>;

    fn next(&mut self) -> Option<Self::Item> {
        let rx = self.rx.as_ref()?;
        match rx.recv() {
            Ok(splice) => Some(Ok(splice)),
            Err(_) => {
                self.rx = None;
                self.join().err().map(Err)
            }
        }
    }
}

impl Drop for DiffStream {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.rx = None;
        if let Err(e) = self.join() {
            if !matches!(e, DiffError::Cancelled) {
                warn!(error = %e, "diff stream dropped with error");
            }
        }
    }
}
