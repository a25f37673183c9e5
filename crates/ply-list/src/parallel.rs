//! Ordered parallel iteration.
//!
//! [`ordered_range_map`] splits `0..total` into batches, processes them on a
//! fixed pool of worker threads and hands the results to a consumer on the
//! calling thread in index order. Batch length adapts so that each batch
//! reads roughly [`IterConfig::target_batch_bytes`].

use std::ops::{ControlFlow, Range};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Upper bound for a single batch, whatever the estimator suggests.
const MAX_BATCH_LEN: u64 = 1 << 20;

/// Parallel iteration settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterConfig {
    /// Worker threads (default: 6).
    pub concurrency: usize,
    /// Bytes each batch should read (default: 8 MiB).
    pub target_batch_bytes: u64,
    /// Length of the first batches, before any estimate exists (default: 1000).
    pub initial_batch_len: u64,
}

impl Default for IterConfig {
    fn default() -> Self {
        Self {
            concurrency: 6,
            target_batch_bytes: 8 * 1024 * 1024,
            initial_batch_len: 1000,
        }
    }
}

/// Shared batch-length estimate.
///
/// Workers report each completed batch; the next batch length is scaled so
/// that it would have read the target byte count.
#[derive(Debug)]
pub struct BatchEstimator {
    estimate: AtomicU64,
    target_bytes: u64,
}

impl BatchEstimator {
    pub fn new(config: &IterConfig) -> Self {
        Self {
            estimate: AtomicU64::new(config.initial_batch_len.clamp(1, MAX_BATCH_LEN)),
            target_bytes: config.target_batch_bytes.max(1),
        }
    }

    /// Length to request for the next batch.
    pub fn next_len(&self) -> u64 {
        self.estimate.load(Ordering::Relaxed).max(1)
    }

    /// Record a finished batch.
    ///
    /// Batches cut short by the end of the range say nothing about density
    /// and are ignored. A batch that read nothing doubles the estimate.
    pub fn record(&self, requested: u64, actual: u64, bytes: u64) {
        if actual == 0 || actual != requested {
            return;
        }
        let next = if bytes == 0 {
            requested.saturating_mul(2)
        } else {
            let scaled = requested as u128 * self.target_bytes as u128 / bytes as u128;
            scaled.min(u64::MAX as u128) as u64
        };
        self.estimate
            .store(next.clamp(1, MAX_BATCH_LEN), Ordering::Relaxed);
    }
}

struct Job<T, E> {
    range: Range<u64>,
    requested: u64,
    reply: Sender<Result<T, E>>,
}

/// Sets the shared cancel flag when the consumer leaves, however it leaves.
struct CancelOnDrop<'a>(&'a AtomicBool);

impl Drop for CancelOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Map `work` over batches of `0..total` in parallel, consuming results in
/// order.
///
/// `work` returns the batch result and the number of bytes it read. The
/// consumer runs on the calling thread and may stop early with
/// `ControlFlow::Break`. The first error, in batch order, is returned. All
/// worker threads have exited when this returns; a panic in `work` is
/// propagated after the others have drained.
pub fn ordered_range_map<T, E, W, C>(
    total: u64,
    config: &IterConfig,
    work: W,
    mut consume: C,
) -> Result<(), E>
where
    T: Send,
    E: Send,
    W: Fn(Range<u64>) -> Result<(T, u64), E> + Sync,
    C: FnMut(T) -> ControlFlow<()>,
{
    if total == 0 {
        return Ok(());
    }
    let concurrency = config.concurrency.max(1);
    let estimator = BatchEstimator::new(config);
    let cancelled = AtomicBool::new(false);
    let (job_tx, job_rx) = bounded::<Job<T, E>>(concurrency);
    let (order_tx, order_rx) = bounded::<Receiver<Result<T, E>>>(concurrency);

    thread::scope(|s| {
        let estimator = &estimator;
        let cancelled = &cancelled;
        let work = &work;

        s.spawn(move || {
            let mut start = 0u64;
            while start < total && !cancelled.load(Ordering::Acquire) {
                let requested = estimator.next_len();
                let end = start.saturating_add(requested).min(total);
                let (reply, result) = bounded(1);
                if order_tx.send(result).is_err() {
                    break;
                }
                let job = Job {
                    range: start..end,
                    requested,
                    reply,
                };
                if job_tx.send(job).is_err() {
                    break;
                }
                start = end;
            }
        });

        for _ in 0..concurrency {
            let jobs = job_rx.clone();
            s.spawn(move || {
                for job in jobs.iter() {
                    if cancelled.load(Ordering::Acquire) {
                        continue;
                    }
                    let len = job.range.end - job.range.start;
                    let result = work(job.range).map(|(value, bytes)| {
                        estimator.record(job.requested, len, bytes);
                        value
                    });
                    let _ = job.reply.send(result);
                }
            });
        }
        drop(job_rx);

        let _cancel = CancelOnDrop(cancelled);
        let mut outcome = Ok(());
        for result in order_rx.iter() {
            match result.recv() {
                Ok(Ok(value)) => {
                    if consume(value).is_break() {
                        trace!("ordered_range_map stopped by consumer");
                        break;
                    }
                }
                Ok(Err(e)) => {
                    outcome = Err(e);
                    break;
                }
                // The worker dropped the job without replying: it panicked.
                Err(_) => break,
            }
        }
        cancelled.store(true, Ordering::Release);
        drop(order_rx);
        outcome
    })
}
