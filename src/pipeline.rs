//! Concurrent Collection Pipeline
//!
//! Three stages connected by channels:
//!
//! ```text
//!  source(items) ──► WorkerPool::gather (K workers) ──► push (task per record) ──► drain
//!    bounded             bounded parallelism              unbounded parallelism
//! ```
//!
//! - **Source** fills a channel sized to the item count and closes it.
//! - **Gather** runs a fixed pool of `min(K, N)` workers that pull items until
//!   the source is exhausted. This is the only concurrency bound in the
//!   pipeline: remote statistics calls are the expensive part.
//! - **Push** spawns one task per record to update the instrument cache.
//! - **Drain** waits for every push task, so a tick finishes only after all
//!   of its records were handled.
//!
//! Failures and panics are contained per item: they are logged and the item
//! is dropped, the rest of the batch continues. Workers are owned by a
//! [`JoinSet`], so a failing item never leaves a worker unjoined.

use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// Default bound on concurrent gather workers
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Stage A: queue all items on a closed channel
pub fn source<T>(items: Vec<T>) -> mpsc::Receiver<T>
where
    T: Send + 'static,
{
    let (tx, rx) = mpsc::channel(items.len().max(1));
    for item in items {
        // Capacity covers every item and the receiver is alive
        if tx.try_send(item).is_err() {
            error!("Pipeline source channel rejected an item");
        }
    }
    rx
}

/// Fixed-size pool of gather workers
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    max_workers: usize,
}

impl WorkerPool {
    /// `max_workers` is clamped to at least one
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Stage B: compute a record per item with at most `max_workers` in flight
    ///
    /// Items whose computation fails or panics are logged under `stage` and
    /// dropped. The returned channel closes once every worker has finished.
    pub fn gather<T, R, E, F, Fut>(
        &self,
        stage: &'static str,
        input: mpsc::Receiver<T>,
        work: F,
    ) -> mpsc::UnboundedReceiver<R>
    where
        T: Send + 'static,
        R: Send + 'static,
        E: std::fmt::Display + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let workers = self.max_workers.min(input.max_capacity());
        let input = Arc::new(Mutex::new(input));
        let work = Arc::new(work);

        tokio::spawn(async move {
            let mut set = JoinSet::new();
            for worker in 0..workers {
                let input = Arc::clone(&input);
                let work = Arc::clone(&work);
                let tx = tx.clone();
                set.spawn(async move {
                    loop {
                        let item = input.lock().await.recv().await;
                        let Some(item) = item else { break };

                        let outcome = AssertUnwindSafe(async { work(item).await })
                            .catch_unwind()
                            .await;
                        match outcome {
                            Ok(Ok(record)) => {
                                if tx.send(record).is_err() {
                                    debug!(stage, worker, "Gather output closed early");
                                }
                            }
                            Ok(Err(e)) => {
                                warn!(stage, worker, error = %e, "Dropping item after gather failure");
                            }
                            Err(panic) => {
                                error!(
                                    stage,
                                    worker,
                                    panic = %panic_message(panic.as_ref()),
                                    "Recovered from panic in gather worker"
                                );
                            }
                        }
                    }
                });
            }
            drop(tx);

            while let Some(joined) = set.join_next().await {
                if let Err(e) = joined {
                    error!(stage, error = %e, "Gather worker terminated abnormally");
                }
            }
        });

        rx
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORKERS)
    }
}

/// Stage C: hand every record to `sink` on its own task
///
/// `sink` returns the entity ID on success; IDs are emitted on the returned
/// channel, which closes after every push task has finished.
pub fn push<R, E, F>(
    stage: &'static str,
    mut input: mpsc::UnboundedReceiver<R>,
    sink: F,
) -> mpsc::UnboundedReceiver<String>
where
    R: Send + 'static,
    E: std::fmt::Display + Send + 'static,
    F: Fn(R) -> Result<String, E> + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = Arc::new(sink);

    tokio::spawn(async move {
        let mut set = JoinSet::new();
        while let Some(record) = input.recv().await {
            let sink = Arc::clone(&sink);
            let tx = tx.clone();
            set.spawn(async move {
                match std::panic::catch_unwind(AssertUnwindSafe(|| sink(record))) {
                    Ok(Ok(id)) => {
                        if tx.send(id).is_err() {
                            debug!(stage, "Push output closed early");
                        }
                    }
                    Ok(Err(e)) => {
                        warn!(stage, error = %e, "Dropping record after push failure");
                    }
                    Err(panic) => {
                        error!(
                            stage,
                            panic = %panic_message(panic.as_ref()),
                            "Recovered from panic in push worker"
                        );
                    }
                }
            });
        }
        drop(tx);

        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                error!(stage, error = %e, "Push worker terminated abnormally");
            }
        }
    });

    rx
}

/// Consume a result channel to completion, returning the IDs it carried
pub async fn drain(mut results: mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut ids = Vec::new();
    while let Some(id) = results.recv().await {
        ids.push(id);
    }
    ids
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
