//! Bounded worker pool
//!
//! Jobs are dispatched one by one; each launch first takes a permit from a
//! counting semaphore, so at most `capacity` jobs are in flight. Cancelling
//! the pool's token stops the dispatch loop from launching further jobs but
//! leaves running jobs alone; they observe the token at their own stage
//! boundaries.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Outcome of one pool run
#[derive(Debug)]
pub struct PoolReport<T> {
    /// Results of the jobs that ran to completion, in completion order
    pub outputs: Vec<T>,
    /// Jobs whose task panicked
    pub panicked: usize,
    /// Jobs never launched because the run was cancelled
    pub skipped: usize,
}

impl<T> Default for PoolReport<T> {
    fn default() -> Self {
        Self {
            outputs: Vec::new(),
            panicked: 0,
            skipped: 0,
        }
    }
}

/// Semaphore-gated job runner
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Creates a pool running at most `capacity` jobs at once (minimum 1)
    pub fn new(capacity: usize, cancel: CancellationToken) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            cancel,
        }
    }

    /// Maximum number of concurrent jobs
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Runs `worker` over every job and waits for all launched jobs
    ///
    /// The worker future is created on the dispatch loop and spawned onto
    /// the runtime once a permit is held. The permit is released when the
    /// job's future completes.
    pub async fn run<J, F, Fut, T>(&self, jobs: J, worker: F) -> PoolReport<T>
    where
        J: IntoIterator,
        F: Fn(J::Item) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut report = PoolReport::default();
        let mut tasks = JoinSet::new();
        let mut jobs = jobs.into_iter();
        let mut stopped = false;

        debug!(capacity = self.capacity, "dispatching jobs");

        for job in jobs.by_ref() {
            let permit = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                permit = Arc::clone(&self.semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                stopped = true;
                break;
            };

            let fut = worker(job);
            tasks.spawn(async move {
                let output = fut.await;
                drop(permit);
                output
            });
        }

        if stopped {
            report.skipped = 1 + jobs.count();
            warn!(skipped = report.skipped, "dispatch stopped, jobs not launched");
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(output) => report.outputs.push(output),
                Err(e) if e.is_panic() => {
                    error!(error = %e, "worker panicked");
                    report.panicked += 1;
                }
                Err(e) => {
                    warn!(error = %e, "worker aborted");
                    report.panicked += 1;
                }
            }
        }

        report
    }
}
