//! Fixed-size worker pool for async dispatch passes.
//!
//! - Unbounded queue, fire-and-forget submission
//! - No result handed back to the submitter
//! - A panicking job is logged; the worker keeps serving

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::dispatch::{install_trace_hook, panic_message, take_panic_trace};

/// One unit of work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Pool runtime statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub workers: usize,
    pub submitted: u64,
    pub completed: u64,
}

impl PoolStats {
    /// Jobs submitted but not yet finished.
    pub fn pending(&self) -> u64 {
        self.submitted.saturating_sub(self.completed)
    }
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
}

/// Handle to the pool's worker threads.
#[derive(Debug)]
pub struct WorkerPool {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    counters: Arc<Counters>,
    size: usize,
}

impl WorkerPool {
    /// Spawn `size` workers (at least one) named `{name}-{index}`.
    ///
    /// A worker that fails to spawn is logged and skipped. With no worker
    /// running, [`WorkerPool::submit`] hands every job back to the caller.
    pub fn new(size: usize, name: &str) -> Self {
        install_trace_hook();
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        let counters = Arc::new(Counters::default());

        let mut workers = Vec::with_capacity(size.max(1));
        for index in 0..size.max(1) {
            let rx = Arc::clone(&rx);
            let counters = Arc::clone(&counters);
            let spawned = thread::Builder::new()
                .name(format!("{name}-{index}"))
                .spawn(move || worker_loop(&rx, &counters));

            match spawned {
                Ok(join) => workers.push(join),
                Err(err) => warn!(worker = index, error = %err, "failed to spawn pool worker"),
            }
        }

        let size = workers.len();
        debug!(workers = size, pool = name, "worker pool started");

        Self {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            counters,
            size,
        }
    }

    /// Host parallelism, falling back to a single worker when unknown.
    pub fn default_size() -> usize {
        thread::available_parallelism().map_or(1, usize::from)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue a job. Returns it back if the pool no longer accepts work.
    pub fn submit(&self, job: Job) -> Result<(), Job> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = sender.as_ref() else {
            return Err(job);
        };

        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        tx.send(job).map_err(|mpsc::SendError(job)| {
            self.counters.submitted.fetch_sub(1, Ordering::Relaxed);
            job
        })
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.size,
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting work, let the queue drain, and join the workers.
    ///
    /// Idempotent. When called from one of the pool's own workers, that worker
    /// is left to exit on its own instead of being joined.
    pub fn shutdown(&self) {
        drop(self.sender.lock().unwrap_or_else(PoisonError::into_inner).take());

        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        let current = thread::current().id();
        for join in workers {
            if join.thread().id() == current {
                continue;
            }
            if join.join().is_err() {
                warn!("pool worker exited abnormally");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(rx: &Mutex<mpsc::Receiver<Job>>, counters: &Counters) {
    loop {
        // The guard is released before the job runs.
        let next = rx.lock().unwrap_or_else(PoisonError::into_inner).recv();
        let Ok(job) = next else {
            break;
        };

        if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(job)) {
            error!(
                panic = %panic_message(panic.as_ref()),
                trace = %take_panic_trace(),
                "pool job panicked"
            );
        }
        counters.completed.fetch_add(1, Ordering::Relaxed);
    }
}
