//! Worker pool — a bounded, elastic set of threads running dispatched jobs.
//!
//! Everything the hub dispatches — listener callbacks, service handlers,
//! integration work — runs here, never on the calling thread, so one slow
//! integration cannot stall the rest of the process.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use tracing::{debug, error, warn};

use homehub_domain::error::HubError;

/// Minimum number of workers kept alive.
///
/// A blocking service call issued from a worker thread parks that worker
/// until the dispatched handler finishes; with fewer than two workers that
/// would deadlock the pool.
pub const MIN_WORKERS: usize = 2;

/// A unit of work dispatched onto the pool.
pub struct Job {
    label: String,
    run: Box<dyn FnOnce() + Send + 'static>,
}

impl Job {
    /// Package a closure for the pool. The label identifies the job in
    /// logs when it is rejected or panics.
    pub fn new(label: impl Into<String>, run: impl FnOnce() + Send + 'static) -> Self {
        Self {
            label: label.into(),
            run: Box::new(run),
        }
    }

    /// Label given at construction.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Error returned when the pool can no longer accept work.
#[derive(Debug, thiserror::Error)]
#[error("worker pool is shutting down, dropped job `{rejected}`")]
pub struct PoolClosed {
    /// Label of the rejected job.
    pub rejected: String,
}

impl From<PoolClosed> for HubError {
    fn from(err: PoolClosed) -> Self {
        Self::PoolUnavailable(err.to_string())
    }
}

/// Elastic pool of long-lived worker threads pulling from one shared FIFO
/// queue (no priorities).
///
/// The pool starts at a configured size and grows one worker at a time as
/// the bootstrap engine loads components expected to perform blocking
/// device I/O.
pub struct WorkerPool {
    intake: Mutex<Option<Sender<Job>>>,
    queue: Receiver<Job>,
    exited_tx: Sender<()>,
    exited_rx: Receiver<()>,
    live: AtomicUsize,
    spawned: AtomicUsize,
}

impl WorkerPool {
    /// Create a pool with `initial_workers` threads (clamped to
    /// [`MIN_WORKERS`]).
    #[must_use]
    pub fn new(initial_workers: usize) -> Self {
        let (intake, queue) = unbounded();
        let (exited_tx, exited_rx) = unbounded();
        let pool = Self {
            intake: Mutex::new(Some(intake)),
            queue,
            exited_tx,
            exited_rx,
            live: AtomicUsize::new(0),
            spawned: AtomicUsize::new(0),
        };
        for _ in 0..initial_workers.max(MIN_WORKERS) {
            pool.add_worker();
        }
        pool
    }

    /// Number of live workers.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Jobs queued but not yet picked up by a worker.
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.queue.len()
    }

    /// Grow the pool by one worker thread.
    ///
    /// Called by the bootstrap engine as qualifying components finish
    /// setup, keeping capacity proportional to the number of integrations
    /// likely to block on device I/O.
    pub fn add_worker(&self) {
        let queue = self.queue.clone();
        let exited = self.exited_tx.clone();
        let n = self.spawned.fetch_add(1, Ordering::SeqCst);
        let spawn = std::thread::Builder::new()
            .name(format!("homehub-worker-{n}"))
            .spawn(move || {
                // Exits once the intake sender is dropped *and* the queue
                // is drained, so no accepted job is ever lost.
                while let Ok(job) = queue.recv() {
                    let Job { label, run } = job;
                    if catch_unwind(AssertUnwindSafe(run)).is_err() {
                        error!(job = %label, "job panicked on worker thread");
                    }
                }
                let _ = exited.send(());
            });
        match spawn {
            Ok(_handle) => {
                let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(workers = live, "added worker thread");
            }
            Err(err) => error!(%err, "failed to spawn worker thread"),
        }
    }

    /// Hand a job to the pool. Jobs run in submission order; the call
    /// returns immediately.
    ///
    /// # Errors
    ///
    /// Returns [`PoolClosed`] once [`block_till_done`](Self::block_till_done)
    /// has begun. The rejected job is logged, never silently dropped.
    pub fn submit(&self, job: Job) -> Result<(), PoolClosed> {
        let intake = self.intake.lock().unwrap_or_else(PoisonError::into_inner);
        match intake.as_ref() {
            Some(sender) => sender.send(job).map_err(|err| {
                let rejected = err.into_inner().label;
                warn!(job = %rejected, "job dropped, worker pool queue disconnected");
                PoolClosed { rejected }
            }),
            None => {
                warn!(job = %job.label, "job dropped, worker pool is shutting down");
                Err(PoolClosed {
                    rejected: job.label,
                })
            }
        }
    }

    /// Stop accepting work, let workers drain the queue, and wait for them
    /// to exit.
    ///
    /// Each worker exit is awaited up to the shared `grace` deadline.
    /// Workers still busy past the deadline are abandoned with a log line
    /// rather than interrupted mid-job.
    pub fn block_till_done(&self, grace: Duration) {
        let mut intake = self.intake.lock().unwrap_or_else(PoisonError::into_inner);
        if intake.take().is_none() {
            return;
        }
        drop(intake);

        let workers = self.live.swap(0, Ordering::SeqCst);
        let deadline = Instant::now() + grace;
        let mut finished = 0;
        while finished < workers {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.exited_rx.recv_timeout(remaining) {
                Ok(()) => finished += 1,
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
            }
        }
        if finished < workers {
            warn!(
                abandoned = workers - finished,
                pending = self.queue.len(),
                "grace period elapsed before the worker pool drained"
            );
        } else {
            debug!(workers, "worker pool drained");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::bounded;

    #[test]
    fn should_run_submitted_jobs() {
        let pool = WorkerPool::new(2);
        let (tx, rx) = bounded(1);

        pool.submit(Job::new("probe", move || {
            tx.send(42).unwrap();
        }))
        .unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 42);
    }

    #[test]
    fn should_clamp_initial_workers_to_minimum() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.worker_count(), MIN_WORKERS);
    }

    #[test]
    fn should_grow_when_adding_workers() {
        let pool = WorkerPool::new(2);
        pool.add_worker();
        pool.add_worker();
        assert_eq!(pool.worker_count(), 4);
    }

    #[test]
    fn should_survive_a_panicking_job() {
        let pool = WorkerPool::new(2);
        let (tx, rx) = bounded(1);

        pool.submit(Job::new("explodes", || panic!("boom"))).unwrap();
        pool.submit(Job::new("follows", move || {
            tx.send(()).unwrap();
        }))
        .unwrap();

        assert!(rx.recv_timeout(Duration::from_secs(1)).is_ok());
        assert_eq!(pool.worker_count(), 2);
    }

    #[test]
    fn should_finish_in_flight_jobs_during_shutdown() {
        let pool = WorkerPool::new(2);
        let (tx, rx) = bounded(1);

        pool.submit(Job::new("slow", move || {
            std::thread::sleep(Duration::from_millis(100));
            tx.send(()).unwrap();
        }))
        .unwrap();

        pool.block_till_done(Duration::from_secs(5));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn should_reject_jobs_after_shutdown() {
        let pool = WorkerPool::new(2);
        pool.block_till_done(Duration::from_secs(1));

        let result = pool.submit(Job::new("late", || {}));
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().rejected, "late");
    }

    #[test]
    fn should_tolerate_repeated_shutdown() {
        let pool = WorkerPool::new(2);
        pool.block_till_done(Duration::from_secs(1));
        pool.block_till_done(Duration::from_secs(1));
    }

    #[test]
    fn should_convert_pool_closed_into_hub_error() {
        let err: HubError = PoolClosed {
            rejected: "job".to_string(),
        }
        .into();
        assert!(matches!(err, HubError::PoolUnavailable(_)));
    }
}
