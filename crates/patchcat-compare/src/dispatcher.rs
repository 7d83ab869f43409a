//! Work Dispatcher
//!
//! Runs compare tasks on a fixed-size rayon pool and lets the caller wait,
//! with a deadline, until every submitted task has finished.
//!
//! Tasks still queued when the deadline passes are abandoned: they return
//! without doing any work once a worker picks them up. Tasks that are
//! already running are not interrupted.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use patchcat_core::{Error, Result};
use serde::Serialize;
use tracing::{debug, error, warn};

/// Longest wait `drain` honours; larger timeouts are clamped to it
pub const MAX_DRAIN_WAIT: Duration = Duration::from_secs(u32::MAX as u64);

/// Result of waiting for submitted tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DrainOutcome {
    /// Every submitted task finished
    Completed,
    /// The deadline passed with tasks still queued or running
    TimedOut { outstanding: usize },
}

impl DrainOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, DrainOutcome::Completed)
    }

    /// Tasks that had not finished when the wait ended
    pub fn outstanding(&self) -> usize {
        match self {
            DrainOutcome::Completed => 0,
            DrainOutcome::TimedOut { outstanding } => *outstanding,
        }
    }
}

/// Bookkeeping shared between the dispatcher and its tasks
#[derive(Default)]
struct DispatchState {
    pending: Mutex<usize>,
    idle: Condvar,
    abandoned: AtomicBool,
    submitted: AtomicUsize,
}

/// Marks one task finished when dropped, including on panic
struct PendingGuard(Arc<DispatchState>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let mut pending = self.0.pending.lock();
        *pending -= 1;
        if *pending == 0 {
            self.0.idle.notify_all();
        }
    }
}

/// Bounded pool for compare tasks
pub struct WorkDispatcher {
    pool: rayon::ThreadPool,
    state: Arc<DispatchState>,
    workers: usize,
}

impl WorkDispatcher {
    /// Create a dispatcher with `workers` threads
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(Error::invalid_config("worker count must be at least 1"));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("patchcat-worker-{}", i))
            .panic_handler(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(panic = %message, "Compare task panicked");
            })
            .build()
            .map_err(|e| Error::internal(format!("failed to build worker pool: {}", e)))?;

        debug!(workers, "Started compare workers");

        Ok(Self {
            pool,
            state: Arc::new(DispatchState::default()),
            workers,
        })
    }

    /// Queue a task; never blocks on the task itself
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        *self.state.pending.lock() += 1;
        self.state.submitted.fetch_add(1, Ordering::Relaxed);

        let state = Arc::clone(&self.state);
        self.pool.spawn(move || {
            let _guard = PendingGuard(Arc::clone(&state));
            if state.abandoned.load(Ordering::Acquire) {
                return;
            }
            task();
        });
    }

    /// Total number of tasks submitted so far
    pub fn submitted(&self) -> usize {
        self.state.submitted.load(Ordering::Relaxed)
    }

    /// Tasks queued or running right now
    pub fn pending(&self) -> usize {
        *self.state.pending.lock()
    }

    /// Whether a drain has given up on outstanding tasks
    pub fn is_abandoned(&self) -> bool {
        self.state.abandoned.load(Ordering::Acquire)
    }

    /// Block until all submitted tasks finish or `timeout` elapses
    ///
    /// On timeout the remaining queued tasks are abandoned.
    pub fn drain(&self, timeout: Duration) -> DrainOutcome {
        let deadline = deadline_after(timeout);

        let mut pending = self.state.pending.lock();
        while *pending > 0 {
            if self.state.idle.wait_until(&mut pending, deadline).timed_out() {
                break;
            }
        }

        let outstanding = *pending;
        drop(pending);

        if outstanding == 0 {
            DrainOutcome::Completed
        } else {
            self.state.abandoned.store(true, Ordering::Release);
            warn!(
                outstanding,
                timeout_secs = timeout.as_secs(),
                "Timed out waiting for compare tasks, abandoning the rest"
            );
            DrainOutcome::TimedOut { outstanding }
        }
    }
}

/// Always a finite instant, even for `Duration::MAX`
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout.min(MAX_DRAIN_WAIT)).unwrap_or(now)
}

impl std::fmt::Debug for WorkDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkDispatcher")
            .field("workers", &self.workers)
            .field("pending", &self.pending())
            .field("abandoned", &self.is_abandoned())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Barrier;

    #[test]
    fn test_zero_workers_rejected() {
        let err = WorkDispatcher::new(0).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_drain_with_no_tasks() {
        let dispatcher = WorkDispatcher::new(2).unwrap();
        assert_eq!(dispatcher.drain(Duration::ZERO), DrainOutcome::Completed);
    }

    #[test]
    fn test_all_tasks_run() {
        let dispatcher = WorkDispatcher::new(4).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..1000 {
            let counter = Arc::clone(&counter);
            dispatcher.submit(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }

        assert_eq!(dispatcher.drain(Duration::from_secs(30)), DrainOutcome::Completed);
        assert_eq!(counter.load(Ordering::Relaxed), 1000);
        assert_eq!(dispatcher.submitted(), 1000);
        assert_eq!(dispatcher.pending(), 0);
    }

    #[test]
    fn test_worker_threads_are_named() {
        let dispatcher = WorkDispatcher::new(1).unwrap();
        let (tx, rx) = mpsc::channel();
        dispatcher.submit(move || {
            let name = std::thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
        });
        dispatcher.drain(Duration::from_secs(30));
        assert_eq!(rx.recv().unwrap().as_deref(), Some("patchcat-worker-0"));
    }

    #[test]
    fn test_timeout_abandons_queued_tasks() {
        let dispatcher = WorkDispatcher::new(1).unwrap();
        let release = Arc::new(Barrier::new(2));
        let ran = Arc::new(AtomicUsize::new(0));

        // Occupies the only worker until released
        {
            let release = Arc::clone(&release);
            dispatcher.submit(move || {
                release.wait();
            });
        }
        for _ in 0..10 {
            let ran = Arc::clone(&ran);
            dispatcher.submit(move || {
                ran.fetch_add(1, Ordering::Relaxed);
            });
        }

        let outcome = dispatcher.drain(Duration::from_millis(50));
        assert_eq!(outcome, DrainOutcome::TimedOut { outstanding: 11 });
        assert_eq!(outcome.outstanding(), 11);
        assert!(dispatcher.is_abandoned());

        release.wait();
        assert_eq!(dispatcher.drain(Duration::from_secs(30)), DrainOutcome::Completed);
        assert_eq!(ran.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_huge_timeout_is_clamped() {
        let before = Instant::now();
        let deadline = deadline_after(Duration::MAX);
        assert!(deadline > before);
        assert!(deadline.duration_since(before) <= MAX_DRAIN_WAIT + Duration::from_secs(1));

        let dispatcher = WorkDispatcher::new(2).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let ran = Arc::clone(&ran);
            dispatcher.submit(move || {
                ran.fetch_add(1, Ordering::Relaxed);
            });
        }
        assert_eq!(dispatcher.drain(Duration::MAX), DrainOutcome::Completed);
        assert_eq!(ran.load(Ordering::Relaxed), 50);
        assert_eq!(dispatcher.drain(Duration::MAX), DrainOutcome::Completed);
    }

    #[test]
    fn test_panicking_task_still_finishes() {
        let dispatcher = WorkDispatcher::new(2).unwrap();
        dispatcher.submit(|| panic!("boom"));
        dispatcher.submit(|| {});
        assert_eq!(dispatcher.drain(Duration::from_secs(30)), DrainOutcome::Completed);
    }
}
