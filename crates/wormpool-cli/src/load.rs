//! Synthetic workload pushed through a [`RequestPool`].

use crate::config::LoadConfig;
use core::time::Duration;
use parking_lot::Mutex;
use portable_atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::{sync::Notify, time::Instant};
use wormpool::{PoolConfig, RequestPool, TaskError, WorkerHook};

/// Tracks temporary worker churn and remembers the high-water mark.
#[derive(Debug, Default)]
pub struct ChurnTracker {
    peak: AtomicUsize,
    joins: AtomicU64,
    leaves: AtomicU64,
}

impl ChurnTracker {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }
}

impl WorkerHook for ChurnTracker {
    fn on_join(&self, count: usize) {
        self.joins.fetch_add(1, Ordering::Relaxed);
        self.peak.fetch_max(count, Ordering::Relaxed);
        tracing::debug!(count, "temporary worker joined");
    }

    fn on_leave(&self, count: usize) {
        self.leaves.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(count, "temporary worker left");
    }

    fn on_panic(&self, message: &str) {
        tracing::warn!("worker absorbed panic: {message}");
    }
}

/// Outcome counters shared by every response callback.
#[derive(Debug, Default)]
pub struct Tally {
    ok: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    dropped: AtomicU64,
    done: AtomicU64,
    expected: AtomicU64,
    first_panic: Mutex<Option<String>>,
    finished: Notify,
}

impl Tally {
    fn record(&self, outcome: Result<u64, TaskError<String>>) {
        match outcome {
            Ok(_) => self.ok.fetch_add(1, Ordering::Relaxed),
            Err(TaskError::Failed(_)) => self.failed.fetch_add(1, Ordering::Relaxed),
            Err(TaskError::Panicked(message)) => {
                self.first_panic.lock().get_or_insert(message);
                self.panicked.fetch_add(1, Ordering::Relaxed)
            }
            Err(TaskError::Dropped) => self.dropped.fetch_add(1, Ordering::Relaxed),
        };
        let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        if done == self.expected.load(Ordering::SeqCst) {
            self.finished.notify_one();
        }
    }

    /// Resolves once `submitted` callbacks have fired.
    async fn drained(&self, submitted: u64) {
        self.expected.store(submitted, Ordering::SeqCst);
        while self.done.load(Ordering::SeqCst) < submitted {
            self.finished.notified().await;
        }
    }
}

#[derive(Debug)]
pub struct Summary {
    pub submitted: u64,
    pub ok: u64,
    pub failed: u64,
    pub panicked: u64,
    pub dropped: u64,
    pub peak_temp_workers: usize,
    pub temp_joins: u64,
    pub temp_leaves: u64,
    pub first_panic: Option<String>,
    pub elapsed: Duration,
    pub interrupted: bool,
}

impl Summary {
    pub fn log(&self) {
        tracing::info!(
            submitted = self.submitted,
            ok = self.ok,
            failed = self.failed,
            panicked = self.panicked,
            dropped = self.dropped,
            peak_temp_workers = self.peak_temp_workers,
            temp_joins = self.temp_joins,
            temp_leaves = self.temp_leaves,
            elapsed_ms = u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX),
            interrupted = self.interrupted,
            "load finished"
        );
        if let Some(message) = &self.first_panic {
            tracing::info!("first panic: {message}");
        }
    }
}

fn every(n: u64, period: u64) -> bool {
    period != 0 && n % period == 0
}

/// Builds the request pool used by the load run.
pub fn build_pool(
    config: &LoadConfig,
    tracker: Arc<ChurnTracker>,
) -> anyhow::Result<RequestPool<u64, u64, String>> {
    let task_duration = config.task_duration;
    let panic_every = config.panic_every;
    let fail_every = config.fail_every;

    let handler = move |n: u64| async move {
        if !task_duration.is_zero() {
            tokio::time::sleep(task_duration).await;
        }
        if every(n, panic_every) {
            panic!("task {n} panicked on purpose");
        }
        if every(n, fail_every) {
            return Err(format!("task {n} failed on purpose"));
        }
        Ok(n)
    };

    let pool_config = PoolConfig {
        hook: Some(tracker),
        ..config.pool.clone()
    };

    Ok(RequestPool::new(handler, pool_config)?)
}

/// Submits `config.tasks` requests and waits for every callback, or until
/// `interrupt` resolves. The pool is shut down in both cases.
pub async fn run<F>(config: &LoadConfig, interrupt: F) -> anyhow::Result<Summary>
where
    F: Future<Output = ()>,
{
    let tracker = Arc::new(ChurnTracker::default());
    let pool = build_pool(config, Arc::clone(&tracker))?;
    let tally = Arc::new(Tally::default());
    let submitted = AtomicU64::new(0);
    let started = Instant::now();

    let drive = async {
        for n in 1..=config.tasks {
            let tally = Arc::clone(&tally);
            pool.submit(n, move |_, outcome| tally.record(outcome))
                .await?;
            submitted.fetch_add(1, Ordering::Relaxed);
        }
        tally.drained(config.tasks).await;
        anyhow::Ok(())
    };

    let interrupted = tokio::select! {
        res = drive => {
            res?;
            false
        }
        () = interrupt => {
            tracing::info!("Interrupted, shutting down the pool");
            true
        }
    };

    pool.shutdown(config.shutdown_timeout).await?;
    let elapsed = started.elapsed();

    Ok(Summary {
        submitted: submitted.load(Ordering::Relaxed),
        ok: tally.ok.load(Ordering::Relaxed),
        failed: tally.failed.load(Ordering::Relaxed),
        panicked: tally.panicked.load(Ordering::Relaxed),
        dropped: tally.dropped.load(Ordering::Relaxed),
        peak_temp_workers: tracker.peak(),
        temp_joins: tracker.joins.load(Ordering::Relaxed),
        temp_leaves: tracker.leaves.load(Ordering::Relaxed),
        first_panic: tally.first_panic.lock().take(),
        elapsed,
        interrupted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::future::pending;

    fn load_config(tasks: u64) -> LoadConfig {
        LoadConfig {
            pool: PoolConfig {
                min_workers: 2,
                max_temp_workers: Some(4),
                primary_queue_capacity: 4,
                temp_queue_capacity: 4,
                idle_timeout: Duration::from_millis(50),
                hook: None,
            },
            tasks,
            task_duration: Duration::from_millis(1),
            panic_every: 0,
            fail_every: 0,
            shutdown_timeout: Duration::from_secs(5),
            runtime_threads: 4,
            log_json: false,
        }
    }

    #[test]
    fn periodic_selection() {
        assert!(!every(3, 0));
        assert!(every(3, 3));
        assert!(!every(4, 3));
        assert!(every(6, 3));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn all_tasks_complete() {
        let summary = run(&load_config(200), pending()).await.unwrap();
        assert!(!summary.interrupted);
        assert_eq!(summary.submitted, 200);
        assert_eq!(summary.ok, 200);
        assert_eq!(summary.failed + summary.panicked + summary.dropped, 0);
        assert!(summary.peak_temp_workers <= 4);
        assert_eq!(summary.temp_joins, summary.temp_leaves);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failures_and_panics_are_counted() {
        let mut config = load_config(100);
        config.panic_every = 10;
        config.fail_every = 7;
        let summary = run(&config, pending()).await.unwrap();
        // Multiples of 70 count as panics since the panic check runs first.
        assert_eq!(summary.panicked, 10);
        assert_eq!(summary.failed, 13);
        assert_eq!(summary.ok, 77);
        assert!(summary.first_panic.unwrap().contains("panicked on purpose"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn interrupt_accounts_for_every_submission() {
        let mut config = load_config(1_000);
        config.task_duration = Duration::from_millis(20);
        let interrupt = tokio::time::sleep(Duration::from_millis(30));
        let summary = run(&config, interrupt).await.unwrap();
        assert!(summary.interrupted);
        assert_eq!(
            summary.ok + summary.failed + summary.panicked + summary.dropped,
            summary.submitted
        );
    }
}
