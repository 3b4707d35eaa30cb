//! Fire-and-forget work pool.
//!
//! [`WorkPool`] runs detached futures on an [`ElasticPool`]. There is no
//! response channel: a panic is absorbed by the worker, logged, and reported
//! to [`crate::WorkerHook::on_panic`]; a future discarded by `stop` is logged.

use crate::{ElasticPool, Job, PoolConfig, Result};
use core::{future::Future, time::Duration};
use futures::future::BoxFuture;

/// A boxed unit of fire-and-forget work.
pub struct WorkItem(BoxFuture<'static, ()>);

impl Job for WorkItem {
    fn run(self) -> impl Future<Output = ()> + Send {
        self.0
    }

    fn abandon(self) {
        #[cfg(feature = "tracing")]
        tracing::warn!("Work item dropped before it ran");
    }
}

/// Elastic pool for detached futures.
pub struct WorkPool {
    pool: ElasticPool<WorkItem>,
}

impl WorkPool {
    /// Creates and starts a work pool.
    ///
    /// # Errors
    ///
    /// See [`ElasticPool::new`].
    pub fn new(config: PoolConfig) -> Result<Self> {
        Ok(Self {
            pool: ElasticPool::new(config)?,
        })
    }

    /// Queues `work` for execution.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolStopped`] if the pool is not running.
    pub async fn spawn<F>(&self, work: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pool.submit(WorkItem(Box::pin(work))).await
    }

    pub fn start(&self) {
        self.pool.start();
    }

    pub fn stop(&self) {
        self.pool.stop();
    }

    /// See [`ElasticPool::shutdown`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ShutdownTimeout`] if workers do not exit in
    /// time.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.pool.shutdown(timeout).await
    }

    pub fn is_running(&self) -> bool {
        self.pool.is_running()
    }

    pub fn temp_workers(&self) -> usize {
        self.pool.temp_workers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WorkerHook;
    use portable_atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    #[derive(Default)]
    struct PanicCounter(AtomicUsize);

    impl WorkerHook for Arc<PanicCounter> {
        fn on_join(&self, _count: usize) {}
        fn on_leave(&self, _count: usize) {}
        fn on_panic(&self, _message: &str) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn config() -> PoolConfig {
        PoolConfig {
            min_workers: 10,
            max_temp_workers: None,
            primary_queue_capacity: 8,
            temp_queue_capacity: 8,
            idle_timeout: Duration::from_millis(100),
            hook: None,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn runs_every_spawned_future() {
        let pool = WorkPool::new(config()).unwrap();
        let sum = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel();

        for _ in 0..100 {
            let sum = Arc::clone(&sum);
            let tx = tx.clone();
            pool.spawn(async move {
                sum.fetch_add(1, Ordering::Relaxed);
                tx.send(()).unwrap();
            })
            .await
            .unwrap();
        }

        for _ in 0..100 {
            timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        }
        assert_eq!(sum.load(Ordering::Relaxed), 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn panics_are_absorbed_and_reported() {
        let panics = Arc::new(PanicCounter::default());
        let pool = WorkPool::new(PoolConfig {
            min_workers: 1,
            max_temp_workers: Some(0),
            ..config()
        }
        .with_hook(Arc::clone(&panics)))
        .unwrap();

        pool.spawn(async { panic!("fire-and-forget boom"); })
            .await
            .unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel();
        pool.spawn(async move {
            tx.send(()).unwrap();
        })
        .await
        .unwrap();

        // The single permanent worker survived the panic and ran the next job.
        timeout(WAIT, rx).await.unwrap().unwrap();
        assert_eq!(panics.0.load(Ordering::Relaxed), 1);
    }
}
