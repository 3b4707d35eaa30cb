//! Request/response pool.
//!
//! [`RequestPool`] pairs every request with an optional response callback.
//! A shared async [`Handler`] turns requests into responses on the elastic
//! pool; the callback receives the original request together with the
//! handler's outcome.
//!
//! Every submission that `submit` accepts invokes its callback exactly once:
//! with the response, with [`TaskError::Failed`] for a returned error, with
//! [`TaskError::Panicked`] if the handler panicked, or with
//! [`TaskError::Dropped`] if the pool stopped before the request ran.

use crate::{ElasticPool, Job, PoolConfig, Result, TaskError, task::panic_message};
use core::{fmt, future::Future, panic::AssertUnwindSafe, time::Duration};
use futures::{FutureExt, future::BoxFuture};
use std::sync::Arc;

/// Callback receiving a request and its outcome.
pub type ResponseFn<T, R, E> = Box<dyn FnOnce(T, core::result::Result<R, TaskError<E>>) + Send>;

/// Async request handler shared by every worker of a [`RequestPool`].
///
/// Implemented for any `Fn(T) -> impl Future<Output = Result<R, E>>` closure.
pub trait Handler<T, R, E>: Send + Sync + 'static {
    fn call(&self, req: T) -> BoxFuture<'static, core::result::Result<R, E>>;
}

impl<T, R, E, F, Fut> Handler<T, R, E> for F
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = core::result::Result<R, E>> + Send + 'static,
{
    fn call(&self, req: T) -> BoxFuture<'static, core::result::Result<R, E>> {
        Box::pin(self(req))
    }
}

/// A request queued on a [`RequestPool`].
pub struct RequestItem<T, R, E> {
    req: T,
    handler: Arc<dyn Handler<T, R, E>>,
    respond: Option<ResponseFn<T, R, E>>,
}

impl<T, R, E> Job for RequestItem<T, R, E>
where
    T: Clone + Send + 'static,
    R: Send + 'static,
    E: fmt::Debug + Send + 'static,
{
    async fn run(self) {
        let Self {
            req,
            handler,
            respond,
        } = self;

        let input = req.clone();
        let outcome = match AssertUnwindSafe(async move { handler.call(input).await })
            .catch_unwind()
            .await
        {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(e)) => Err(TaskError::Failed(e)),
            Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
        };

        match respond {
            Some(respond) => respond(req, outcome),
            None => {
                #[cfg(feature = "tracing")]
                if let Err(e) = &outcome {
                    if e.is_panic() {
                        tracing::error!("Detached request {e}");
                    } else {
                        tracing::warn!("Detached request {e}");
                    }
                }
            }
        }
    }

    fn abandon(self) {
        match self.respond {
            Some(respond) => respond(self.req, Err(TaskError::Dropped)),
            None => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Detached request dropped before it ran");
            }
        }
    }
}

/// Elastic pool that answers requests of type `T` with responses of type `R`.
pub struct RequestPool<T, R, E>
where
    T: Clone + Send + 'static,
    R: Send + 'static,
    E: fmt::Debug + Send + 'static,
{
    pool: ElasticPool<RequestItem<T, R, E>>,
    handler: Arc<dyn Handler<T, R, E>>,
}

/// Request pool whose handler only reports success or failure.
pub type RunPool<T, E> = RequestPool<T, (), E>;

impl<T, R, E> RequestPool<T, R, E>
where
    T: Clone + Send + 'static,
    R: Send + 'static,
    E: fmt::Debug + Send + 'static,
{
    /// Creates and starts a pool that runs `handler` for every request.
    ///
    /// # Errors
    ///
    /// See [`ElasticPool::new`].
    pub fn new(handler: impl Handler<T, R, E>, config: PoolConfig) -> Result<Self> {
        Ok(Self {
            pool: ElasticPool::new(config)?,
            handler: Arc::new(handler),
        })
    }

    /// Submits `req`; `respond` is invoked exactly once with its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolStopped`] if the pool is not running. In
    /// that case `respond` is never called.
    pub async fn submit<F>(&self, req: T, respond: F) -> Result<()>
    where
        F: FnOnce(T, core::result::Result<R, TaskError<E>>) + Send + 'static,
    {
        self.enqueue(req, Some(Box::new(respond))).await
    }

    /// Submits `req` without a callback. Failures are only logged.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolStopped`] if the pool is not running.
    pub async fn submit_detached(&self, req: T) -> Result<()> {
        self.enqueue(req, None).await
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

    async fn enqueue(&self, req: T, respond: Option<ResponseFn<T, R, E>>) -> Result<()> {
        self.pool
            .submit(RequestItem {
                req,
                handler: Arc::clone(&self.handler),
                respond,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn small_config() -> PoolConfig {
        PoolConfig {
            min_workers: 2,
            max_temp_workers: Some(2),
            primary_queue_capacity: 4,
            temp_queue_capacity: 4,
            idle_timeout: Duration::from_millis(100),
            hook: None,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn delivers_response_with_original_request() {
        let pool: RequestPool<u64, u64, String> =
            RequestPool::new(|n: u64| async move { Ok(n * 2) }, small_config()).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        pool.submit(21, move |req, resp| {
            tx.send((req, resp)).unwrap();
        })
        .await
        .unwrap();

        let (req, resp) = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(req, 21);
        assert_eq!(resp, Ok(42));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn returned_errors_become_failed() {
        let pool: RunPool<u64, String> = RequestPool::new(
            |n: u64| async move { Err(format!("rejected {n}")) },
            small_config(),
        )
        .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        pool.submit(7, move |_, resp| {
            tx.send(resp).unwrap();
        })
        .await
        .unwrap();

        let resp = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(resp, Err(TaskError::Failed("rejected 7".to_string())));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn detached_requests_still_run() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pool: RunPool<u64, String> = RequestPool::new(
            move |n: u64| {
                let tx = tx.clone();
                async move { tx.send(n).map_err(|e| e.to_string()) }
            },
            small_config(),
        )
        .unwrap();

        for n in 0..10 {
            pool.submit_detached(n).await.unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..10 {
            seen.push(timeout(WAIT, rx.recv()).await.unwrap().unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn submit_after_stop_is_rejected_without_callback() {
        let pool: RunPool<u64, String> =
            RequestPool::new(|_: u64| async move { Ok(()) }, small_config()).unwrap();
        pool.stop();

        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let result = pool
            .submit(1, move |_, _| {
                tx.send(()).unwrap();
            })
            .await;

        assert_eq!(result, Err(Error::PoolStopped));
        // The callback (and with it the sender) was dropped without running.
        assert!(rx.recv().await.is_none());
    }
}
