//! Event managers built on [`RequestPool`].
//!
//! An [`Event`] runs in three phases (`before`, `action`, `after`) on a pool
//! worker; a [`ResultEvent`] replaces `action` with `handle`, which produces
//! a value. The first failing phase short-circuits the rest, and every event's
//! outcome is delivered to the manager's shared response callback.
//!
//! Event bodies are synchronous and run directly on a Tokio worker, so they
//! should not block for long.

use crate::{PoolConfig, RequestPool, Result, TaskError};
use core::time::Duration;
use std::sync::Arc;

/// Type-erased error returned by event phases.
pub type BoxError = Box<dyn core::error::Error + Send + Sync>;

/// Outcome of an [`Event`].
pub type EventOutcome = core::result::Result<(), TaskError<BoxError>>;

/// Outcome of a [`ResultEvent`].
pub type ResultEventOutcome<T> = core::result::Result<T, TaskError<BoxError>>;

/// An event with a side-effecting `action`.
pub trait Event: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn before(&self) -> core::result::Result<(), BoxError> {
        Ok(())
    }

    fn action(&self) -> core::result::Result<(), BoxError>;

    fn after(&self) -> core::result::Result<(), BoxError> {
        Ok(())
    }
}

/// An event whose `handle` phase produces a value of type `T`.
pub trait ResultEvent<T>: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn before(&self) -> core::result::Result<(), BoxError> {
        Ok(())
    }

    fn handle(&self) -> core::result::Result<T, BoxError>;

    fn after(&self) -> core::result::Result<(), BoxError> {
        Ok(())
    }
}

type EventRespondFn = dyn Fn(Arc<dyn Event>, EventOutcome) + Send + Sync;
type ResultEventRespondFn<T> =
    dyn Fn(Arc<dyn ResultEvent<T>>, ResultEventOutcome<T>) + Send + Sync;

/// Runs [`Event`]s on an elastic pool.
pub struct EventManager {
    pool: RequestPool<Arc<dyn Event>, (), BoxError>,
    respond: Arc<EventRespondFn>,
}

impl EventManager {
    /// Creates and starts an event manager. `respond` is called once per
    /// accepted event.
    ///
    /// # Errors
    ///
    /// See [`crate::ElasticPool::new`].
    pub fn new<F>(respond: F, config: PoolConfig) -> Result<Self>
    where
        F: Fn(Arc<dyn Event>, EventOutcome) + Send + Sync + 'static,
    {
        let pool = RequestPool::new(
            |event: Arc<dyn Event>| async move {
                event.before()?;
                event.action()?;
                event.after()
            },
            config,
        )?;

        Ok(Self {
            pool,
            respond: Arc::new(respond),
        })
    }

    /// Queues `event`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolStopped`] if the manager is stopped.
    pub async fn on_event(&self, event: Arc<dyn Event>) -> Result<()> {
        #[cfg(feature = "tracing")]
        tracing::trace!("Queueing event {}", event.name());

        let respond = Arc::clone(&self.respond);
        self.pool
            .submit(event, move |event, outcome| respond(event, outcome))
            .await
    }

    pub fn start(&self) {
        self.pool.start();
    }

    pub fn stop(&self) {
        self.pool.stop();
    }

    /// See [`crate::ElasticPool::shutdown`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ShutdownTimeout`] if workers do not exit in
    /// time.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.pool.shutdown(timeout).await
    }
}

/// Runs [`ResultEvent`]s on an elastic pool.
pub struct ResultEventManager<T: Send + 'static> {
    pool: RequestPool<Arc<dyn ResultEvent<T>>, T, BoxError>,
    respond: Arc<ResultEventRespondFn<T>>,
}

impl<T: Send + 'static> ResultEventManager<T> {
    /// Creates and starts a result event manager. `respond` is called once
    /// per accepted event.
    ///
    /// # Errors
    ///
    /// See [`crate::ElasticPool::new`].
    pub fn new<F>(respond: F, config: PoolConfig) -> Result<Self>
    where
        F: Fn(Arc<dyn ResultEvent<T>>, ResultEventOutcome<T>) + Send + Sync + 'static,
    {
        let pool = RequestPool::new(
            |event: Arc<dyn ResultEvent<T>>| async move {
                event.before()?;
                let value = event.handle()?;
                event.after()?;
                Ok::<T, BoxError>(value)
            },
            config,
        )?;

        Ok(Self {
            pool,
            respond: Arc::new(respond),
        })
    }

    /// Queues `event`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolStopped`] if the manager is stopped.
    pub async fn on_event(&self, event: Arc<dyn ResultEvent<T>>) -> Result<()> {
        let respond = Arc::clone(&self.respond);
        self.pool
            .submit(event, move |event, outcome| respond(event, outcome))
            .await
    }

    pub fn start(&self) {
        self.pool.start();
    }

    pub fn stop(&self) {
        self.pool.stop();
    }

    /// See [`crate::ElasticPool::shutdown`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ShutdownTimeout`] if workers do not exit in
    /// time.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.pool.shutdown(timeout).await
    }
}
