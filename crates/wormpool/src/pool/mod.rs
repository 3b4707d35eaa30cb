//! Elastic worker pool engine.
//!
//! [`ElasticPool`] owns the lifecycle of a set of Tokio tasks that execute
//! [`Job`]s:
//!
//! - **Permanent workers** (`min_workers`) are spawned on `start` and live
//!   until `stop`.
//! - **Temporary workers** are spawned when both queue tiers are full, up to
//!   `max_temp_workers`, and retire after `idle_timeout` without work.
//! - The **overflow dispatcher** absorbs submissions once even the temporary
//!   budget is exhausted and feeds them back as capacity frees up.
//!
//! A submission tries, in order: a non-blocking send to the primary queue, a
//! non-blocking send to the temporary queue, spawning a temporary worker
//! seeded with the job, and finally the dispatcher's intake. Only that last
//! step can make `submit` wait, and the wait lasts only until the dispatcher
//! takes the job into its backlog.
//!
//! ## Shutdown
//!
//! `stop` cancels a shared [`tokio_util::sync::CancellationToken`] observed at
//! every suspension point, closes the queues, and abandons jobs that were
//! queued but not yet claimed. Jobs already executing run to completion.
//! `shutdown` does the same and then waits for every worker to exit.

mod generation;
mod overflow;
mod worker;


use crate::{Error, Job, PoolConfig, Result};
use core::time::Duration;
use generation::Generation;
use parking_lot::RwLock;
use portable_atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;

/// An elastic pool of Tokio workers executing jobs of type `J`.
///
/// The pool starts as soon as it is constructed. `start` and `stop` are
/// idempotent and may be called any number of times; restarting allocates
/// fresh queues and a fresh worker set. Dropping the pool stops it.
pub struct ElasticPool<J: Job> {
    config: PoolConfig,
    handle: Handle,
    running: AtomicBool,
    generation: RwLock<Option<Arc<Generation<J>>>>,
}

impl<J: Job> ElasticPool<J> {
    /// Validates `config`, binds the pool to the current Tokio runtime, and
    /// starts it.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if `config` fails validation.
    /// - [`Error::NoRuntime`] if called outside of a Tokio runtime.
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let handle = Handle::try_current().map_err(|e| Error::NoRuntime {
            context: e.to_string(),
        })?;

        let pool = Self {
            config,
            handle,
            running: AtomicBool::new(false),
            generation: RwLock::new(None),
        };
        pool.start();
        Ok(pool)
    }

    /// Starts the pool if it is stopped. No-op while running.
    pub fn start(&self) {
        let mut slot = self.generation.write();
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        *slot = Some(Generation::launch(&self.config, &self.handle));
    }

    /// Stops the pool if it is running. No-op while stopped.
    ///
    /// Returns immediately; in-flight jobs finish on their own and queued jobs
    /// are abandoned. Use [`ElasticPool::shutdown`] to also wait for workers.
    pub fn stop(&self) {
        if let Some(generation) = self.retire() {
            generation.close();
        }
    }

    /// Stops the pool and waits up to `timeout` for every worker of the
    /// current run to exit. Returns immediately if the pool is already
    /// stopped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShutdownTimeout`] if some worker is still executing a
    /// job when `timeout` elapses.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        let Some(generation) = self.retire() else {
            return Ok(());
        };
        generation.close();

        match tokio::time::timeout(timeout, generation.wait()).await {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Pool shutdown complete");
                Ok(())
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Pool shutdown timed out after {timeout:?}");
                Err(Error::ShutdownTimeout { timeout })
            }
        }
    }

    /// Submits a job.
    ///
    /// Suspends only when every tier is saturated and the overflow
    /// dispatcher's intake slot is occupied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolStopped`] if the pool is stopped, or stops while
    /// the caller is waiting on the overflow intake. A rejected job is dropped
    /// without being run or abandoned.
    pub async fn submit(&self, job: J) -> Result<()> {
        let generation = self.generation.read().clone().ok_or(Error::PoolStopped)?;
        generation.dispatch(job).await
    }

    /// Returns `true` between `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of live temporary workers in the current run.
    pub fn temp_workers(&self) -> usize {
        self.generation
            .read()
            .as_ref()
            .map_or(0, |generation| generation.temp_workers())
    }

    /// The validated configuration this pool was built with.
    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Flips the running flag and detaches the current generation.
    fn retire(&self) -> Option<Arc<Generation<J>>> {
        let mut slot = self.generation.write();
        if self
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        slot.take()
    }
}

impl<J: Job> Drop for ElasticPool<J> {
    fn drop(&mut self) {
        self.stop();
    }
}
