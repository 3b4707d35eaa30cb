//! Pool sizing and timing configuration.
//!
//! [`PoolConfig`] is a plain struct with public fields and production-ready
//! defaults. It is validated once when a pool is constructed; later `start`
//! calls reuse the validated values.
//!
//! ## Defaults
//! - `min_workers`: 10 permanent workers.
//! - `max_temp_workers`: unlimited.
//! - `primary_queue_capacity` / `temp_queue_capacity`: 100 each.
//! - `idle_timeout`: 60 seconds.

use crate::{Error, Result, WorkerHook};
use core::{fmt, time::Duration};
use std::sync::Arc;

/// Number of permanent workers started by default.
pub const DEFAULT_MIN_WORKERS: usize = 10;

/// Default capacity of the primary and temporary queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default time a temporary worker waits for work before retiring.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Capacity of the overflow dispatcher's intake channel. Submitters block on
/// this slot only when every other tier is saturated.
pub const OVERFLOW_INTAKE_CAPACITY: usize = 1;

/// Runtime configuration for an [`crate::ElasticPool`].
#[derive(Clone)]
pub struct PoolConfig {
    /// Permanent workers spawned on every `start`. Must be at least 1, since
    /// the primary queue has no other consumer.
    pub min_workers: usize,

    /// Cap on concurrently live temporary workers. `None` means unlimited, in
    /// which case no overflow dispatcher is started.
    pub max_temp_workers: Option<usize>,

    /// Capacity of the queue read by permanent workers.
    pub primary_queue_capacity: usize,

    /// Capacity of the queue read by temporary workers.
    pub temp_queue_capacity: usize,

    /// How long a temporary worker waits for new work before retiring.
    pub idle_timeout: Duration,

    /// Optional observer for temporary worker churn and absorbed panics.
    pub hook: Option<Arc<dyn WorkerHook>>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_workers: DEFAULT_MIN_WORKERS,
            max_temp_workers: None,
            primary_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            temp_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            hook: None,
        }
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("min_workers", &self.min_workers)
            .field("max_temp_workers", &self.max_temp_workers)
            .field("primary_queue_capacity", &self.primary_queue_capacity)
            .field("temp_queue_capacity", &self.temp_queue_capacity)
            .field("idle_timeout", &self.idle_timeout)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl PoolConfig {
    /// Attaches a [`WorkerHook`].
    #[must_use]
    pub fn with_hook(mut self, hook: impl WorkerHook + 'static) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Checks that every field is within range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if:
    /// - `min_workers` is 0.
    /// - either queue capacity is 0.
    /// - `idle_timeout` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.min_workers == 0 {
            return Err(invalid("min_workers must be greater than 0"));
        }
        if self.primary_queue_capacity == 0 {
            return Err(invalid("primary_queue_capacity must be greater than 0"));
        }
        if self.temp_queue_capacity == 0 {
            return Err(invalid("temp_queue_capacity must be greater than 0"));
        }
        if self.idle_timeout.is_zero() {
            return Err(invalid("idle_timeout must be greater than 0"));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> Error {
    Error::InvalidConfig {
        reason: reason.to_string(),
    }
}
