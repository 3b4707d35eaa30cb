//! Error types for the elastic worker pool.
//!
//! Two layers of failure are kept apart:
//!
//! - [`Error`] is returned by the pool itself (lifecycle misuse, invalid
//!   configuration, missing runtime, shutdown timeouts). These are the only
//!   conditions a caller of `submit` or `shutdown` ever observes directly.
//! - [`TaskError`] is delivered to a task's response callback. It carries the
//!   handler's own error, a recovered panic, or the notice that a queued task
//!   was discarded by `stop`.

use core::time::Duration;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Pool-level errors.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The pool is not running; the submission was not accepted.
    #[error("Pool is stopped")]
    PoolStopped,

    /// A [`crate::PoolConfig`] field is out of range.
    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    /// The pool was constructed outside of a Tokio runtime.
    #[error("No Tokio runtime available: {context}")]
    NoRuntime { context: String },

    /// Workers did not exit within the requested shutdown window.
    #[error("Shutdown timed out after {timeout:?}")]
    ShutdownTimeout { timeout: Duration },
}

/// Outcome reported to a task's callback when the task did not produce a
/// response.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum TaskError<E> {
    /// The handler returned an error.
    #[error("Task failed: {0:?}")]
    Failed(E),

    /// The handler panicked. The payload message is preserved when it is a
    /// string.
    #[error("Task panicked: {0}")]
    Panicked(String),

    /// The task was accepted but the pool stopped before a worker claimed it.
    #[error("Task dropped: pool stopped before it ran")]
    Dropped,
}

impl<E> TaskError<E> {
    /// Returns `true` if the handler panicked.
    pub const fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }

    /// Returns `true` if the task never ran.
    pub const fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped)
    }
}
