//! The unit of work dispatched by the pool and the wrapper that executes it.
//!
//! Every call site that runs user code (permanent loop, temporary loop, and
//! the `stop` drain that reports discarded jobs) goes through [`execute`] or
//! [`abandon`], so a panic never crosses a worker boundary.

use crate::WorkerHook;
use core::{any::Any, future::Future, panic::AssertUnwindSafe};
use futures::FutureExt;

/// A job that can be queued on an [`crate::ElasticPool`].
///
/// Implementations own whatever they need to report their own outcome (for
/// example a response callback). The pool only guarantees that each accepted
/// job is either run or abandoned, exactly once.
pub trait Job: Send + 'static {
    /// Executes the job to completion.
    fn run(self) -> impl Future<Output = ()> + Send;

    /// Called instead of [`Job::run`] when the pool stops before any worker
    /// claimed the job.
    fn abandon(self);
}

/// Runs a job, absorbing any panic that escapes it.
///
/// Absorbed panics are logged and forwarded to [`WorkerHook::on_panic`].
pub(crate) async fn execute<J: Job>(job: J, hook: Option<&dyn WorkerHook>) {
    let outcome = AssertUnwindSafe(async move { job.run().await })
        .catch_unwind()
        .await;

    if let Err(payload) = outcome {
        let message = panic_message(payload.as_ref());
        #[cfg(feature = "tracing")]
        tracing::error!("Recovered panic in worker: {message}");
        if let Some(hook) = hook {
            hook.on_panic(&message);
        }
    }
}

/// Reports a job as discarded, absorbing any panic raised by its callback.
pub(crate) fn abandon<J: Job>(job: J) {
    if let Err(_payload) = std::panic::catch_unwind(AssertUnwindSafe(|| job.abandon())) {
        #[cfg(feature = "tracing")]
        tracing::error!(
            "Recovered panic while abandoning job: {}",
            panic_message(_payload.as_ref())
        );
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
