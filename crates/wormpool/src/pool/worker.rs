use super::generation::Generation;
use crate::{Job, task::execute};
use std::sync::Arc;
use tokio::time::{Instant, sleep};

/// Permanent worker: lives until the generation is cancelled.
///
/// Receives from the primary queue first and falls back to the temporary
/// queue, so jobs parked in the temporary tier still make progress when no
/// temporary worker is alive (including a zero temporary budget).
///
/// # Arguments
///
/// - `_worker_id`: Slot index, used for logs only.
/// - `generation`: Queues and cancellation token of the current run.
pub(crate) async fn permanent_worker_loop<J: Job>(
    _worker_id: usize,
    generation: Arc<Generation<J>>,
) {
    #[cfg(feature = "tracing")]
    tracing::trace!("Permanent worker {_worker_id} started");

    loop {
        let received = tokio::select! {
            biased;
            () = generation.shutdown_token.cancelled() => break,
            job = generation.primary_rx.recv() => job,
            job = generation.temp_rx.recv() => job,
        };

        let Ok(job) = received else {
            #[cfg(feature = "tracing")]
            tracing::debug!("Permanent worker {_worker_id} queue closed");
            break;
        };

        generation.claimed();
        execute(job, generation.hook()).await;
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Permanent worker {_worker_id} stopped");
}

/// Temporary worker: runs its seed job, then serves the temporary queue until
/// it has been idle for `idle_timeout` or the generation is cancelled.
///
/// `count` is the live temporary worker count after this worker was reserved;
/// the caller has already incremented the counter.
pub(crate) async fn temp_worker_loop<J: Job>(
    generation: Arc<Generation<J>>,
    count: usize,
    seed: J,
) {
    if let Some(hook) = generation.hook() {
        hook.on_join(count);
    }
    #[cfg(feature = "tracing")]
    tracing::debug!("Temporary worker joined ({count} live)");

    execute(seed, generation.hook()).await;

    let idle = sleep(generation.idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            biased;
            () = generation.shutdown_token.cancelled() => break,
            job = generation.temp_rx.recv() => {
                let Ok(job) = job else { break };
                generation.claimed();
                execute(job, generation.hook()).await;
                idle.as_mut().reset(Instant::now() + generation.idle_timeout);
            }
            () = &mut idle => {
                #[cfg(feature = "tracing")]
                tracing::trace!("Temporary worker idle for {:?}, retiring", generation.idle_timeout);
                break;
            }
        }
    }

    let remaining = generation.release_temp_worker();
    #[cfg(feature = "tracing")]
    tracing::debug!("Temporary worker left ({remaining} live)");
    if let Some(hook) = generation.hook() {
        hook.on_leave(remaining);
    }
}
