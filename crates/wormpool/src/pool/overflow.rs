//! Overflow dispatcher: the pool's only unbounded buffer.
//!
//! When both queue tiers are full and the temporary worker budget is
//! exhausted, submitters hand jobs to this single task through a capacity-1
//! intake channel. The dispatcher is the sole owner of its backlog, so no lock
//! guards it. It republishes the oldest buffered job to Primary or Temp
//! whenever a worker frees a slot, and keeps accepting new jobs from the
//! intake in the meantime.
//!
//! Ordering is best effort: removal swaps the last buffered job into the
//! vacated front slot.
//!
//! On cancellation the dispatcher closes its intake and abandons every job it
//! still holds, so each one is reported as dropped rather than lost silently.

use super::generation::Generation;
use crate::{Job, task::abandon};
use async_channel::TrySendError;
use std::sync::Arc;
use tokio::sync::mpsc;

pub(crate) async fn dispatcher_loop<J: Job>(
    mut intake: mpsc::Receiver<J>,
    generation: Arc<Generation<J>>,
) {
    #[cfg(feature = "tracing")]
    tracing::trace!("Overflow dispatcher started");

    let mut backlog: Vec<J> = Vec::new();

    'dispatch: loop {
        if !flush(&mut backlog, &generation) {
            break 'dispatch;
        }

        if backlog.is_empty() {
            tokio::select! {
                biased;
                () = generation.shutdown_token.cancelled() => break 'dispatch,
                job = intake.recv() => match job {
                    Some(job) => backlog.push(job),
                    None => break 'dispatch,
                },
            }
        } else {
            tokio::select! {
                biased;
                () = generation.shutdown_token.cancelled() => break 'dispatch,
                () = generation.capacity_freed.notified() => {}
                job = intake.recv() => match job {
                    Some(job) => backlog.push(job),
                    None => break 'dispatch,
                },
            }
        }
    }

    // Permits reserved before `close` may still deliver; drain until the
    // channel reports it is empty and closed.
    intake.close();
    while let Some(job) = intake.recv().await {
        backlog.push(job);
    }

    #[cfg(feature = "tracing")]
    if !backlog.is_empty() {
        tracing::warn!(
            "Overflow dispatcher stopped with {} buffered jobs; reported as dropped",
            backlog.len()
        );
    }

    for job in backlog.drain(..) {
        abandon(job);
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Overflow dispatcher stopped");
}

/// Republishes buffered jobs until a tier is full or the backlog is empty.
///
/// Returns `false` once the tiers are closed, i.e. the pool is stopping.
fn flush<J: Job>(backlog: &mut Vec<J>, generation: &Generation<J>) -> bool {
    while !backlog.is_empty() {
        let job = backlog.swap_remove(0);
        match generation.offer(job) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => {
                restore_front(backlog, job);
                return true;
            }
            Err(TrySendError::Closed(job)) => {
                restore_front(backlog, job);
                return false;
            }
        }
    }
    true
}

/// Undoes a `swap_remove(0)`: puts `job` back at the front and the displaced
/// element back at the end.
fn restore_front<J>(backlog: &mut Vec<J>, job: J) {
    backlog.push(job);
    let last = backlog.len() - 1;
    backlog.swap(0, last);
}
