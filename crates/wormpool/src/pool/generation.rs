//! Per-start state of an [`super::ElasticPool`].
//!
//! A [`Generation`] is allocated on every `start` and torn down by `stop`. It
//! owns the two queue tiers, the temporary worker counter, the shared
//! cancellation token, and the tracker that lets `shutdown` wait for every
//! task it spawned. Restarting a pool creates a fresh generation, so nothing
//! from a stopped run leaks into the next one.

use super::{overflow, worker};
use crate::{
    Error, Job, PoolConfig, Result, WorkerHook,
    config::OVERFLOW_INTAKE_CAPACITY,
    task::abandon,
};
use async_channel::{Receiver, Sender, TrySendError};
use core::time::Duration;
use crossbeam_utils::CachePadded;
use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::{
    runtime::Handle,
    sync::{Notify, mpsc},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

/// How many temporary workers may exist at once.
enum TempBudget<J> {
    Unlimited,
    /// Bounded budget. Once it is exhausted, submissions go through the
    /// overflow dispatcher's intake.
    Bounded {
        max: usize,
        intake: mpsc::Sender<J>,
    },
}

pub(crate) struct Generation<J> {
    pub(crate) primary_rx: Receiver<J>,
    pub(crate) temp_rx: Receiver<J>,
    pub(crate) shutdown_token: CancellationToken,
    pub(crate) idle_timeout: Duration,
    /// Signalled each time a worker claims a queued job, freeing a slot.
    pub(crate) capacity_freed: Notify,
    primary_tx: Sender<J>,
    temp_tx: Sender<J>,
    budget: TempBudget<J>,
    temp_workers: CachePadded<AtomicUsize>,
    hook: Option<Arc<dyn WorkerHook>>,
    tracker: TaskTracker,
    handle: Handle,
}

impl<J: Job> Generation<J> {
    /// Allocates the queues and spawns the permanent workers and, for a
    /// bounded temporary budget, the overflow dispatcher.
    pub(crate) fn launch(config: &PoolConfig, handle: &Handle) -> Arc<Self> {
        let (primary_tx, primary_rx) = async_channel::bounded(config.primary_queue_capacity);
        let (temp_tx, temp_rx) = async_channel::bounded(config.temp_queue_capacity);

        let (budget, intake_rx) = match config.max_temp_workers {
            None => (TempBudget::Unlimited, None),
            Some(max) => {
                let (intake, intake_rx) = mpsc::channel(OVERFLOW_INTAKE_CAPACITY);
                (TempBudget::Bounded { max, intake }, Some(intake_rx))
            }
        };

        let generation = Arc::new(Self {
            primary_rx,
            temp_rx,
            shutdown_token: CancellationToken::new(),
            idle_timeout: config.idle_timeout,
            capacity_freed: Notify::new(),
            primary_tx,
            temp_tx,
            budget,
            temp_workers: CachePadded::new(AtomicUsize::new(0)),
            hook: config.hook.clone(),
            tracker: TaskTracker::new(),
            handle: handle.clone(),
        });

        for worker_id in 0..config.min_workers {
            generation.tracker.spawn_on(
                worker::permanent_worker_loop(worker_id, Arc::clone(&generation)),
                handle,
            );
        }

        if let Some(intake_rx) = intake_rx {
            generation.tracker.spawn_on(
                overflow::dispatcher_loop(intake_rx, Arc::clone(&generation)),
                handle,
            );
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Pool started with {} permanent workers (temp budget: {:?})",
            config.min_workers,
            config.max_temp_workers
        );

        generation
    }

    pub(crate) fn hook(&self) -> Option<&dyn WorkerHook> {
        self.hook.as_deref()
    }

    pub(crate) fn temp_workers(&self) -> usize {
        self.temp_workers.load(Ordering::Acquire)
    }

    /// Routes a job: Primary, then Temp, then a new temporary worker, then the
    /// overflow intake.
    ///
    /// Only the last step can suspend the caller.
    pub(crate) async fn dispatch(self: &Arc<Self>, job: J) -> Result<()> {
        let job = match self.offer(job) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Closed(_)) => return Err(Error::PoolStopped),
            Err(TrySendError::Full(job)) => job,
        };

        match &self.budget {
            TempBudget::Unlimited => {
                let count = self.temp_workers.fetch_add(1, Ordering::AcqRel) + 1;
                self.spawn_temp_worker(count, job);
                Ok(())
            }
            TempBudget::Bounded { max, intake } => {
                if let Some(count) = self.reserve_temp_worker(*max) {
                    self.spawn_temp_worker(count, job);
                    return Ok(());
                }

                tokio::select! {
                    biased;
                    () = self.shutdown_token.cancelled() => Err(Error::PoolStopped),
                    permit = intake.reserve() => match permit {
                        Ok(permit) => {
                            permit.send(job);
                            Ok(())
                        }
                        Err(_) => Err(Error::PoolStopped),
                    },
                }
            }
        }
    }

    /// Non-blocking send to Primary, falling back to Temp.
    pub(crate) fn offer(&self, job: J) -> core::result::Result<(), TrySendError<J>> {
        match self.primary_tx.try_send(job) {
            Err(TrySendError::Full(job)) => self.temp_tx.try_send(job),
            other => other,
        }
    }

    /// Marks a queued job as claimed by a worker.
    pub(crate) fn claimed(&self) {
        self.capacity_freed.notify_one();
    }

    /// Decrements the live temporary worker count, returning the new value.
    pub(crate) fn release_temp_worker(&self) -> usize {
        self.temp_workers.fetch_sub(1, Ordering::AcqRel) - 1
    }

    /// Cancels every loop, closes both tiers, and abandons whatever was still
    /// queued in them. Returns the number of abandoned jobs.
    ///
    /// Jobs buffered by the overflow dispatcher are abandoned by the dispatcher
    /// itself once it observes the cancellation.
    pub(crate) fn close(&self) -> usize {
        self.shutdown_token.cancel();
        self.primary_tx.close();
        self.temp_tx.close();
        self.tracker.close();

        let mut dropped = 0;
        for rx in [&self.primary_rx, &self.temp_rx] {
            while let Ok(job) = rx.try_recv() {
                abandon(job);
                dropped += 1;
            }
        }

        #[cfg(feature = "tracing")]
        if dropped > 0 {
            tracing::warn!("Pool stopped with {dropped} queued jobs; reported as dropped");
        }

        dropped
    }

    /// Waits for every task spawned by this generation to exit.
    pub(crate) async fn wait(&self) {
        self.tracker.wait().await;
    }

    /// Atomically takes one slot of a bounded temporary budget.
    fn reserve_temp_worker(&self, max: usize) -> Option<usize> {
        self.temp_workers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                (count < max).then_some(count + 1)
            })
            .ok()
            .map(|previous| previous + 1)
    }

    fn spawn_temp_worker(self: &Arc<Self>, count: usize, seed: J) {
        self.tracker.spawn_on(
            worker::temp_worker_loop(Arc::clone(self), count, seed),
            &self.handle,
        );
    }
}
