// [libs/domain/scheduler/src/pool.rs]
//! Bounded worker pool over the three priority queues: a bounded
//! worker pool (default 4) consumes from three priority queues
//! (archival > forwarding > discovery; operator-pinned jobs jump to
//! the front of their queue). Grounded on the source's
//! `StrategyExecutor` polymorphic dispatch — here the polymorphism is
//! over job kind rather than search strategy, and the "collision
//! handler" is the pipeline-supplied [`Runner`].

use crate::errors::SchedulerError;
use crate::lease::{AccountSelector, LeasePolicy};
use crate::queue::JobQueue;
use crate::runner::{Runner, StepOutcome};
use chrono::Utc;
use spectra_governor::{Governor, OpClass};
use spectra_persistence::{ArchiveJobRepository, DiscoveryJobRepository, ForwardJobRepository};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Concurrent workers draining the three queues (default 4).
    pub worker_count: usize,
    /// Jobs reaching this many attempts terminate `failed` instead of
    /// re-queuing — an operator-configured attempt cap.
    pub attempt_cap: u32,
    /// How long an idle worker sleeps before polling the queues again.
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig { worker_count: 4, attempt_cap: 5, poll_interval: Duration::from_millis(250) }
    }
}

/// One pipeline's queue plus the runner that executes its jobs.
pub struct QueueBinding<Q: JobQueue> {
    pub queue: Q,
    pub runner: Arc<dyn Runner<Q>>,
    pub op_class: OpClass,
}

pub struct WorkerPool {
    config: SchedulerConfig,
    selector: Arc<AccountSelector>,
    governor: Arc<Governor>,
}

impl WorkerPool {
    pub fn new(config: SchedulerConfig, selector: Arc<AccountSelector>, governor: Arc<Governor>) -> Self {
        WorkerPool { config, selector, governor }
    }

    /// Spawns `worker_count` tasks draining the archival, forward, and
    /// discovery queues in that priority order, until `shutdown` is
    /// signalled. `default_policy` applies to jobs with no per-job
    /// `pinned_account_id`; a pinned job always overrides it for that
    /// one lease attempt. Returns the spawned tasks' handles so the
    /// caller can await a clean drain.
    pub fn spawn(
        &self,
        archival: QueueBinding<ArchiveJobRepository>,
        forward: QueueBinding<ForwardJobRepository>,
        discovery: QueueBinding<DiscoveryJobRepository>,
        default_policy: LeasePolicy,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let archival = Arc::new(archival);
        let forward = Arc::new(forward);
        let discovery = Arc::new(discovery);

        (0..self.config.worker_count)
            .map(|worker_index| {
                let selector = self.selector.clone();
                let governor = self.governor.clone();
                let archival = archival.clone();
                let forward = forward.clone();
                let discovery = discovery.clone();
                let mut shutdown = shutdown.clone();
                let config = self.config;
                let default_policy = default_policy;

                tokio::spawn(async move {
                    info!(worker_index, "scheduler worker started");
                    loop {
                        if *shutdown.borrow() {
                            break;
                        }

                        let processed = drive_one_cycle(&archival, &forward, &discovery, &selector, &governor, default_policy, config.attempt_cap).await;

                        if !processed {
                            tokio::select! {
                                _ = tokio::time::sleep(config.poll_interval) => {}
                                _ = shutdown.changed() => {}
                            }
                        }
                    }
                    info!(worker_index, "scheduler worker stopped");
                })
            })
            .collect()
    }
}

/// Tries the three queues in priority order, processing at most one
/// job total. Returns whether any job was claimed, so the caller
/// avoids sleeping on a busy queue.
async fn drive_one_cycle(
    archival: &QueueBinding<ArchiveJobRepository>,
    forward: &QueueBinding<ForwardJobRepository>,
    discovery: &QueueBinding<DiscoveryJobRepository>,
    selector: &AccountSelector,
    governor: &Governor,
    policy: LeasePolicy,
    attempt_cap: u32,
) -> bool {
    if run_one(&archival.queue, archival.runner.as_ref(), selector, governor, archival.op_class, attempt_cap, policy).await {
        return true;
    }
    if run_one(&forward.queue, forward.runner.as_ref(), selector, governor, forward.op_class, attempt_cap, policy).await {
        return true;
    }
    run_one(&discovery.queue, discovery.runner.as_ref(), selector, governor, discovery.op_class, attempt_cap, policy).await
}

/// Claims and fully processes at most one job from `queue`. Returns
/// `false` only when the queue had nothing eligible to claim — every
/// other outcome (including lease failure) is handled and reported as
/// `true`, since a job was taken off the queue.
#[instrument(skip_all, fields(op_class = ?op_class))]
async fn run_one<Q: JobQueue>(
    queue: &Q,
    runner: &dyn Runner<Q>,
    selector: &AccountSelector,
    governor: &Governor,
    op_class: OpClass,
    attempt_cap: u32,
    policy: LeasePolicy,
) -> bool {
    let job = match queue.claim_next(Utc::now()).await {
        Ok(Some(job)) => job,
        Ok(None) => return false,
        Err(error) => {
            warn!(%error, "failed to poll job queue");
            return false;
        }
    };
    let id = Q::job_id(&job);
    let effective_policy = Q::pinned_account_id(&job).map(LeasePolicy::Pinned).unwrap_or(policy);

    let handle = match selector.lease(effective_policy, op_class, governor).await {
        Ok(handle) => handle,
        Err(SchedulerError::RetryAfter(wait)) => {
            requeue(queue, id, "no admitted account available", wait, attempt_cap).await;
            return true;
        }
        Err(SchedulerError::NoEligibleAccount) => {
            requeue(queue, id, "no eligible account", Duration::from_secs(30), attempt_cap).await;
            return true;
        }
        Err(error) => {
            warn!(%error, job_id = id, "unexpected error leasing account");
            requeue(queue, id, &error.to_string(), Duration::from_secs(30), attempt_cap).await;
            return true;
        }
    };

    let account_id = handle.account_id;
    let outcome = runner.run(job, handle.clone()).await;

    match outcome {
        StepOutcome::Completed => {
            if let Err(error) = queue.complete(id).await {
                warn!(%error, job_id = id, "failed to record job completion");
            }
            governor.on_success(account_id);
        }
        StepOutcome::Retry { cause, after } => {
            governor.on_flood_wait(account_id, after);
            requeue(queue, id, &cause, after, attempt_cap).await;
        }
        StepOutcome::AuthFailure { cause } => {
            if let Err(error) = selector.mark_banned(account_id).await {
                warn!(%error, account_id, "failed to record auth failure");
            }
            requeue(queue, id, &cause, Duration::ZERO, attempt_cap).await;
        }
        StepOutcome::Cancelled => {
            if let Err(error) = queue.cancel(id).await {
                warn!(%error, job_id = id, "failed to record job cancellation");
            }
        }
    }

    selector.release(&handle);
    true
}

async fn requeue<Q: JobQueue>(queue: &Q, id: i64, cause: &str, after: Duration, attempt_cap: u32) {
    let earliest_run_at = Utc::now() + chrono::Duration::from_std(after).unwrap_or(chrono::Duration::zero());
    if let Err(error) = queue.retry_or_fail(id, cause, earliest_run_at, attempt_cap).await {
        warn!(%error, job_id = id, "failed to requeue job");
    }
}
