// [libs/domain/scheduler/src/runner.rs]
//! `Runner`: the interface the Archival, Forwarder, and Discovery
//! pipelines implement so the worker pool can drive all three through
//! one dispatch loop — each worker acquires a lease, runs one pipeline
//! step to completion, releases the lease, and re-enters the pool.
//! Mirrors the source's polymorphic `FindingHandler`/engine dispatch,
//! but the worker pool calls out to the pipeline instead of the other
//! way around.

use crate::queue::JobQueue;
use async_trait::async_trait;
use spectra_credentials::AccountHandle;
use std::time::Duration;

/// Result of running exactly one pipeline step against a leased
/// account.
#[derive(Debug)]
pub enum StepOutcome {
    /// The job finished; mark it `succeeded`.
    Completed,
    /// A retryable condition (flood-wait, network timeout, protocol
    /// error) — re-queue with the given cause and delay.
    Retry { cause: String, after: Duration },
    /// The account itself failed auth; the Registry is notified and the
    /// job re-enters the queue for a different account to pick up.
    AuthFailure { cause: String },
    /// Cooperative cancellation observed at a batch boundary.
    Cancelled,
}

#[async_trait]
pub trait Runner<Q: JobQueue>: Send + Sync {
    async fn run(&self, job: Q::Job, account: AccountHandle) -> StepOutcome;
}
