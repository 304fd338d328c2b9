// [libs/domain/scheduler/src/lib.rs]
//! Account Scheduler: binds queued jobs to leased `(account, proxy)`
//! pairs, runs them through a bounded worker pool,
//! and applies the round-robin/smart/pinned selection policy plus the
//! RetryAfter/auth-failure/attempt-cap failure policy shared by the
//! archival, forward, and discovery queues.

pub mod errors;
pub mod lease;
pub mod pool;
pub mod queue;
pub mod runner;

pub use errors::SchedulerError;
pub use lease::{AccountSelector, LeasePolicy};
pub use pool::{QueueBinding, SchedulerConfig, WorkerPool};
pub use queue::JobQueue;
pub use runner::{Runner, StepOutcome};
