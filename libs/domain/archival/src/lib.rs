// [libs/domain/archival/src/lib.rs]
//! Archival Pipeline: resumable, checkpoint-driven per-entity message
//! and media capture, dispatched by the Scheduler's worker pool
//! through `Runner<ArchiveJobRepository>`.

pub mod errors;
pub mod pipeline;
pub mod summary;

pub use errors::ArchivalError;
pub use pipeline::{ArchivalPipeline, OP_CLASS};
pub use summary::{build_summary, ArchiveSummary};
