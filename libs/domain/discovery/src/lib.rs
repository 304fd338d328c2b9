// [libs/domain/discovery/src/lib.rs]
//! The Discovery Crawler: bounded breadth-first expansion from a seed
//! set into a directed graph of observed `t.me`/`@username`
//! references, scored and fan-out-capped per entity.

pub mod errors;
pub mod pipeline;
pub mod scan;
pub mod scoring;

pub use errors::DiscoveryError;
pub use pipeline::{DiscoveryCrawler, DiscoverySummary, OP_CLASS};
