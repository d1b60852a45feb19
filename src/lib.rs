//! Flood alert decision pipeline.
//!
//! Sensor alerts arrive as store snapshots. For each new flood-relevant alert
//! the pipeline tracks the water-level trend, scores flood risk and composes
//! a situation summary. Both scoring and summarization prefer a remote
//! language model and fall back to local rules whenever it is unavailable.

pub mod alert;
pub mod analysis;
pub mod config;
pub mod inference;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod store;
