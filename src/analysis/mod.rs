//! Decision logic for the flood alert pipeline.
//!
//! Submodules:
//! - `trend`: rising / falling / stable classification of water height.
//! - `risk`: Low / Medium / High risk scoring, remote with local fallback.

pub mod risk;
pub mod trend;
