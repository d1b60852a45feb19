//! Decoding of the pipeline's two inputs: alert snapshots from the document
//! store and current weather conditions.
//!
//! Submodules:
//! - `records`: lenient decoding of alert documents.
//! - `weather`: current-conditions payload to [`WeatherContext`](crate::model::WeatherContext).

pub mod records;
pub mod weather;
