pub mod dispatch;
pub mod feed;
pub mod summary;
pub mod thresholds;
