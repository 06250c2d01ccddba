pub mod retrieve;
pub mod timestamp;
pub mod trigger;
pub mod validate;

pub use retrieve::{retrieve, Retrieved, RetryPolicy, SnapshotRequest, DEFAULT_MAX_ATTEMPTS};
pub use timestamp::{resolve_latest_timestamp, snapshot_file_name};
pub use trigger::request_fresh_capture;
