//! Broadcasting of job progress for real-time status streaming.
//!
//! Any integration (CLI, transport layer) can subscribe without touching
//! the job registry.

pub mod job_progress;

pub use job_progress::{JobProgressBroadcaster, JobProgressEvent};
