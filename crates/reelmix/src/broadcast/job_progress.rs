//! Job progress broadcaster for real-time job status streaming.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::job::{Job, JobState};

/// Progress event for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    /// Unique job identifier.
    pub job_id: String,
    /// Job state after the change this event reports.
    pub state: JobState,
    pub completed_count: usize,
    pub total: usize,
    pub progress_percent: u8,
    /// Human-readable message describing current activity.
    pub message: String,
    /// Timestamp of this event.
    pub timestamp: DateTime<Utc>,
    /// Archive location (set on completion).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_location: Option<PathBuf>,
    /// Failure reason (set on job failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobProgressEvent {
    /// Creates an event describing the current state of `job`.
    pub fn from_job(job: &Job, message: &str) -> Self {
        Self {
            job_id: job.id.clone(),
            state: job.state,
            completed_count: job.completed_count,
            total: job.total,
            progress_percent: job.progress_percent,
            message: message.to_string(),
            timestamp: Utc::now(),
            archive_location: job.archive_location.clone(),
            error: job.failure_reason.clone(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Broadcasts job progress events for streaming.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressBroadcaster {
    /// Creates a new job progress broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends a progress event to all subscribers.
    pub fn send(&self, event: JobProgressEvent) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(event);
    }

    /// Creates a new subscriber for progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcaster_send_receive() {
        let broadcaster = JobProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();

        let mut job = Job::new("test-job".to_string(), "demo".to_string());
        job.state = JobState::Processing;
        job.total = 4;
        broadcaster.send(JobProgressEvent::from_job(&job, "Processing 1/4"));

        let received = rx.try_recv().unwrap();
        assert_eq!(received.job_id, "test-job");
        assert_eq!(received.state, JobState::Processing);
        assert_eq!(received.total, 4);
        assert_eq!(received.message, "Processing 1/4");
        assert!(!received.is_terminal());
    }

    #[test]
    fn test_send_without_receivers_is_ok() {
        let broadcaster = JobProgressBroadcaster::default();
        let job = Job::new("j".to_string(), "demo".to_string());
        broadcaster.send(JobProgressEvent::from_job(&job, "accepted"));
        assert_eq!(broadcaster.receiver_count(), 0);
    }

    #[test]
    fn test_failure_event_carries_error() {
        let broadcaster = JobProgressBroadcaster::new(4);
        let mut rx = broadcaster.subscribe();

        let mut job = Job::new("job-3".to_string(), "demo".to_string());
        job.state = JobState::Failed;
        job.failure_reason = Some("disk full".to_string());
        broadcaster.send(JobProgressEvent::from_job(&job, "Job failed"));

        let received = rx.try_recv().unwrap();
        assert!(received.is_terminal());
        assert_eq!(received.error.as_deref(), Some("disk full"));
    }
}
