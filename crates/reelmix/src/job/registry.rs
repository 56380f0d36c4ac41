//! Process-wide job table.
//!
//! Every read and write of job state goes through [`JobRegistry`]. Writers
//! are the upload intake and the single background task owning each job;
//! readers get cloned snapshots and never observe a half-applied update.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use crate::broadcast::{JobProgressBroadcaster, JobProgressEvent};
use crate::error::JobError;
use crate::job::model::{
    progress_percent, CombinationResult, Job, JobState, ResultsSnapshot, StatusSnapshot,
};

pub struct JobRegistry {
    jobs: RwLock<HashMap<String, Job>>,
    progress: JobProgressBroadcaster,
}

impl JobRegistry {
    pub fn new(progress: JobProgressBroadcaster) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            progress,
        }
    }

    pub fn progress(&self) -> &JobProgressBroadcaster {
        &self.progress
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Job>> {
        match self.jobs.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Job>> {
        match self.jobs.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Applies `f` to the job under the write lock, then publishes the
    /// resulting state with `message`.
    fn mutate<T>(
        &self,
        job_id: &str,
        message: &str,
        f: impl FnOnce(&mut Job) -> Result<T, JobError>,
    ) -> Result<T, JobError> {
        let (value, event) = {
            let mut jobs = self.write();
            let job = jobs
                .get_mut(job_id)
                .ok_or_else(|| JobError::not_found(job_id))?;
            let value = f(job)?;
            job.updated_at = Utc::now();
            (value, JobProgressEvent::from_job(job, message))
        };
        self.progress.send(event);
        Ok(value)
    }

    /// Registers a job in `accepted` state, or returns the existing entry's
    /// id untouched apart from merging `labels`. Used by upload intake.
    pub fn accept(&self, job_id: Option<&str>, labels: HashMap<String, String>) -> String {
        let job_id = job_id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let event = {
            let mut jobs = self.write();
            let job = jobs.entry(job_id.clone()).or_insert_with(|| {
                log::debug!("Registered job {}", job_id);
                Job::new(job_id.clone(), String::new())
            });
            job.labels.extend(labels);
            job.updated_at = Utc::now();
            JobProgressEvent::from_job(job, "Job accepted")
        };
        self.progress.send(event);
        job_id
    }

    /// Creates the job if needed and moves it from `accepted` to
    /// `processing` in one step. An existing job keeps its labels.
    pub fn start(
        &self,
        job_id: Option<&str>,
        project_name: &str,
        total: usize,
    ) -> Result<String, JobError> {
        if total == 0 {
            return Err(JobError::validation("combination list is empty"));
        }
        let job_id = job_id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let event = {
            let mut jobs = self.write();
            let job = jobs
                .entry(job_id.clone())
                .or_insert_with(|| Job::new(job_id.clone(), String::new()));

            if job.state != JobState::Accepted {
                return Err(JobError::InvalidTransition {
                    job_id,
                    from: job.state,
                    to: JobState::Processing,
                });
            }

            job.project_name = project_name.to_string();
            job.state = JobState::Processing;
            job.total = total;
            job.completed_count = 0;
            job.progress_percent = 0;
            job.results.clear();
            job.updated_at = Utc::now();
            JobProgressEvent::from_job(job, &format!("Processing {} combinations", total))
        };

        log::info!("Job {} started with {} combinations", job_id, total);
        self.progress.send(event);
        Ok(job_id)
    }

    /// Appends the outcome of the next combination and advances progress.
    pub fn record_result(
        &self,
        job_id: &str,
        result: CombinationResult,
    ) -> Result<StatusSnapshot, JobError> {
        let message = format!("Combination {} attempted", result.index() + 1);
        self.mutate(job_id, &message, |job| {
            if job.state != JobState::Processing {
                return Err(JobError::RejectedResult {
                    job_id: job.id.clone(),
                    reason: format!("job is {}", job.state),
                });
            }
            if job.completed_count >= job.total {
                return Err(JobError::RejectedResult {
                    job_id: job.id.clone(),
                    reason: "all combinations already attempted".to_string(),
                });
            }
            if result.index() != job.completed_count {
                return Err(JobError::RejectedResult {
                    job_id: job.id.clone(),
                    reason: format!(
                        "expected combination {}, got {}",
                        job.completed_count,
                        result.index()
                    ),
                });
            }

            job.results.push(result);
            job.completed_count = job.results.len();
            job.progress_percent = progress_percent(job.completed_count, job.total);
            Ok(job.status())
        })
    }

    /// Marks a fully attempted job completed with its archive location.
    pub fn complete(&self, job_id: &str, archive_location: PathBuf) -> Result<(), JobError> {
        self.mutate(job_id, "Job completed", |job| {
            if job.state != JobState::Processing {
                return Err(JobError::InvalidTransition {
                    job_id: job.id.clone(),
                    from: job.state,
                    to: JobState::Completed,
                });
            }
            if job.completed_count != job.total {
                return Err(JobError::RejectedResult {
                    job_id: job.id.clone(),
                    reason: format!(
                        "only {} of {} combinations attempted",
                        job.completed_count, job.total
                    ),
                });
            }
            job.state = JobState::Completed;
            job.archive_location = Some(archive_location);
            job.finished_at = Some(Utc::now());
            Ok(())
        })?;
        log::info!("Job {} completed", job_id);
        Ok(())
    }

    /// Moves a non-terminal job to `failed`.
    pub fn fail(&self, job_id: &str, reason: &str) -> Result<(), JobError> {
        self.mutate(job_id, "Job failed", |job| {
            if job.state.is_terminal() {
                return Err(JobError::InvalidTransition {
                    job_id: job.id.clone(),
                    from: job.state,
                    to: JobState::Failed,
                });
            }
            job.state = JobState::Failed;
            job.failure_reason = Some(reason.to_string());
            job.finished_at = Some(Utc::now());
            Ok(())
        })?;
        log::error!("Job {} failed: {}", job_id, reason);
        Ok(())
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.read().contains_key(job_id)
    }

    /// Returns a snapshot of the job.
    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.read().get(job_id).cloned()
    }

    pub fn status(&self, job_id: &str) -> Result<StatusSnapshot, JobError> {
        self.read()
            .get(job_id)
            .map(Job::status)
            .ok_or_else(|| JobError::not_found(job_id))
    }

    pub fn results(&self, job_id: &str) -> Result<ResultsSnapshot, JobError> {
        self.read()
            .get(job_id)
            .map(Job::results_snapshot)
            .ok_or_else(|| JobError::not_found(job_id))
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.read().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Returns (accepted, processing, completed, failed).
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        let jobs = self.read();
        let count = |state: JobState| jobs.values().filter(|j| j.state == state).count();
        (
            count(JobState::Accepted),
            count(JobState::Processing),
            count(JobState::Completed),
            count(JobState::Failed),
        )
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(JobProgressBroadcaster::default())
    }
}
