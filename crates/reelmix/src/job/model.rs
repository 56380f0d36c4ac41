use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a job. Variants are declared in transition order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Accepted,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Accepted => "accepted",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An output file produced by one successful concatenation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProducedArtifact {
    /// Zero-based combination index.
    pub index: usize,
    pub file_name: String,
    /// Asset names in role order.
    pub composition: [String; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    /// Route under which the file is retrievable.
    pub download_ref: String,
}

impl ProducedArtifact {
    pub fn composition_label(&self) -> String {
        self.composition.join(" + ")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    AssetResolution,
    Execution,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CombinationFailure {
    pub index: usize,
    pub assets: [String; 3],
    pub kind: FailureKind,
    pub error: String,
}

/// Outcome of attempting one combination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CombinationResult {
    Produced(ProducedArtifact),
    Failed(CombinationFailure),
}

impl CombinationResult {
    pub fn index(&self) -> usize {
        match self {
            CombinationResult::Produced(artifact) => artifact.index,
            CombinationResult::Failed(failure) => failure.index,
        }
    }

    pub fn is_produced(&self) -> bool {
        matches!(self, CombinationResult::Produced(_))
    }

    pub fn artifact(&self) -> Option<&ProducedArtifact> {
        match self {
            CombinationResult::Produced(artifact) => Some(artifact),
            CombinationResult::Failed(_) => None,
        }
    }
}

/// Rounds `completed / total` to a whole percentage, halves rounding up.
pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total) as u64;
    let total = total as u64;
    ((completed * 200 + total) / (2 * total)) as u8
}

/// A batch job and everything observed about it so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub project_name: String,
    pub state: JobState,
    pub total: usize,
    pub completed_count: usize,
    pub progress_percent: u8,
    pub results: Vec<CombinationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_location: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Client-supplied role hints from upload, informational only.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(id: String, project_name: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            project_name,
            state: JobState::Accepted,
            total: 0,
            completed_count: 0,
            progress_percent: 0,
            results: Vec::new(),
            archive_location: None,
            failure_reason: None,
            labels: HashMap::new(),
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn produced(&self) -> impl Iterator<Item = &ProducedArtifact> {
        self.results.iter().filter_map(CombinationResult::artifact)
    }

    pub fn failure_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_produced()).count()
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            job_id: self.id.clone(),
            status: self.state,
            progress_percent: self.progress_percent,
            completed_count: self.completed_count,
            total: self.total,
        }
    }

    pub fn results_snapshot(&self) -> ResultsSnapshot {
        ResultsSnapshot {
            job_id: self.id.clone(),
            status: self.state,
            results: self.results.clone(),
            archive_location: self.archive_location.clone(),
            failure_reason: self.failure_reason.clone(),
        }
    }
}

/// Point-in-time answer to a status query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub job_id: String,
    pub status: JobState,
    pub progress_percent: u8,
    pub completed_count: usize,
    pub total: usize,
}

/// Point-in-time answer to a results query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultsSnapshot {
    pub job_id: String,
    pub status: JobState,
    pub results: Vec<CombinationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_location: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}
