use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::job::JobState;

#[derive(Error, Debug)]
pub enum ReelmixError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("Asset '{asset}' is not registered for job {job_id}")]
    NotFound { job_id: String, asset: String },
}

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Media tool not found (searched: {})", format_candidates(.searched))]
    ToolNotFound { searched: Vec<PathBuf> },

    #[error("Input file '{path}' does not exist")]
    MissingInput { path: PathBuf },

    #[error("Failed to write manifest '{path}': {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Media tool exited with {}: {diagnostic}", format_exit(.code))]
    NonZeroExit {
        code: Option<i32>,
        diagnostic: String,
    },

    #[error("Media tool timed out after {:?}", .timeout)]
    Timeout { timeout: Duration },

    #[error("Failed waiting for media tool: {0}")]
    Wait(#[source] std::io::Error),
}

fn format_candidates(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "nothing".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to create archive '{path}': {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to add '{name}' to archive: {source}")]
    AddEntry {
        name: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to read artifact '{path}': {source}")]
    ReadArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to finalize archive '{path}': {message}")]
    Finalize { path: PathBuf, message: String },

    #[error("Archive task aborted: {0}")]
    Task(String),
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Invalid job request: {message}")]
    Validation { message: String },

    #[error("Job not found: {job_id}")]
    NotFound { job_id: String },

    #[error("File '{filename}' not found for job {job_id}")]
    FileNotFound { job_id: String, filename: String },

    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobState,
        to: JobState,
    },

    #[error("Job {job_id} rejected result: {reason}")]
    RejectedResult { job_id: String, reason: String },

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to store upload '{path}': {source}")]
    StoreUpload {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open '{path}': {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl JobError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn not_found(job_id: &str) -> Self {
        Self::NotFound {
            job_id: job_id.to_string(),
        }
    }

    /// True for the errors a caller should surface as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::FileNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, ReelmixError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonzero_exit_message_includes_diagnostic() {
        let err = ExecutionError::NonZeroExit {
            code: Some(1),
            diagnostic: "list_0.txt: Invalid data found".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("status 1"));
        assert!(msg.contains("Invalid data found"));
    }

    #[test]
    fn test_signal_exit_message() {
        let err = ExecutionError::NonZeroExit {
            code: None,
            diagnostic: String::new(),
        };
        assert!(err.to_string().contains("a signal"));
    }

    #[test]
    fn test_timeout_message_keeps_subsecond_precision() {
        let err = ExecutionError::Timeout {
            timeout: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "Media tool timed out after 250ms");
    }

    #[test]
    fn test_tool_not_found_lists_candidates() {
        let err = ExecutionError::ToolNotFound {
            searched: vec![PathBuf::from("/opt/ffmpeg"), PathBuf::from("ffmpeg")],
        };
        assert_eq!(
            err.to_string(),
            "Media tool not found (searched: /opt/ffmpeg, ffmpeg)"
        );
    }

    #[test]
    fn test_job_error_not_found_classification() {
        assert!(JobError::not_found("x").is_not_found());
        assert!(JobError::FileNotFound {
            job_id: "x".to_string(),
            filename: "a.mp4".to_string(),
        }
        .is_not_found());
        assert!(!JobError::validation("empty").is_not_found());
    }

    #[test]
    fn test_top_level_conversion() {
        let err: ReelmixError = AssetError::NotFound {
            job_id: "j".to_string(),
            asset: "A.mp4".to_string(),
        }
        .into();
        assert!(matches!(err, ReelmixError::Asset(_)));
        assert!(err.to_string().contains("A.mp4"));
    }
}
