//! Test harness for isolated test execution.
//!
//! The `TestHarness` struct provides an isolated environment for running
//! concatenation jobs end to end:
//! - Temporary upload and output directories
//! - A fake media tool script standing in for ffmpeg
//! - A `ReelmixService` configured to use both

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs::File;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;

use reelmix::config::{Config, FfmpegConfig};
use reelmix::{GenerateRequest, Job, ReelmixService, UploadedAsset};

use super::tools;

/// Upper bound for any single job in tests.
const JOB_DEADLINE: Duration = Duration::from_secs(30);

pub struct TestHarness {
    temp_dir: TempDir,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub tool: PathBuf,
    pub service: ReelmixService,
}

impl TestHarness {
    /// Harness whose tool concatenates its inputs.
    pub fn new() -> Self {
        Self::with_tool(tools::CONCAT, 10)
    }

    /// Harness running `script` as the media tool with a timeout of
    /// `timeout_secs`.
    pub fn with_tool(script: &str, timeout_secs: u64) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let upload_dir = base.join("uploads");
        let output_dir = base.join("outputs");
        let bin_dir = base.join("bin");
        std::fs::create_dir_all(&bin_dir).expect("Failed to create bin directory");

        let tool = bin_dir.join("ffmpeg");
        std::fs::write(&tool, script).expect("Failed to write tool");
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to make tool executable");

        let config = Config {
            upload_directory: upload_dir.to_string_lossy().to_string(),
            output_directory: output_dir.to_string_lossy().to_string(),
            ffmpeg: FfmpegConfig {
                path: Some(tool.to_string_lossy().to_string()),
                bundled_path: None,
                timeout_secs,
            },
            ..Config::default()
        };
        let service = ReelmixService::from_config(config).expect("Tool should be located");

        Self {
            temp_dir,
            upload_dir,
            output_dir,
            tool,
            service,
        }
    }

    pub fn base(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Stores one file per name (its content is the name itself) and
    /// registers them under `job_id`.
    pub async fn upload(&self, job_id: &str, names: &[&str]) -> String {
        let mut uploads = Vec::new();
        for name in names {
            uploads.push(self.store(job_id, name).await);
        }
        self.service
            .upload(Some(job_id), &uploads, HashMap::new())
            .expect("Upload should be accepted")
    }

    pub async fn store(&self, job_id: &str, name: &str) -> UploadedAsset {
        self.service
            .store_upload(job_id, name, name.as_bytes())
            .await
            .expect("Upload should be stored")
    }

    /// Submits `request` and waits for the job to finish.
    pub async fn run(&self, request: GenerateRequest) -> Job {
        let job_id = self
            .service
            .generate(request)
            .await
            .expect("Request should be accepted");
        self.wait(&job_id).await
    }

    pub async fn wait(&self, job_id: &str) -> Job {
        tokio::time::timeout(JOB_DEADLINE, self.service.wait_for(job_id))
            .await
            .expect("Job did not finish in time")
            .expect("Job should exist")
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.output_dir.join(job_id)
    }

    /// File names in the job directory, sorted.
    pub fn job_files(&self, job_id: &str) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.job_dir(job_id))
            .expect("Job directory should exist")
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

/// Entry names of a zip archive, in archive order.
pub fn archive_entries(path: &Path) -> Vec<String> {
    let file = File::open(path).expect("Archive should exist");
    let mut archive = zip::ZipArchive::new(file).expect("Archive should be readable");
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

/// Today's UTC date as embedded in output names.
pub fn today() -> String {
    chrono::Utc::now().date_naive().format("%Y%m%d").to_string()
}
