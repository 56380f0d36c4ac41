//! Typed entry points for whatever transport sits in front of the core.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use crate::assets::{AssetRegistry, UploadedAsset};
use crate::broadcast::JobProgressBroadcaster;
use crate::config::loader::validate_config;
use crate::config::Config;
use crate::error::{JobError, Result as ReelmixResult};
use crate::executor::{locate_tool, ConcatExecutor, FfmpegExecutor};
use crate::job::{Job, JobRegistry, ResultsSnapshot, StatusSnapshot};
use crate::pipeline::request::is_valid_job_id;
use crate::pipeline::{GenerateRequest, JobOrchestrator};
use crate::sanitize;
use crate::storage::JobLayout;

/// An opened job output, ready to be streamed.
#[derive(Debug)]
pub struct OutputFile {
    pub path: PathBuf,
    pub size: u64,
    pub content_type: String,
    pub file: tokio::fs::File,
}

#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<PathBuf>,
}

pub struct ReelmixService {
    config: Arc<Config>,
    registry: Arc<JobRegistry>,
    assets: Arc<AssetRegistry>,
    executor: Arc<dyn ConcatExecutor>,
    orchestrator: JobOrchestrator,
}

impl ReelmixService {
    pub fn new(config: Config, executor: Arc<dyn ConcatExecutor>) -> Self {
        let progress = JobProgressBroadcaster::new(config.progress_channel_capacity);
        let registry = Arc::new(JobRegistry::new(progress));
        let assets = Arc::new(AssetRegistry::new());
        let orchestrator = JobOrchestrator::new(
            Arc::clone(&registry),
            Arc::clone(&assets),
            Arc::clone(&executor),
            JobLayout::new(&config.output_directory),
            config.default_format,
        );

        Self {
            config: Arc::new(config),
            registry,
            assets,
            executor,
            orchestrator,
        }
    }

    /// Checks the configuration, locates ffmpeg and builds the service
    /// around it.
    pub fn from_config(config: Config) -> ReelmixResult<Self> {
        validate_config(&config)?;
        let tool = locate_tool(
            config.ffmpeg.path.as_deref().map(Path::new),
            config.ffmpeg.bundled_path.as_deref().map(Path::new),
        )?;
        let executor = FfmpegExecutor::new(tool, Duration::from_secs(config.ffmpeg.timeout_secs));
        Ok(Self::new(config, Arc::new(executor)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn assets(&self) -> &Arc<AssetRegistry> {
        &self.assets
    }

    /// Writes one uploaded file to `<upload_directory>/<job_id>/<file_name>`.
    /// The result still has to be passed to [`ReelmixService::upload`].
    pub async fn store_upload(
        &self,
        job_id: &str,
        file_name: &str,
        contents: &[u8],
    ) -> Result<UploadedAsset, JobError> {
        if !is_valid_job_id(job_id) {
            return Err(JobError::validation(format!("invalid jobId '{}'", job_id)));
        }
        if !sanitize::is_plain_file_name(file_name) {
            return Err(JobError::validation(format!(
                "invalid upload name '{}'",
                file_name
            )));
        }

        let dir = Path::new(&self.config.upload_directory).join(job_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| JobError::CreateDirectory {
                path: dir.clone(),
                source: e,
            })?;

        let path = dir.join(file_name);
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| JobError::StoreUpload {
                path: path.clone(),
                source: e,
            })?;
        Ok(UploadedAsset::new(file_name, path))
    }

    /// Upload intake: registers stored files under a job, creating the job
    /// in `accepted` state when needed. Returns the job id.
    pub fn upload(
        &self,
        job_id: Option<&str>,
        uploads: &[UploadedAsset],
        labels: HashMap<String, String>,
    ) -> Result<String, JobError> {
        if let Some(id) = job_id {
            if !is_valid_job_id(id) {
                return Err(JobError::validation(format!("invalid jobId '{}'", id)));
            }
        }
        let job_id = self.registry.accept(job_id, labels.clone());
        self.assets.register_all(&job_id, uploads, &labels);
        Ok(job_id)
    }

    pub async fn generate(&self, request: GenerateRequest) -> Result<String, JobError> {
        self.orchestrator.submit(request).await
    }

    pub fn status(&self, job_id: &str) -> Result<StatusSnapshot, JobError> {
        self.registry.status(job_id)
    }

    pub fn results(&self, job_id: &str) -> Result<ResultsSnapshot, JobError> {
        self.registry.results(job_id)
    }

    /// Opens a produced output or the archive of a job. Anything else,
    /// including names that are not a single path component, is not found.
    pub async fn open_file(&self, job_id: &str, filename: &str) -> Result<OutputFile, JobError> {
        let job = self
            .registry
            .get(job_id)
            .ok_or_else(|| JobError::not_found(job_id))?;

        let file_not_found = || JobError::FileNotFound {
            job_id: job_id.to_string(),
            filename: filename.to_string(),
        };

        if !sanitize::is_plain_file_name(filename) {
            return Err(file_not_found());
        }
        let is_archive = job
            .archive_location
            .as_deref()
            .and_then(Path::file_name)
            .is_some_and(|name| name == filename);
        let is_output = job.produced().any(|a| a.file_name == filename);
        if !is_archive && !is_output {
            return Err(file_not_found());
        }

        let path = self.orchestrator.layout().file_path(job_id, filename);
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(file_not_found()),
            Err(e) => return Err(JobError::OpenFile { path, source: e }),
        };
        let size = file
            .metadata()
            .await
            .map_err(|e| JobError::OpenFile {
                path: path.clone(),
                source: e,
            })?
            .len();
        let content_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(OutputFile {
            path,
            size,
            content_type,
            file,
        })
    }

    /// Resolves once the job is completed or failed.
    pub async fn wait_for(&self, job_id: &str) -> Result<Job, JobError> {
        // Subscribe before reading so no transition slips between the two.
        let mut events = self.registry.progress().subscribe();
        loop {
            let job = self
                .registry
                .get(job_id)
                .ok_or_else(|| JobError::not_found(job_id))?;
            if job.is_finished() {
                return Ok(job);
            }

            loop {
                match events.recv().await {
                    Ok(event) if event.job_id == job_id => break,
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        log::debug!("Progress receiver lagged by {} events", skipped);
                        break;
                    }
                    Err(RecvError::Closed) => return Ok(job),
                }
            }
        }
    }

    pub fn health(&self) -> Health {
        Health {
            status: "ok",
            tool: self.executor.tool().map(Path::to_path_buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, ExecutionError, ReelmixError};
    use crate::executor::ExecutionReport;
    use crate::job::JobState;
    use crate::pipeline::Combination;
    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    struct StubExecutor;

    #[async_trait]
    impl ConcatExecutor for StubExecutor {
        async fn execute(
            &self,
            _inputs: &[PathBuf; 3],
            output: &Path,
            _manifest: &Path,
        ) -> Result<ExecutionReport, ExecutionError> {
            tokio::fs::write(output, b"joined").await.unwrap();
            Ok(ExecutionReport {
                output: output.to_path_buf(),
                byte_size: Some(6),
                elapsed: Duration::ZERO,
            })
        }
    }

    fn service(dir: &TempDir) -> ReelmixService {
        let config = Config {
            upload_directory: dir.path().join("uploads").to_string_lossy().to_string(),
            output_directory: dir.path().join("outputs").to_string_lossy().to_string(),
            ..Config::default()
        };
        ReelmixService::new(config, Arc::new(StubExecutor))
    }

    async fn upload_abc(service: &ReelmixService) -> String {
        let mut uploads = Vec::new();
        for name in ["A.mp4", "B.mp4", "C.mp4"] {
            uploads.push(service.store_upload("job-1", name, b"x").await.unwrap());
        }
        service
            .upload(Some("job-1"), &uploads, HashMap::new())
            .unwrap()
    }

    #[tokio::test]
    async fn test_upload_creates_accepted_job() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let job_id = upload_abc(&service).await;

        let status = service.status(&job_id).unwrap();
        assert_eq!(status.status, JobState::Accepted);
        assert_eq!(status.total, 0);
        assert_eq!(service.assets().assets(&job_id).len(), 3);
        assert!(dir.path().join("uploads/job-1/A.mp4").is_file());
    }

    #[tokio::test]
    async fn test_store_upload_rejects_paths() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let err = service
            .store_upload("job-1", "../A.mp4", b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Validation { .. }));
        assert!(service.upload(Some("a/b"), &[], HashMap::new()).is_err());
    }

    #[tokio::test]
    async fn test_generate_and_download() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let job_id = upload_abc(&service).await;

        let request = GenerateRequest::new("demo", vec![Combination::new("A.mp4", "B.mp4", "C.mp4")])
            .with_job_id(&job_id);
        service.generate(request).await.unwrap();
        let job = service.wait_for(&job_id).await.unwrap();
        assert_eq!(job.state, JobState::Completed);

        let name = job.results[0].artifact().unwrap().file_name.clone();
        let mut output = service.open_file(&job_id, &name).await.unwrap();
        assert_eq!(output.size, 6);
        assert_eq!(output.content_type, "video/mp4");
        let mut body = Vec::new();
        output.file.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"joined");

        let archive = service.open_file(&job_id, "demo_all.zip").await.unwrap();
        assert_eq!(archive.content_type, "application/zip");
    }

    #[tokio::test]
    async fn test_open_file_rejects_unknown_names() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let job_id = upload_abc(&service).await;
        let request = GenerateRequest::new("demo", vec![Combination::new("A.mp4", "B.mp4", "C.mp4")])
            .with_job_id(&job_id);
        service.generate(request).await.unwrap();
        service.wait_for(&job_id).await.unwrap();

        // Exists on disk, but is not an output of this job.
        std::fs::write(dir.path().join("outputs/job-1/notes.txt"), b"x").unwrap();

        for name in ["notes.txt", "../job-1/demo_all.zip", "..", "", "/etc/passwd"] {
            let err = service.open_file(&job_id, name).await.unwrap_err();
            assert!(
                matches!(err, JobError::FileNotFound { .. }),
                "{:?} gave {:?}",
                name,
                err
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_job_creates_no_state() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        assert!(service.status("ghost").unwrap_err().is_not_found());
        assert!(service.results("ghost").unwrap_err().is_not_found());
        assert!(service
            .open_file("ghost", "demo_all.zip")
            .await
            .unwrap_err()
            .is_not_found());
        assert!(service.wait_for("ghost").await.is_err());
        assert!(!service.registry().contains("ghost"));
    }

    #[test]
    fn test_health() {
        let dir = TempDir::new().unwrap();
        let health = service(&dir).health();
        assert_eq!(health.status, "ok");
        assert!(health.tool.is_none());
    }

    #[test]
    fn test_from_config_reports_startup_errors() {
        let dir = TempDir::new().unwrap();
        let shared = dir.path().to_string_lossy().to_string();
        let config = Config {
            upload_directory: shared.clone(),
            output_directory: shared,
            ..Config::default()
        };
        let err = ReelmixService::from_config(config).err().unwrap();
        assert!(matches!(err, ReelmixError::Config(ConfigError::Validation { .. })));

        let config = Config {
            upload_directory: dir.path().join("uploads").to_string_lossy().to_string(),
            output_directory: dir.path().join("outputs").to_string_lossy().to_string(),
            ..Config::default()
        };
        match ReelmixService::from_config(config) {
            Ok(service) => assert!(service.health().tool.is_some()),
            Err(err) => assert!(matches!(
                err,
                ReelmixError::Execution(ExecutionError::ToolNotFound { .. })
            )),
        }
    }
}
