use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::assets::AssetRegistry;
use crate::config::OutputFormat;
use crate::error::JobError;
use crate::executor::ConcatExecutor;
use crate::job::{CombinationFailure, CombinationResult, FailureKind, JobRegistry, ProducedArtifact};
use crate::sanitize;
use crate::storage::{ArchiveAssembler, JobLayout};

use super::naming;
use super::request::{Combination, GenerateRequest, ValidatedRequest};

/// Accepts generate requests and drives each job to a terminal state on
/// its own task.
#[derive(Clone)]
pub struct JobOrchestrator {
    registry: Arc<JobRegistry>,
    assets: Arc<AssetRegistry>,
    executor: Arc<dyn ConcatExecutor>,
    assembler: ArchiveAssembler,
    layout: JobLayout,
    default_format: OutputFormat,
}

impl JobOrchestrator {
    pub fn new(
        registry: Arc<JobRegistry>,
        assets: Arc<AssetRegistry>,
        executor: Arc<dyn ConcatExecutor>,
        layout: JobLayout,
        default_format: OutputFormat,
    ) -> Self {
        Self {
            registry,
            assets,
            executor,
            assembler: ArchiveAssembler::new(),
            layout,
            default_format,
        }
    }

    pub fn layout(&self) -> &JobLayout {
        &self.layout
    }

    /// Validates the request, moves the job to `processing` and returns its
    /// id. The combinations run in the background.
    pub async fn submit(&self, request: GenerateRequest) -> Result<String, JobError> {
        let request = request.validate(self.default_format)?;
        let job_id = request
            .job_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let job_dir = self.layout.ensure_job_dir(&job_id).await?;
        self.registry
            .start(Some(&job_id), &request.project, request.combinations.len())?;

        self.spawn(job_id.clone(), job_dir, request);
        Ok(job_id)
    }

    /// Runs the job on one task and supervises it from another, so a panic
    /// still ends the job in `failed`.
    fn spawn(&self, job_id: String, job_dir: PathBuf, request: ValidatedRequest) {
        let runner = self.clone();
        let task_job_id = job_id.clone();
        let task = tokio::spawn(async move {
            runner.run_job(&task_job_id, &job_dir, request).await
        });

        let registry = Arc::clone(&self.registry);
        tokio::spawn(supervise(registry, job_id, task));
    }

    /// Returns an error only when the registry refused a transition; the
    /// supervisor then fails the job.
    async fn run_job(
        &self,
        job_id: &str,
        job_dir: &Path,
        request: ValidatedRequest,
    ) -> Result<(), JobError> {
        let span = info_span!("job", job_id = %job_id, project = %request.project);
        async {
            let date = Utc::now().date_naive();
            let mut outputs = Vec::new();

            for (index, combination) in request.combinations.iter().enumerate() {
                let result = self
                    .run_combination(job_id, index, combination, &request, date)
                    .instrument(info_span!("combination", index = index + 1))
                    .await;

                if let CombinationResult::Produced(artifact) = &result {
                    outputs.push(self.layout.file_path(job_id, &artifact.file_name));
                }
                self.registry.record_result(job_id, result)?;
            }

            let archive_name = naming::archive_name(&request.project);
            let produced = outputs.len();
            match self.assembler.assemble(job_dir, outputs, &archive_name).await {
                Ok(archive) => {
                    info!(
                        "Archived {} of {} outputs into {}",
                        produced,
                        request.combinations.len(),
                        sanitize::redact_path(&archive)
                    );
                    self.registry.complete(job_id, archive)?;
                }
                Err(e) => {
                    error!("Archive assembly failed: {}", e);
                    let reason = format!("Archive assembly failed: {}", e);
                    self.registry.fail(job_id, &reason)?;
                }
            }
            Ok::<(), JobError>(())
        }
        .instrument(span)
        .await
    }

    /// Resolve, name, execute. Never fails; errors become a failure record.
    async fn run_combination(
        &self,
        job_id: &str,
        index: usize,
        combination: &Combination,
        request: &ValidatedRequest,
        date: NaiveDate,
    ) -> CombinationResult {
        let failure = |kind: FailureKind, error: String| {
            CombinationResult::Failed(CombinationFailure {
                index,
                assets: combination.assets.clone(),
                kind,
                error,
            })
        };

        let mut inputs: [PathBuf; 3] = Default::default();
        for (slot, name) in inputs.iter_mut().zip(&combination.assets) {
            match self.assets.resolve(job_id, name) {
                Ok(path) => *slot = path,
                Err(e) => {
                    warn!("{}", e);
                    return failure(FailureKind::AssetResolution, e.to_string());
                }
            }
        }

        let file_name = naming::output_name(&request.project, index, date, request.format);
        let output = self.layout.file_path(job_id, &file_name);
        let manifest = self.layout.manifest_path(job_id, index);

        match self.executor.execute(&inputs, &output, &manifest).await {
            Ok(report) => {
                debug!(
                    "Produced {} in {}ms",
                    file_name,
                    report.elapsed.as_millis()
                );
                CombinationResult::Produced(ProducedArtifact {
                    index,
                    download_ref: naming::download_ref(job_id, &file_name),
                    file_name,
                    composition: combination.assets.clone(),
                    byte_size: report.byte_size,
                    duration_secs: None,
                })
            }
            Err(e) => {
                warn!("Combination failed: {}", e);
                if tokio::fs::remove_file(&output).await.is_ok() {
                    debug!("Removed partial output {}", file_name);
                }
                failure(FailureKind::Execution, e.to_string())
            }
        }
    }
}

async fn supervise(
    registry: Arc<JobRegistry>,
    job_id: String,
    task: JoinHandle<Result<(), JobError>>,
) {
    let reason = match task.await {
        Ok(Ok(())) => return,
        Ok(Err(e)) => format!("Job stopped on internal error: {}", e),
        Err(e) => abort_reason(e),
    };
    error!(job_id = %job_id, "Job task ended abnormally: {}", reason);
    if let Err(e) = registry.fail(&job_id, &reason) {
        warn!(job_id = %job_id, "Could not mark job failed: {}", e);
    }
}

fn abort_reason(err: JoinError) -> String {
    if err.is_panic() {
        format!("Job task panicked: {}", panic_message(err.into_panic()))
    } else {
        "Job task was cancelled".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
