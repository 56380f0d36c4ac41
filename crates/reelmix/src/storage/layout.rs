use std::path::{Path, PathBuf};

use crate::error::JobError;

/// On-disk layout of job outputs: one directory per job holding its
/// manifests, produced files and archive.
#[derive(Debug, Clone)]
pub struct JobLayout {
    output_directory: PathBuf,
}

impl JobLayout {
    pub fn new<P: AsRef<Path>>(output_directory: P) -> Self {
        Self {
            output_directory: output_directory.as_ref().to_path_buf(),
        }
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.output_directory.join(job_id)
    }

    pub fn manifest_path(&self, job_id: &str, index: usize) -> PathBuf {
        self.job_dir(job_id).join(format!("manifest_{}.txt", index))
    }

    pub fn file_path(&self, job_id: &str, file_name: &str) -> PathBuf {
        self.job_dir(job_id).join(file_name)
    }

    pub async fn ensure_job_dir(&self, job_id: &str) -> Result<PathBuf, JobError> {
        let path = self.job_dir(job_id);
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| JobError::CreateDirectory {
                path: path.clone(),
                source: e,
            })?;
        Ok(path)
    }
}
