use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::ExecutionError;
use crate::sanitize;

use super::{ConcatExecutor, ExecutionReport};

/// Number of trailing stderr lines kept as failure diagnostic.
const DIAGNOSTIC_LINES: usize = 20;

/// Concat-demuxer manifest on disk, removed when dropped.
pub struct ManifestFile {
    path: PathBuf,
}

impl ManifestFile {
    /// Writes one `file '<path>'` line per input.
    pub async fn write(path: &Path, inputs: &[PathBuf]) -> Result<Self, ExecutionError> {
        let body = render_manifest(inputs);
        tokio::fs::write(path, body)
            .await
            .map_err(|e| ExecutionError::Manifest {
                path: path.to_path_buf(),
                source: e,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ManifestFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "Failed to remove manifest {}: {}",
                    sanitize::redact_path(&self.path),
                    e
                );
            }
        }
    }
}

/// Renders the concat-demuxer manifest. Single quotes inside a path are
/// closed, escaped and reopened (`'\''`).
pub fn render_manifest(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|p| {
            let escaped = p.to_string_lossy().replace('\'', r"'\''");
            format!("file '{}'\n", escaped)
        })
        .collect()
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(DIAGNOSTIC_LINES);
    lines[start..].join("\n")
}

/// Runs ffmpeg's concat demuxer in stream-copy mode.
pub struct FfmpegExecutor {
    program: PathBuf,
    timeout: Duration,
}

impl FfmpegExecutor {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Argument vector for one invocation. Paths are passed as separate
    /// arguments, never through a shell.
    pub fn arguments(manifest: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-hide_banner",
            "-nostdin",
            "-y",
            "-f",
            "concat",
            "-safe",
            "0",
            "-i",
        ]
        .iter()
        .map(|a| OsString::from(*a))
        .collect();
        args.push(manifest.as_os_str().to_os_string());
        args.extend(["-c", "copy"].iter().map(|a| OsString::from(*a)));
        args.push(output.as_os_str().to_os_string());
        args
    }

    async fn absolute_inputs(inputs: &[PathBuf; 3]) -> Result<Vec<PathBuf>, ExecutionError> {
        let mut resolved = Vec::with_capacity(inputs.len());
        for input in inputs {
            let absolute = tokio::fs::canonicalize(input).await.map_err(|_| {
                ExecutionError::MissingInput {
                    path: input.clone(),
                }
            })?;
            if !absolute.is_file() {
                return Err(ExecutionError::MissingInput {
                    path: input.clone(),
                });
            }
            resolved.push(absolute);
        }
        Ok(resolved)
    }
}

#[async_trait]
impl ConcatExecutor for FfmpegExecutor {
    async fn execute(
        &self,
        inputs: &[PathBuf; 3],
        output: &Path,
        manifest: &Path,
    ) -> Result<ExecutionReport, ExecutionError> {
        let started = Instant::now();
        let inputs = Self::absolute_inputs(inputs).await?;
        let manifest = ManifestFile::write(manifest, &inputs).await?;

        debug!(
            "Running {} for {}",
            sanitize::redact_path(&self.program),
            sanitize::redact_path(output)
        );

        let child = Command::new(&self.program)
            .args(Self::arguments(manifest.path(), output))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecutionError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let result = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(ExecutionError::Wait)?,
            Err(_) => {
                warn!(
                    "Media tool exceeded {:?} for {}",
                    self.timeout,
                    sanitize::redact_path(output)
                );
                return Err(ExecutionError::Timeout {
                    timeout: self.timeout,
                });
            }
        };

        if !result.status.success() {
            return Err(ExecutionError::NonZeroExit {
                code: result.status.code(),
                diagnostic: stderr_tail(&result.stderr),
            });
        }

        let byte_size = tokio::fs::metadata(output).await.ok().map(|m| m.len());
        drop(manifest);

        Ok(ExecutionReport {
            output: output.to_path_buf(),
            byte_size,
            elapsed: started.elapsed(),
        })
    }

    fn tool(&self) -> Option<&Path> {
        Some(&self.program)
    }
}
