pub mod ffmpeg;
pub mod locate;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExecutionError;

pub use ffmpeg::{FfmpegExecutor, ManifestFile};
pub use locate::{find_in_path, locate_tool};

/// What a successful concatenation left behind.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub output: PathBuf,
    pub byte_size: Option<u64>,
    pub elapsed: Duration,
}

/// Joins three media files, in order, into one output without re-encoding.
#[async_trait]
pub trait ConcatExecutor: Send + Sync {
    /// `manifest` is a scratch path unique to this invocation; it must not
    /// exist after `execute` returns.
    async fn execute(
        &self,
        inputs: &[PathBuf; 3],
        output: &Path,
        manifest: &Path,
    ) -> Result<ExecutionReport, ExecutionError>;

    /// Binary backing this executor, if any.
    fn tool(&self) -> Option<&Path> {
        None
    }
}
