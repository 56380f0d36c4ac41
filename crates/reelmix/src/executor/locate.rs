//! Startup-time discovery of the media tool binary.

use std::env;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::ExecutionError;

const TOOL_NAME: &str = "ffmpeg";

/// Resolves the ffmpeg binary: the explicit path, then `PATH`, then the
/// bundled fallback.
pub fn locate_tool(
    explicit: Option<&Path>,
    bundled: Option<&Path>,
) -> Result<PathBuf, ExecutionError> {
    let mut searched = Vec::new();

    if let Some(path) = explicit {
        if path.is_file() {
            info!("Using configured media tool at {}", path.display());
            return Ok(path.to_path_buf());
        }
        warn!("Configured media tool {} does not exist", path.display());
        searched.push(path.to_path_buf());
    }

    if let Some(path) = find_in_path(TOOL_NAME) {
        info!("Using system media tool at {}", path.display());
        return Ok(path);
    }
    searched.push(PathBuf::from(TOOL_NAME));

    if let Some(path) = bundled {
        if path.is_file() {
            info!("Using bundled media tool at {}", path.display());
            return Ok(path.to_path_buf());
        }
        searched.push(path.to_path_buf());
    }

    Err(ExecutionError::ToolNotFound { searched })
}

/// Looks `tool` up in the directories of `PATH`.
pub fn find_in_path(tool: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    for dir in env::split_paths(&path_var) {
        let full = dir.join(tool);
        if full.is_file() {
            return Some(full);
        }
        #[cfg(windows)]
        {
            let exe = dir.join(format!("{tool}.exe"));
            if exe.is_file() {
                return Some(exe);
            }
        }
    }
    None
}
