use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ArchiveError;
use crate::sanitize;

/// Suffix of the archive while it is being written.
const PARTIAL_SUFFIX: &str = ".partial";

/// Bundles produced outputs of a job into one zip file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveAssembler;

impl ArchiveAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Writes `outputs` into `<job_dir>/<archive_name>` on the blocking pool.
    pub async fn assemble(
        &self,
        job_dir: &Path,
        outputs: Vec<PathBuf>,
        archive_name: &str,
    ) -> Result<PathBuf, ArchiveError> {
        let archive_path = job_dir.join(archive_name);
        tokio::task::spawn_blocking(move || write_archive(&archive_path, &outputs))
            .await
            .map_err(|e| ArchiveError::Task(e.to_string()))?
    }
}

/// Writes the archive next to its final path and renames it into place, so
/// `archive_path` only ever holds a complete archive.
pub fn write_archive(archive_path: &Path, outputs: &[PathBuf]) -> Result<PathBuf, ArchiveError> {
    let mut partial_name = archive_path.as_os_str().to_os_string();
    partial_name.push(PARTIAL_SUFFIX);
    let partial_path = PathBuf::from(partial_name);

    let result = write_entries(&partial_path, outputs).and_then(|()| {
        std::fs::rename(&partial_path, archive_path).map_err(|e| ArchiveError::Finalize {
            path: archive_path.to_path_buf(),
            message: e.to_string(),
        })
    });

    if let Err(e) = result {
        let _ = std::fs::remove_file(&partial_path);
        return Err(e);
    }

    debug!(
        "Archived {} outputs into {}",
        outputs.len(),
        sanitize::redact_path(archive_path)
    );
    Ok(archive_path.to_path_buf())
}

fn write_entries(partial_path: &Path, outputs: &[PathBuf]) -> Result<(), ArchiveError> {
    let file = File::create(partial_path).map_err(|e| ArchiveError::Create {
        path: partial_path.to_path_buf(),
        source: e,
    })?;
    let mut zip = ZipWriter::new(BufWriter::new(file));

    for output in outputs {
        let name = sanitize::redact_path(output);
        let mut source = File::open(output).map_err(|e| ArchiveError::ReadArtifact {
            path: output.clone(),
            source: e,
        })?;
        let size = source
            .metadata()
            .map_err(|e| ArchiveError::ReadArtifact {
                path: output.clone(),
                source: e,
            })?
            .len();

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(size >= u64::from(u32::MAX));
        zip.start_file(name.as_str(), options)
            .map_err(|e| ArchiveError::AddEntry {
                name: name.clone(),
                source: e,
            })?;
        std::io::copy(&mut source, &mut zip).map_err(|e| ArchiveError::AddEntry {
            name: name.clone(),
            source: zip::result::ZipError::Io(e),
        })?;
    }

    let writer = zip.finish().map_err(|e| ArchiveError::Finalize {
        path: partial_path.to_path_buf(),
        message: e.to_string(),
    })?;
    let file = writer.into_inner().map_err(|e| ArchiveError::Finalize {
        path: partial_path.to_path_buf(),
        message: e.to_string(),
    })?;
    file.sync_all().map_err(|e| ArchiveError::Finalize {
        path: partial_path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn entry_names(path: &Path) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_assemble_outputs() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("demo_G1xC1xCTA1_20260101.mp4");
        let second = dir.path().join("demo_G3xC3xCTA3_20260101.mp4");
        std::fs::write(&first, b"first output").unwrap();
        std::fs::write(&second, b"second output").unwrap();

        let archive = ArchiveAssembler::new()
            .assemble(dir.path(), vec![first, second], "demo_all.zip")
            .await
            .unwrap();

        assert_eq!(archive, dir.path().join("demo_all.zip"));
        assert_eq!(
            entry_names(&archive),
            vec![
                "demo_G1xC1xCTA1_20260101.mp4".to_string(),
                "demo_G3xC3xCTA3_20260101.mp4".to_string(),
            ]
        );

        let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let mut content = String::new();
        zip.by_name("demo_G1xC1xCTA1_20260101.mp4")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "first output");
        assert!(!dir.path().join("demo_all.zip.partial").exists());
    }

    #[tokio::test]
    async fn test_assemble_empty_archive() {
        let dir = TempDir::new().unwrap();
        let archive = ArchiveAssembler::new()
            .assemble(dir.path(), Vec::new(), "demo_all.zip")
            .await
            .unwrap();

        assert!(archive.exists());
        assert!(entry_names(&archive).is_empty());
    }

    #[tokio::test]
    async fn test_missing_artifact_leaves_no_archive() {
        let dir = TempDir::new().unwrap();
        let err = ArchiveAssembler::new()
            .assemble(
                dir.path(),
                vec![dir.path().join("vanished.mp4")],
                "demo_all.zip",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ArchiveError::ReadArtifact { .. }));
        assert!(!dir.path().join("demo_all.zip").exists());
        assert!(!dir.path().join("demo_all.zip.partial").exists());
    }

    #[test]
    fn test_unwritable_directory() {
        let dir = TempDir::new().unwrap();
        let result = write_archive(&dir.path().join("missing").join("demo_all.zip"), &[]);
        assert!(matches!(result, Err(ArchiveError::Create { .. })));
    }
}
