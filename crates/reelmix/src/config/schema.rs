use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_upload_directory")]
    pub upload_directory: String,
    #[serde(default = "default_output_directory")]
    pub output_directory: String,
    #[serde(default)]
    pub ffmpeg: FfmpegConfig,
    #[serde(default)]
    pub default_format: OutputFormat,
    #[serde(default = "default_channel_capacity")]
    pub progress_channel_capacity: usize,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn scratch_root() -> PathBuf {
    std::env::temp_dir().join("reelmix")
}

fn default_upload_directory() -> String {
    scratch_root().join("uploads").to_string_lossy().to_string()
}

fn default_output_directory() -> String {
    scratch_root().join("outputs").to_string_lossy().to_string()
}

fn default_channel_capacity() -> usize {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            upload_directory: default_upload_directory(),
            output_directory: default_output_directory(),
            ffmpeg: FfmpegConfig::default(),
            default_format: OutputFormat::default(),
            progress_channel_capacity: default_channel_capacity(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Location and limits of the external concatenation tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FfmpegConfig {
    /// Explicit binary path. Probed first when set.
    #[serde(default)]
    pub path: Option<String>,
    /// Binary shipped alongside the application, used when neither the
    /// explicit path nor `PATH` yields one.
    #[serde(default = "default_bundled_path")]
    pub bundled_path: Option<String>,
    /// Upper bound for a single invocation.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_bundled_path() -> Option<String> {
    dirs::data_local_dir().map(|p| {
        p.join("reelmix")
            .join("bin")
            .join(if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" })
            .to_string_lossy()
            .to_string()
    })
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            path: None,
            bundled_path: default_bundled_path(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Container of produced outputs. Concatenation copies streams, so the
/// container only decides the file extension ffmpeg muxes into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Mp4,
    Mov,
    Mkv,
    Webm,
    M4a,
    Mp3,
}

impl OutputFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "mp4" => Some(Self::Mp4),
            "mov" => Some(Self::Mov),
            "mkv" => Some(Self::Mkv),
            "webm" => Some(Self::Webm),
            "m4a" => Some(Self::M4a),
            "mp3" => Some(Self::Mp3),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
            Self::Mkv => "mkv",
            Self::Webm => "webm",
            Self::M4a => "m4a",
            Self::Mp3 => "mp3",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension_variants() {
        assert_eq!(OutputFormat::from_extension("mp4"), Some(OutputFormat::Mp4));
        assert_eq!(OutputFormat::from_extension("MKV"), Some(OutputFormat::Mkv));
        assert_eq!(OutputFormat::from_extension(".mov"), Some(OutputFormat::Mov));
        assert_eq!(OutputFormat::from_extension("avi"), None);
    }

    #[test]
    fn test_extension_roundtrip() {
        for format in [
            OutputFormat::Mp4,
            OutputFormat::Mov,
            OutputFormat::Mkv,
            OutputFormat::Webm,
            OutputFormat::M4a,
            OutputFormat::Mp3,
        ] {
            assert_eq!(OutputFormat::from_extension(format.extension()), Some(format));
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.default_format, OutputFormat::Mp4);
        assert_eq!(config.ffmpeg.timeout_secs, 300);
        assert!(config.ffmpeg.path.is_none());
        assert!(config.upload_directory.ends_with("uploads"));
        assert!(config.output_directory.ends_with("outputs"));
    }

    #[test]
    fn test_format_deserializes_lowercase() {
        let format: OutputFormat = serde_json::from_str("\"webm\"").unwrap();
        assert_eq!(format, OutputFormat::Webm);
        assert!(serde_json::from_str::<OutputFormat>("\"avi\"").is_err());
    }
}
