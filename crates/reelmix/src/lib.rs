pub mod assets;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod executor;
pub mod job;
pub mod pipeline;
pub mod sanitize;
pub mod service;
pub mod storage;
pub mod telemetry;

pub use assets::{Asset, AssetRegistry, UploadedAsset};
pub use broadcast::{JobProgressBroadcaster, JobProgressEvent};
pub use config::{load_config, load_config_from_str, Config, OutputFormat};
pub use error::{
    ArchiveError, AssetError, ConfigError, ExecutionError, JobError, ReelmixError, Result,
};
pub use executor::{locate_tool, ConcatExecutor, ExecutionReport, FfmpegExecutor};
pub use job::{
    CombinationFailure, CombinationResult, FailureKind, Job, JobRegistry, JobState,
    ProducedArtifact, ResultsSnapshot, StatusSnapshot,
};
pub use pipeline::{Combination, GenerateRequest, JobOrchestrator};
pub use service::{Health, OutputFile, ReelmixService};
pub use storage::{ArchiveAssembler, JobLayout};
