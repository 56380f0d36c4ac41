pub mod model;
pub mod registry;

pub use model::{
    progress_percent, CombinationFailure, CombinationResult, FailureKind, Job, JobState,
    ProducedArtifact, ResultsSnapshot, StatusSnapshot,
};
pub use registry::JobRegistry;
