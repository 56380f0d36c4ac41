pub mod naming;
pub mod request;
pub mod runner;

pub use request::{Combination, GenerateRequest, ValidatedRequest};
pub use runner::JobOrchestrator;
