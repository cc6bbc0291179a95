pub mod config;
pub mod orchestrator;

pub use config::{FailurePolicy, PlaybackConfig, ServerConfig, TutorConfig};
pub use orchestrator::TaskOrchestrator;
