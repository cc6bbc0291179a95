pub mod analysis;
pub mod audio;
pub mod cache;
pub mod diary;
pub mod integration;
pub mod llm;
pub mod server;

use analysis::TaskKind;
use thiserror::Error;

/// Message shown to the user when the provider is throttling requests.
pub const SYSTEM_BUSY_MESSAGE: &str = "System busy, please try again.";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TutorError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{}", SYSTEM_BUSY_MESSAGE)]
    RateLimited,

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Malformed {task} response: {reason}")]
    MalformedResponse { task: TaskKind, reason: String },

    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for TutorError {
    fn from(e: std::io::Error) -> Self {
        TutorError::IOError(e.to_string())
    }
}

impl TutorError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // The caller must fix the input first
            TutorError::InvalidRequest(_) => false,
            // Throttling and provider hiccups are transient
            TutorError::RateLimited => true,
            TutorError::Provider(_) => true,
            TutorError::MalformedResponse { .. } => true,
            // Hardware/device errors may require user intervention
            TutorError::AudioDeviceError(_) => false,
            TutorError::AudioProcessingError(_) => true,
            TutorError::ConfigError(_) => false,
            TutorError::IOError(_) => false,
        }
    }

    /// Malformed responses propagate like any other provider failure
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            TutorError::Provider(_) | TutorError::MalformedResponse { .. }
        )
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            TutorError::InvalidRequest(_) => {
                "Please provide the problem as text or a photo.".to_string()
            }
            TutorError::RateLimited => SYSTEM_BUSY_MESSAGE.to_string(),
            TutorError::Provider(_) | TutorError::MalformedResponse { .. } => {
                "Unable to process this problem. Please try again.".to_string()
            }
            TutorError::AudioDeviceError(_) => {
                "Audio device error. Please check your speakers.".to_string()
            }
            TutorError::AudioProcessingError(_) => {
                "Audio playback failed. The summary is still shown as text.".to_string()
            }
            TutorError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            TutorError::IOError(_) => "File system error occurred.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TutorError>;
