//! Vendor-neutral boundary to the generative-AI provider

use crate::analysis::ResponseFormat;
use async_trait::async_trait;
use std::fmt;

/// One ordered part of a request or response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    /// Binary data embedded as base64, tagged with its MIME type
    InlineData { mime_type: String, data: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text(text.into())
    }

    pub fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        ContentPart::InlineData {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

/// Speech synthesis options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechOptions {
    pub voice: String,
}

/// Generation options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    /// Forced response format; `None` leaves it to the provider
    pub response_format: Option<ResponseFormat>,
    /// Request audio output instead of text
    pub speech: Option<SpeechOptions>,
}

impl GenerationOptions {
    pub fn text(temperature: f32, format: ResponseFormat) -> Self {
        Self {
            temperature: Some(temperature),
            response_format: Some(format),
            speech: None,
        }
    }

    pub fn speech(voice: impl Into<String>) -> Self {
        Self {
            temperature: None,
            response_format: None,
            speech: Some(SpeechOptions {
                voice: voice.into(),
            }),
        }
    }
}

/// A single generate call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub parts: Vec<ContentPart>,
    pub options: GenerationOptions,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, parts: Vec<ContentPart>) -> Self {
        Self {
            model: model.into(),
            parts,
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Concatenated text parts of the request
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text(text) => Some(text.as_str()),
                ContentPart::InlineData { .. } => None,
            })
            .collect()
    }
}

/// Provider reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateResponse {
    pub parts: Vec<ContentPart>,
}

impl GenerateResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![ContentPart::Text(text.into())],
        }
    }

    /// Concatenated text parts, empty when there are none
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text(text) => Some(text.as_str()),
                ContentPart::InlineData { .. } => None,
            })
            .collect()
    }

    /// First inline binary part as (mime type, base64 data)
    pub fn first_inline_data(&self) -> Option<(&str, &str)> {
        self.parts.iter().find_map(|part| match part {
            ContentPart::InlineData { mime_type, data } => {
                Some((mime_type.as_str(), data.as_str()))
            }
            ContentPart::Text(_) => None,
        })
    }
}

/// Raw transport or provider failure, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    /// HTTP status when the provider answered
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Failure without an HTTP status (connection, decoding...)
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    /// Whether the provider signalled throttling
    pub fn is_rate_limited(&self) -> bool {
        self.status == Some(429)
            || self.message.contains("429")
            || self.message.contains("RESOURCE_EXHAUSTED")
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ProviderFailure {}

/// A generative-AI backend
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn generate(
        &self,
        request: GenerateRequest,
    ) -> std::result::Result<GenerateResponse, ProviderFailure>;
}
