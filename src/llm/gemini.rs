//! `generateContent` REST client
//!
//! Maps [`GenerateRequest`] onto the provider's camelCase JSON body and the
//! reply's candidate parts back onto [`ContentPart`]s. Status handling
//! follows the usual pattern: 429 and other non-success codes become a
//! [`ProviderFailure`] carrying the status and response body.

use crate::llm::config::ProviderConfig;
use crate::llm::provider::{
    ContentPart, GenerateRequest, GenerateResponse, ModelProvider, ProviderFailure,
};
use crate::{Result, TutorError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<WireGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<WireBlob>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBlob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<WireSpeechConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireSpeechConfig {
    voice_config: WireVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireVoiceConfig {
    prebuilt_voice_config: WirePrebuiltVoice,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WirePrebuiltVoice {
    voice_name: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    #[serde(default)]
    content: Option<WireContent>,
}

fn to_wire(request: &GenerateRequest) -> WireRequest {
    let parts = request
        .parts
        .iter()
        .map(|part| match part {
            ContentPart::Text(text) => WirePart {
                text: Some(text.clone()),
                inline_data: None,
            },
            ContentPart::InlineData { mime_type, data } => WirePart {
                text: None,
                inline_data: Some(WireBlob {
                    mime_type: mime_type.clone(),
                    data: data.clone(),
                }),
            },
        })
        .collect();

    let options = &request.options;
    let mut config = WireGenerationConfig {
        temperature: options.temperature,
        response_mime_type: options
            .response_format
            .map(|format| format.mime_type().to_string()),
        ..Default::default()
    };

    if let Some(speech) = &options.speech {
        config.response_modalities = Some(vec!["AUDIO".to_string()]);
        config.speech_config = Some(WireSpeechConfig {
            voice_config: WireVoiceConfig {
                prebuilt_voice_config: WirePrebuiltVoice {
                    voice_name: speech.voice.clone(),
                },
            },
        });
    }

    let has_config = config.temperature.is_some()
        || config.response_mime_type.is_some()
        || config.response_modalities.is_some();

    WireRequest {
        contents: vec![WireContent { role: None, parts }],
        generation_config: has_config.then_some(config),
    }
}

/// Only the first candidate is used
fn from_wire(response: WireResponse) -> GenerateResponse {
    let parts = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| match (part.text, part.inline_data) {
            (_, Some(blob)) => Some(ContentPart::InlineData {
                mime_type: blob.mime_type,
                data: blob.data,
            }),
            (Some(text), None) => Some(ContentPart::Text(text)),
            (None, None) => None,
        })
        .collect();

    GenerateResponse { parts }
}

/// Provider speaking the `generateContent` REST API
pub struct GeminiProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        if !config.has_api_key() {
            return Err(TutorError::ConfigError("API key is required".into()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TutorError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl ModelProvider for GeminiProvider {
    async fn generate(
        &self,
        request: GenerateRequest,
    ) -> std::result::Result<GenerateResponse, ProviderFailure> {
        let url = self.endpoint(&request.model);
        debug!("POST {} ({} part(s))", url, request.parts.len());

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&to_wire(&request))
            .send()
            .await
            .map_err(|e| ProviderFailure::new(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderFailure::new(
                Some(status.as_u16()),
                resp.text().await.unwrap_or_default(),
            ));
        }

        let body: WireResponse = resp
            .json()
            .await
            .map_err(|e| ProviderFailure::transport(format!("Invalid response body: {}", e)))?;

        Ok(from_wire(body))
    }
}
