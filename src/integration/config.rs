//! Configuration for the integration layer
//!
//! Provides centralized configuration for all components.

use crate::audio::SPEECH_SAMPLE_RATE;
use crate::cache::CacheConfig;
use crate::llm::config::ProviderConfig;
use crate::llm::prompts::DEFAULT_RESPONSE_LANGUAGE;
use crate::{Result, TutorError};
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 5000;

/// What `solve` does when some task fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Any failed task swaps the whole result for the offline example.
    /// Throttling is still reported as an error.
    #[default]
    AllOrNothing,

    /// Any failed task is returned as the error
    Strict,
}

/// Playback settings
#[derive(Clone, Debug)]
pub struct PlaybackConfig {
    /// Whether to open an output device at all
    pub enabled: bool,

    /// Sample rate of synthesized speech
    pub sample_rate: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: SPEECH_SAMPLE_RATE,
        }
    }
}

/// HTTP service settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| TutorError::ConfigError(format!("Invalid listen address: {}", e)))
    }
}

/// Configuration for the complete tutor
#[derive(Clone, Debug, Default)]
pub struct TutorConfig {
    /// AI provider configuration
    pub provider: ProviderConfig,

    /// Response cache bounds
    pub cache: CacheConfig,

    /// Speech playback
    pub playback: PlaybackConfig,

    /// Partial failure handling for `solve`
    pub failure_policy: FailurePolicy,

    /// Language answers are written in, `DEFAULT_RESPONSE_LANGUAGE` when unset
    pub response_language: Option<String>,

    /// HTTP service
    pub server: ServerConfig,
}

impl TutorConfig {
    /// Create a configuration for the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            provider: ProviderConfig::new(api_key),
            ..Default::default()
        }
    }

    /// Read settings from the environment, loading `.env` first when present
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = var("GEMINI_API_KEY").or_else(|| var("API_KEY")).unwrap_or_default();
        let mut config = Self::new(api_key);

        if let Some(model) = var("STUDY_BUDDY_TEXT_MODEL") {
            config.provider = config.provider.with_text_model(model);
        }
        if let Some(model) = var("STUDY_BUDDY_TTS_MODEL") {
            config.provider = config.provider.with_tts_model(model);
        }
        if let Some(voice) = var("STUDY_BUDDY_VOICE") {
            config.provider = config.provider.with_voice(voice);
        }
        if let Some(port) = var("PORT") {
            config.server.port = parse_var("PORT", &port)?;
        }
        if let Some(max) = var("STUDY_BUDDY_CACHE_MAX_ENTRIES") {
            config.cache.max_entries = Some(parse_var("STUDY_BUDDY_CACHE_MAX_ENTRIES", &max)?);
        }
        if let Some(ttl) = var("STUDY_BUDDY_CACHE_TTL_SECS") {
            let secs: u64 = parse_var("STUDY_BUDDY_CACHE_TTL_SECS", &ttl)?;
            config.cache.ttl = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Set the provider configuration
    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.provider = provider;
        self
    }

    /// Set the cache bounds
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Set the failure policy
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the response language
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.response_language = Some(language.into());
        self
    }

    /// Set the HTTP port
    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    /// Disable audio output (text-only mode)
    pub fn without_audio_output(mut self) -> Self {
        self.playback.enabled = false;
        self
    }

    pub fn language(&self) -> &str {
        self.response_language
            .as_deref()
            .unwrap_or(DEFAULT_RESPONSE_LANGUAGE)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.provider.has_api_key() {
            return Err(TutorError::ConfigError(
                "GEMINI_API_KEY (or API_KEY) is not set".to_string(),
            ));
        }

        if self.cache.max_entries == Some(0) {
            return Err(TutorError::ConfigError(
                "Cache size must be at least 1".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(TutorError::ConfigError(format!(
                "Temperature out of range: {}",
                self.provider.temperature
            )));
        }

        if self.playback.sample_rate == 0 {
            return Err(TutorError::ConfigError("Sample rate must be positive".to_string()));
        }

        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| TutorError::ConfigError(format!("Invalid {}={:?}: {}", name, value, e)))
}
