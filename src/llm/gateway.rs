//! Single entry point for every model call
//!
//! The gateway picks the prompt, consults the [`ResponseCache`], talks to the
//! [`ModelProvider`] and normalizes provider failures into [`TutorError`].

use crate::analysis::{ProblemInput, Subject, TaskKind};
use crate::audio::AudioPayload;
use crate::cache::{CacheKey, ResponseCache, TEXT_KEY_PREFIX_CHARS};
use crate::llm::config::ProviderConfig;
use crate::llm::prompts::{build_task_prompt, DEFAULT_RESPONSE_LANGUAGE};
use crate::llm::provider::{
    ContentPart, GenerateRequest, GenerationOptions, ModelProvider, ProviderFailure,
};
use crate::{Result, TutorError};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

pub struct AiGateway {
    provider: Arc<dyn ModelProvider>,
    cache: ResponseCache,
    config: ProviderConfig,
    language: String,
    prefix_chars: usize,
}

impl AiGateway {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        config: ProviderConfig,
        cache: ResponseCache,
    ) -> Self {
        Self {
            provider,
            cache,
            config,
            language: DEFAULT_RESPONSE_LANGUAGE.to_string(),
            prefix_chars: TEXT_KEY_PREFIX_CHARS,
        }
    }

    /// Language the model is asked to answer in
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Number of text characters that take part in the cache key
    pub fn with_prefix_chars(mut self, prefix_chars: usize) -> Self {
        self.prefix_chars = prefix_chars;
        self
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Raw model text for one task, served from the cache when possible
    pub async fn call(
        &self,
        subject: Subject,
        task: TaskKind,
        input: &ProblemInput,
    ) -> Result<String> {
        self.call_shaped(subject, task, input, |raw| Ok(raw.to_string()))
            .await
    }

    /// Like [`call`](Self::call), but the model text is only cached once
    /// `shape` accepts it, so a malformed reply is asked for again next time.
    pub async fn call_shaped<T, F>(
        &self,
        subject: Subject,
        task: TaskKind,
        input: &ProblemInput,
        shape: F,
    ) -> Result<T>
    where
        F: Fn(&str) -> Result<T>,
    {
        let key = CacheKey::for_task(subject, task, input, self.prefix_chars);
        if let Some(hit) = self.cache.get_text(&key) {
            return shape(&hit);
        }

        let prompt = build_task_prompt(subject, task, input.text_or_empty(), &self.language);
        let request = GenerateRequest::new(&self.config.text_model, request_parts(prompt, input))
            .with_options(GenerationOptions::text(
                self.config.temperature,
                task.response_format(),
            ));

        let start = Instant::now();
        let response = self
            .provider
            .generate(request)
            .await
            .map_err(|e| normalize(task.as_str(), e))?;
        let text = response.text();
        info!(
            "{} answered in {:?} ({} chars)",
            task,
            start.elapsed(),
            text.chars().count()
        );

        let shaped = shape(&text)?;
        self.cache.put_text(key, text);
        Ok(shaped)
    }

    /// Uncached call with a caller-supplied prompt
    pub async fn call_with_prompt(&self, prompt: &str, input: &ProblemInput) -> Result<String> {
        let request = GenerateRequest::new(
            &self.config.text_model,
            request_parts(prompt.to_string(), input),
        )
        .with_options(GenerationOptions {
            temperature: Some(self.config.temperature),
            ..Default::default()
        });

        let response = self
            .provider
            .generate(request)
            .await
            .map_err(|e| normalize("prompt", e))?;
        Ok(response.text())
    }

    /// Synthesized speech for `text`; `None` for blank text or when the model returns no audio
    pub async fn fetch_audio(&self, text: &str) -> Result<Option<AudioPayload>> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let key = CacheKey::for_audio(text);
        if let Some(hit) = self.cache.get_audio(&key) {
            return Ok(Some(hit));
        }

        let request = GenerateRequest::new(&self.config.tts_model, vec![ContentPart::text(text)])
            .with_options(GenerationOptions::speech(&self.config.voice));

        let start = Instant::now();
        let response = self
            .provider
            .generate(request)
            .await
            .map_err(|e| normalize("speech", e))?;

        let Some((mime_type, data)) = response.first_inline_data() else {
            debug!("Speech response carried no audio part");
            return Ok(None);
        };

        let payload = AudioPayload::new(data, mime_type);
        info!("Speech synthesized in {:?}", start.elapsed());
        self.cache.put_audio(key, payload.clone());
        Ok(Some(payload))
    }
}

/// Image first, then the instruction text
fn request_parts(prompt: String, input: &ProblemInput) -> Vec<ContentPart> {
    let mut parts = Vec::with_capacity(2);
    if let Some(image) = &input.image {
        parts.push(ContentPart::inline(&image.mime_type, &image.data_base64));
    }
    parts.push(ContentPart::Text(prompt));
    parts
}

fn normalize(call: &str, failure: ProviderFailure) -> TutorError {
    if failure.is_rate_limited() {
        error!("{} call rate limited: {}", call, failure);
        TutorError::RateLimited
    } else {
        error!("{} call failed: {}", call, failure);
        TutorError::Provider(failure.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ImageInput, ResponseFormat};
    use crate::llm::provider::GenerateResponse;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct Recorder {
        reply: std::result::Result<GenerateResponse, ProviderFailure>,
        seen: Mutex<Vec<GenerateRequest>>,
    }

    impl Recorder {
        fn new(reply: std::result::Result<GenerateResponse, ProviderFailure>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ModelProvider for Recorder {
        async fn generate(
            &self,
            request: GenerateRequest,
        ) -> std::result::Result<GenerateResponse, ProviderFailure> {
            self.seen.lock().push(request);
            self.reply.clone()
        }
    }

    fn gateway(provider: Arc<Recorder>) -> AiGateway {
        AiGateway::new(provider, ProviderConfig::new("key"), ResponseCache::default())
    }

    #[tokio::test]
    async fn test_image_part_precedes_prompt() {
        let provider = Recorder::new(Ok(GenerateResponse::from_text("guide")));
        let gw = gateway(provider.clone());
        let input = ProblemInput::text("2x=4")
            .with_image(ImageInput::from_data_url("data:image/png;base64,QUJD"));

        gw.call(Subject::Math, TaskKind::DetailedGuide, &input).await.unwrap();

        let seen = provider.seen.lock();
        assert_eq!(seen[0].parts[0], ContentPart::inline("image/png", "QUJD"));
        assert!(matches!(&seen[0].parts[1], ContentPart::Text(t) if t.ends_with("Problem: 2x=4")));
        assert_eq!(seen[0].options.response_format, Some(ResponseFormat::PlainText));
        assert_eq!(seen[0].options.temperature, Some(0.1));
    }

    #[tokio::test]
    async fn test_rate_limit_is_normalized() {
        let provider = Recorder::new(Err(ProviderFailure::new(Some(429), "quota")));
        let err = gateway(provider)
            .call(Subject::Physics, TaskKind::QuickAnswer, &ProblemInput::text("v?"))
            .await
            .unwrap_err();
        assert_eq!(err, TutorError::RateLimited);
    }

    #[tokio::test]
    async fn test_other_failures_become_provider_errors() {
        let provider = Recorder::new(Err(ProviderFailure::new(Some(500), "boom")));
        let err = gateway(provider)
            .call_with_prompt("summarize", &ProblemInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TutorError::Provider(msg) if msg.contains("boom")));
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let provider = Recorder::new(Err(ProviderFailure::transport("offline")));
        let gw = gateway(provider.clone());
        let input = ProblemInput::text("x");
        let _ = gw.call(Subject::Math, TaskKind::QuickAnswer, &input).await;
        let _ = gw.call(Subject::Math, TaskKind::QuickAnswer, &input).await;
        assert_eq!(provider.seen.lock().len(), 2);
        assert_eq!(gw.cache().text_len(), 0);
    }

    #[tokio::test]
    async fn test_speech_request_uses_tts_model_and_voice() {
        let provider = Recorder::new(Ok(GenerateResponse {
            parts: vec![ContentPart::inline("audio/L16;codec=pcm;rate=24000", "AAAA")],
        }));
        let gw = gateway(provider.clone());

        let payload = gw.fetch_audio("x is five").await.unwrap().unwrap();
        assert_eq!(payload.data_base64, "AAAA");

        let seen = provider.seen.lock();
        assert_eq!(seen[0].model, crate::llm::config::DEFAULT_TTS_MODEL);
        assert_eq!(
            seen[0].options.speech.as_ref().map(|s| s.voice.as_str()),
            Some("Puck")
        );
    }

    #[tokio::test]
    async fn test_blank_speech_text_makes_no_call() {
        let provider = Recorder::new(Ok(GenerateResponse::default()));
        let gw = gateway(provider.clone());
        assert_eq!(gw.fetch_audio("   ").await.unwrap(), None);
        assert!(provider.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_text_is_not_cached() {
        let provider = Recorder::new(Ok(GenerateResponse::from_text("{\"quizzes\": [")));
        let gw = gateway(provider.clone());
        let input = ProblemInput::text("2x=4");
        let reject = |raw: &str| -> Result<String> {
            Err(TutorError::MalformedResponse {
                task: TaskKind::PracticeQuiz,
                reason: format!("unterminated: {raw}"),
            })
        };

        for _ in 0..2 {
            let err = gw
                .call_shaped(Subject::Math, TaskKind::PracticeQuiz, &input, reject)
                .await
                .unwrap_err();
            assert!(matches!(err, TutorError::MalformedResponse { .. }));
        }
        assert_eq!(provider.seen.lock().len(), 2);
        assert_eq!(gw.cache().text_len(), 0);
    }
}
