//! Orchestrator for the tutor's user-facing actions
//!
//! `solve` fans one problem out to the three task calls and merges the shaped
//! outputs. `speak` chains summarization, speech synthesis and playback.

use crate::analysis::{
    parse_quick_answer, parse_quiz, placeholder_result, AnalysisResult, ProblemInput,
    SolveReport, SolveRequest, Subject, TaskKind, TaskOutcome,
};
use crate::audio::{
    default_context_factory, disabled_context_factory, AudioPayload, PlaybackEngine,
    PlaybackHandle,
};
use crate::cache::ResponseCache;
use crate::integration::config::{FailurePolicy, TutorConfig};
use crate::llm::gateway::AiGateway;
use crate::llm::gemini::GeminiProvider;
use crate::llm::prompts::build_summary_prompt;
use crate::llm::provider::ModelProvider;
use crate::{Result, TutorError};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Entry point used by the UI and the HTTP service
pub struct TaskOrchestrator {
    gateway: AiGateway,
    playback: Arc<PlaybackEngine>,
    policy: FailurePolicy,
}

impl TaskOrchestrator {
    pub fn new(gateway: AiGateway, playback: Arc<PlaybackEngine>) -> Self {
        Self {
            gateway,
            playback,
            policy: FailurePolicy::default(),
        }
    }

    /// Build the production stack: REST provider, configured cache, lazy output device
    pub fn from_config(config: &TutorConfig) -> Result<Self> {
        config.validate()?;
        let provider: Arc<dyn ModelProvider> = Arc::new(GeminiProvider::new(&config.provider)?);
        Ok(Self::with_provider(config, provider))
    }

    /// Same wiring as `from_config` around an arbitrary provider
    pub fn with_provider(config: &TutorConfig, provider: Arc<dyn ModelProvider>) -> Self {
        let gateway = AiGateway::new(
            provider,
            config.provider.clone(),
            ResponseCache::new(config.cache.clone()),
        )
        .with_language(config.language());

        let factory = if config.playback.enabled {
            default_context_factory()
        } else {
            disabled_context_factory()
        };
        let engine = PlaybackEngine::with_sample_rate(factory, config.playback.sample_rate);

        Self::new(gateway, Arc::new(engine)).with_failure_policy(config.failure_policy)
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn gateway(&self) -> &AiGateway {
        &self.gateway
    }

    pub fn playback(&self) -> &Arc<PlaybackEngine> {
        &self.playback
    }

    /// Run all three tasks and report each outcome separately
    pub async fn solve_per_task(
        &self,
        subject: Subject,
        input: &ProblemInput,
    ) -> Result<SolveReport> {
        input.validate()?;

        let start = Instant::now();
        let (quick, guide, quiz) = tokio::join!(
            self.gateway
                .call_shaped(subject, TaskKind::QuickAnswer, input, parse_quick_answer),
            self.gateway.call(subject, TaskKind::DetailedGuide, input),
            self.gateway
                .call_shaped(subject, TaskKind::PracticeQuiz, input, parse_quiz),
        );

        let report = SolveReport {
            quick: TaskOutcome::from_result(quick),
            guide: TaskOutcome::from_result(guide),
            quiz: TaskOutcome::from_result(quiz),
        };

        info!(
            "Solved {} problem in {:?} (all tasks ok: {})",
            subject,
            start.elapsed(),
            report.all_succeeded()
        );
        Ok(report)
    }

    /// Run all three tasks and merge them into one result
    pub async fn solve(&self, subject: Subject, input: &ProblemInput) -> Result<AnalysisResult> {
        let report = self.solve_per_task(subject, input).await?;

        match self.policy {
            FailurePolicy::Strict => report.into_result(),
            FailurePolicy::AllOrNothing => {
                if report.is_rate_limited() {
                    return Err(TutorError::RateLimited);
                }
                match report.into_result() {
                    Ok(result) => Ok(result),
                    Err(e) => {
                        warn!("Live analysis unavailable, using offline example: {}", e);
                        Ok(placeholder_result(e.to_string()))
                    }
                }
            }
        }
    }

    pub async fn solve_request(&self, request: &SolveRequest) -> Result<AnalysisResult> {
        self.solve(request.subject, &request.input).await
    }

    /// Summarize `content` into one short sentence and synthesize it.
    /// `None` when there is nothing to say or the model returned no audio.
    pub async fn summarize_and_speak(&self, content: &str) -> Result<Option<AudioPayload>> {
        if content.trim().is_empty() {
            return Ok(None);
        }

        let summary = self
            .gateway
            .call_with_prompt(&build_summary_prompt(content), &ProblemInput::default())
            .await?;

        let summary = summary.trim();
        if summary.is_empty() {
            debug!("Empty summary, skipping speech");
            return Ok(None);
        }

        self.gateway.fetch_audio(summary).await
    }

    /// Summarize, synthesize and play `content`, replacing any clip in flight
    pub async fn speak(&self, content: &str) -> Result<Option<PlaybackHandle>> {
        match self.summarize_and_speak(content).await? {
            Some(payload) => self.playback.play(&payload).map(Some),
            None => Ok(None),
        }
    }

    /// Stop the current clip. Returns whether something was playing.
    pub fn stop_speaking(&self) -> bool {
        self.playback.stop()
    }
}
