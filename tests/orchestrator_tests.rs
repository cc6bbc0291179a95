//! End-to-end orchestration tests against a scripted provider
//!
//! The provider answers each request according to the task it recognizes in
//! the prompt and counts every call, so cache hits and early rejections can be
//! asserted without a network.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use study_buddy::analysis::{ImageInput, ProblemInput, ResponseFormat, Subject, TaskKind};
use study_buddy::audio::{AudioPayload, PlaybackEngine};
use study_buddy::cache::{CacheConfig, ResponseCache};
use study_buddy::integration::{FailurePolicy, TaskOrchestrator};
use study_buddy::llm::{
    AiGateway, ContentPart, GenerateRequest, GenerateResponse, ModelProvider, ProviderConfig,
    ProviderFailure,
};
use study_buddy::{TutorError, SYSTEM_BUSY_MESSAGE};

const QUICK_JSON: &str = r#"{"finalAnswer": "x = 5", "casioSteps": "SHIFT SOLVE", "audioSummary": "x equals five."}"#;
const GUIDE_TEXT: &str = "## Step 1\nSubtract 4: $2x = 10$.\n## Step 2\nDivide by 2: $x = 5$.";
const QUIZ_JSON: &str = r#"{"quizzes": [
    {"question": "Solve 3x = 9", "options": ["A. 1", "B. 3", "C. 6", "D. 9"], "answer": "B", "explanation": "9 / 3 = 3"},
    {"question": "Solve 2x - 6 = 4", "options": ["A. 1", "B. 2", "C. 5", "D. 10"], "answer": "C", "explanation": "2x = 10"}
]}"#;

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Healthy,
    Failing,
    RateLimited,
    /// Only the quiz call fails
    QuizBroken,
    /// Speech requests return text only
    NoAudio,
    /// First quiz reply is cut off mid-JSON, later ones are valid
    QuizTruncatedOnce,
    /// Quiz questions carry three options
    QuizThreeOptions,
    /// Quick answer comes back as prose
    QuickNotJson,
}

const QUIZ_THREE_OPTIONS: &str = r#"{"quizzes": [
    {"question": "Solve 3x = 9", "options": ["A. 1", "B. 3", "C. 6"], "answer": "B", "explanation": "9 / 3 = 3"},
    {"question": "Solve 2x - 6 = 4", "options": ["A. 1", "B. 2", "C. 5"], "answer": "C", "explanation": "2x = 10"}
]}"#;

struct ScriptedProvider {
    mode: Mode,
    calls: AtomicUsize,
    quiz_calls: AtomicUsize,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedProvider {
    fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicUsize::new(0),
            quiz_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn quiz_calls(&self) -> usize {
        self.quiz_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn generate(
        &self,
        request: GenerateRequest,
    ) -> Result<GenerateResponse, ProviderFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        match self.mode {
            Mode::Failing => return Err(ProviderFailure::new(Some(500), "internal error")),
            Mode::RateLimited => {
                return Err(ProviderFailure::new(
                    Some(429),
                    "RESOURCE_EXHAUSTED: quota exceeded",
                ))
            }
            _ => {}
        }

        if request.options.speech.is_some() {
            if self.mode == Mode::NoAudio {
                return Ok(GenerateResponse::from_text("no audio today"));
            }
            let payload = AudioPayload::from_samples(&[0.0, 0.25, -0.25, 0.5]);
            return Ok(GenerateResponse {
                parts: vec![ContentPart::inline(payload.mime_type, payload.data_base64)],
            });
        }

        let prompt = request.text();
        let reply = if prompt.contains("quizzes") {
            let seen = self.quiz_calls.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                Mode::QuizBroken => return Err(ProviderFailure::transport("connection reset")),
                Mode::QuizTruncatedOnce if seen == 0 => r#"{"quizzes": ["#,
                Mode::QuizThreeOptions => QUIZ_THREE_OPTIONS,
                _ => QUIZ_JSON,
            }
        } else if prompt.contains("finalAnswer") {
            if self.mode == Mode::QuickNotJson {
                "The answer is x = 5."
            } else {
                QUICK_JSON
            }
        } else if prompt.starts_with("Summarize") {
            "x equals five."
        } else {
            GUIDE_TEXT
        };
        Ok(GenerateResponse::from_text(reply))
    }
}

fn orchestrator(provider: Arc<ScriptedProvider>, policy: FailurePolicy) -> TaskOrchestrator {
    let gateway = AiGateway::new(
        provider,
        ProviderConfig::new("test-key"),
        ResponseCache::new(CacheConfig::unbounded()),
    );
    let playback = Arc::new(PlaybackEngine::new(
        study_buddy::audio::disabled_context_factory(),
    ));
    TaskOrchestrator::new(gateway, playback).with_failure_policy(policy)
}

#[tokio::test]
async fn test_empty_request_is_rejected_before_any_call() {
    let provider = ScriptedProvider::new(Mode::Healthy);
    let orch = orchestrator(provider.clone(), FailurePolicy::AllOrNothing);

    for input in [ProblemInput::default(), ProblemInput::text("   ")] {
        let err = orch.solve(Subject::Math, &input).await.unwrap_err();
        assert!(matches!(err, TutorError::InvalidRequest(_)));
    }
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_solve_merges_all_three_tasks() {
    let provider = ScriptedProvider::new(Mode::Healthy);
    let orch = orchestrator(provider.clone(), FailurePolicy::AllOrNothing);

    let result = orch
        .solve(Subject::Math, &ProblemInput::text("2x+4=14"))
        .await
        .unwrap();

    assert!(!result.is_fallback());
    assert_eq!(result.quick_answer, "x = 5");
    assert_eq!(result.calculator_steps, "SHIFT SOLVE");
    assert_eq!(result.audio_summary, "x equals five.");
    assert_eq!(result.detailed_guide, GUIDE_TEXT);
    assert_eq!(result.practice_questions.len(), 2);
    assert_eq!(result.practice_questions[0].correct_option(), Some("B. 3"));
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_second_solve_is_served_from_cache() {
    let provider = ScriptedProvider::new(Mode::Healthy);
    let orch = orchestrator(provider.clone(), FailurePolicy::AllOrNothing);
    let input = ProblemInput::text("2x+4=14");

    let first = orch.solve(Subject::Math, &input).await.unwrap();
    let second = orch.solve(Subject::Math, &input).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(provider.calls(), 3);
    assert_eq!(orch.gateway().cache().text_len(), 3);
}

#[tokio::test]
async fn test_cache_is_per_subject() {
    let provider = ScriptedProvider::new(Mode::Healthy);
    let orch = orchestrator(provider.clone(), FailurePolicy::AllOrNothing);
    let input = ProblemInput::text("F = ma");

    orch.solve(Subject::Math, &input).await.unwrap();
    orch.solve(Subject::Physics, &input).await.unwrap();
    assert_eq!(provider.calls(), 6);
}

#[tokio::test]
async fn test_inputs_sharing_fifty_chars_share_cached_results() {
    let provider = ScriptedProvider::new(Mode::Healthy);
    let orch = orchestrator(provider.clone(), FailurePolicy::AllOrNothing);
    let shared = "x".repeat(50);

    orch.solve(Subject::Math, &ProblemInput::text(format!("{shared} + 1")))
        .await
        .unwrap();
    orch.solve(Subject::Math, &ProblemInput::text(format!("{shared} + 2")))
        .await
        .unwrap();
    assert_eq!(provider.calls(), 3);

    // One character earlier the inputs are distinct
    let shorter = "x".repeat(49);
    orch.solve(Subject::Math, &ProblemInput::text(format!("{shorter}a")))
        .await
        .unwrap();
    orch.solve(Subject::Math, &ProblemInput::text(format!("{shorter}b")))
        .await
        .unwrap();
    assert_eq!(provider.calls(), 9);
}

#[tokio::test]
async fn test_failing_provider_yields_placeholder() {
    let provider = ScriptedProvider::new(Mode::Failing);
    let orch = orchestrator(provider.clone(), FailurePolicy::AllOrNothing);

    let result = orch
        .solve(Subject::Math, &ProblemInput::text("2x+4=14"))
        .await
        .unwrap();

    assert!(result.is_fallback());
    assert_eq!(result.practice_questions.len(), 2);
    // Failures are not cached
    assert_eq!(orch.gateway().cache().text_len(), 0);
}

#[tokio::test]
async fn test_single_task_failure_replaces_whole_result() {
    let provider = ScriptedProvider::new(Mode::QuizBroken);
    let orch = orchestrator(provider.clone(), FailurePolicy::AllOrNothing);

    let result = orch
        .solve(Subject::Math, &ProblemInput::text("2x+4=14"))
        .await
        .unwrap();
    assert!(result.is_fallback());
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_per_task_report_keeps_partial_successes() {
    let provider = ScriptedProvider::new(Mode::QuizBroken);
    let orch = orchestrator(provider, FailurePolicy::AllOrNothing);

    let report = orch
        .solve_per_task(Subject::Math, &ProblemInput::text("2x+4=14"))
        .await
        .unwrap();

    assert!(report.quick.is_success());
    assert!(report.guide.is_success());
    assert!(matches!(report.quiz.error(), Some(TutorError::Provider(_))));
    assert!(!report.all_succeeded());
}

#[tokio::test]
async fn test_strict_policy_surfaces_failure() {
    let provider = ScriptedProvider::new(Mode::QuizBroken);
    let orch = orchestrator(provider, FailurePolicy::Strict);

    let err = orch
        .solve(Subject::Math, &ProblemInput::text("2x+4=14"))
        .await
        .unwrap_err();
    assert!(err.is_provider_failure());
}

#[tokio::test]
async fn test_rate_limit_reports_system_busy() {
    let provider = ScriptedProvider::new(Mode::RateLimited);
    let orch = orchestrator(provider, FailurePolicy::AllOrNothing);

    let err = orch
        .solve(Subject::Chemistry, &ProblemInput::text("H2 + O2"))
        .await
        .unwrap_err();
    assert_eq!(err, TutorError::RateLimited);
    assert_eq!(err.to_string(), SYSTEM_BUSY_MESSAGE);

    let err = orch.summarize_and_speak("x = 5").await.unwrap_err();
    assert_eq!(err.to_string(), SYSTEM_BUSY_MESSAGE);
}

#[tokio::test]
async fn test_summarize_failure_propagates() {
    let provider = ScriptedProvider::new(Mode::Failing);
    let orch = orchestrator(provider, FailurePolicy::AllOrNothing);

    let err = orch.summarize_and_speak("x = 5").await.unwrap_err();
    assert!(matches!(err, TutorError::Provider(_)));
}

#[tokio::test]
async fn test_summarize_and_speak_returns_audio() {
    let provider = ScriptedProvider::new(Mode::Healthy);
    let orch = orchestrator(provider.clone(), FailurePolicy::AllOrNothing);

    let payload = orch.summarize_and_speak("x = 5").await.unwrap().unwrap();
    assert_eq!(payload.decode().unwrap().len(), 4);
    assert_eq!(provider.calls(), 2);

    // Summary text is not cached, its audio is
    orch.summarize_and_speak("x = 5").await.unwrap();
    assert_eq!(provider.calls(), 3);
    assert_eq!(orch.gateway().cache().audio_len(), 1);
}

#[tokio::test]
async fn test_missing_audio_is_absent_not_error() {
    let provider = ScriptedProvider::new(Mode::NoAudio);
    let orch = orchestrator(provider, FailurePolicy::AllOrNothing);

    assert_eq!(orch.summarize_and_speak("x = 5").await.unwrap(), None);
    assert!(orch.speak("x = 5").await.unwrap().is_none());
}

#[tokio::test]
async fn test_practice_questions_are_well_formed() {
    for mode in [Mode::Healthy, Mode::Failing] {
        let orch = orchestrator(ScriptedProvider::new(mode), FailurePolicy::AllOrNothing);
        let result = orch
            .solve(Subject::Math, &ProblemInput::text("2x+4=14"))
            .await
            .unwrap();

        for question in &result.practice_questions {
            assert_eq!(question.options.len(), 4);
            assert!((question.correct_index as usize) < question.options.len());
        }
    }
}

#[tokio::test]
async fn test_request_shape_per_task() {
    let provider = ScriptedProvider::new(Mode::Healthy);
    let orch = orchestrator(provider.clone(), FailurePolicy::AllOrNothing);
    let input = ProblemInput::text("2x+4=14")
        .with_image(ImageInput::from_data_url("data:image/png;base64,iVBORw0KGgo="));

    orch.solve(Subject::Math, &input).await.unwrap();

    let requests = provider.requests.lock();
    assert_eq!(requests.len(), 3);
    for request in requests.iter() {
        assert_eq!(
            request.parts[0],
            ContentPart::inline("image/png", "iVBORw0KGgo=")
        );

        let expected = if request.text().contains("professor") {
            ResponseFormat::PlainText
        } else {
            ResponseFormat::Json
        };
        assert_eq!(request.options.response_format, Some(expected));
    }
}

#[tokio::test]
async fn test_image_only_request_is_accepted() {
    let provider = ScriptedProvider::new(Mode::Healthy);
    let orch = orchestrator(provider.clone(), FailurePolicy::AllOrNothing);

    let result = orch
        .solve(
            Subject::Physics,
            &ProblemInput::image(ImageInput::from_data_url("/9j/4AAQSkZJRg==")),
        )
        .await
        .unwrap();
    assert!(!result.is_fallback());
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_malformed_json_yields_placeholder() {
    for mode in [Mode::QuizThreeOptions, Mode::QuickNotJson] {
        let orch = orchestrator(ScriptedProvider::new(mode), FailurePolicy::AllOrNothing);
        let result = orch
            .solve(Subject::Math, &ProblemInput::text("2x+4=14"))
            .await
            .unwrap();
        assert!(result.is_fallback());
    }
}

#[tokio::test]
async fn test_strict_policy_reports_malformed_task() {
    let orch = orchestrator(
        ScriptedProvider::new(Mode::QuizThreeOptions),
        FailurePolicy::Strict,
    );
    let err = orch
        .solve(Subject::Math, &ProblemInput::text("2x+4=14"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TutorError::MalformedResponse {
            task: TaskKind::PracticeQuiz,
            ..
        }
    ));

    let orch = orchestrator(ScriptedProvider::new(Mode::QuickNotJson), FailurePolicy::Strict);
    let err = orch
        .solve(Subject::Math, &ProblemInput::text("2x+4=14"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TutorError::MalformedResponse {
            task: TaskKind::QuickAnswer,
            ..
        }
    ));
}

#[tokio::test]
async fn test_truncated_reply_is_retried_on_next_solve() {
    let provider = ScriptedProvider::new(Mode::QuizTruncatedOnce);
    let orch = orchestrator(provider.clone(), FailurePolicy::AllOrNothing);
    let input = ProblemInput::text("2x+4=14");

    let first = orch.solve(Subject::Math, &input).await.unwrap();
    assert!(first.is_fallback());
    assert_eq!(orch.gateway().cache().text_len(), 2);

    let second = orch.solve(Subject::Math, &input).await.unwrap();
    assert!(!second.is_fallback());
    assert_eq!(second.practice_questions.len(), 2);
    assert_eq!(provider.quiz_calls(), 2);
    // Quick answer and guide came from the cache
    assert_eq!(provider.calls(), 4);
    assert_eq!(orch.gateway().cache().text_len(), 3);
}
