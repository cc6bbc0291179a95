//! Domain types shared by the gateway, the orchestrator and the HTTP service

use crate::{Result, TutorError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// MIME type assumed for images that arrive without a data-URL header
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// School subject chosen before any AI call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    Math,
    Physics,
    Chemistry,
    #[serde(rename = "diary")]
    GeneralDiary,
}

impl Subject {
    /// Stable identifier, used in cache keys and on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Math => "math",
            Subject::Physics => "physics",
            Subject::Chemistry => "chemistry",
            Subject::GeneralDiary => "diary",
        }
    }

    /// Label sent to the model
    pub fn display_name(&self) -> &'static str {
        match self {
            Subject::Math => "Toán Học",
            Subject::Physics => "Vật Lý",
            Subject::Chemistry => "Hóa Học",
            Subject::GeneralDiary => "Nhật Ký",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Subject {
    type Err = TutorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "math" => Ok(Subject::Math),
            "physics" => Ok(Subject::Physics),
            "chemistry" => Ok(Subject::Chemistry),
            "diary" | "general" => Ok(Subject::GeneralDiary),
            other => Err(TutorError::InvalidRequest(format!(
                "unknown subject: {other}"
            ))),
        }
    }
}

/// Expected shape of the model output for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    PlainText,
}

impl ResponseFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ResponseFormat::Json => "application/json",
            ResponseFormat::PlainText => "text/plain",
        }
    }
}

/// Derived view requested from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    QuickAnswer,
    DetailedGuide,
    PracticeQuiz,
}

impl TaskKind {
    /// All tasks, in the order `solve` fires them
    pub const ALL: [TaskKind; 3] = [
        TaskKind::QuickAnswer,
        TaskKind::DetailedGuide,
        TaskKind::PracticeQuiz,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::QuickAnswer => "quick-answer",
            TaskKind::DetailedGuide => "detailed-guide",
            TaskKind::PracticeQuiz => "practice-quiz",
        }
    }

    pub fn response_format(&self) -> ResponseFormat {
        match self {
            TaskKind::DetailedGuide => ResponseFormat::PlainText,
            TaskKind::QuickAnswer | TaskKind::PracticeQuiz => ResponseFormat::Json,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inline image attached to a problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInput {
    /// Base64 payload without any data-URL header
    pub data_base64: String,
    pub mime_type: String,
}

impl ImageInput {
    /// Accepts either a `data:image/...;base64,` URL or a bare base64 string.
    pub fn from_data_url(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(rest) = raw.strip_prefix("data:") {
            if let Some((header, payload)) = rest.split_once(',') {
                let mime = header
                    .split(';')
                    .next()
                    .filter(|m| !m.is_empty())
                    .unwrap_or(DEFAULT_IMAGE_MIME);
                return Self {
                    data_base64: payload.to_string(),
                    mime_type: mime.to_string(),
                };
            }
        }

        Self {
            data_base64: raw.to_string(),
            mime_type: DEFAULT_IMAGE_MIME.to_string(),
        }
    }

    /// Wrap raw image bytes read from disk
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        use base64::Engine as _;
        Self {
            data_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type: mime_type.into(),
        }
    }
}

/// Problem statement as text, image, or both
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProblemInput {
    pub text: Option<String>,
    pub image: Option<ImageInput>,
}

impl ProblemInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }

    pub fn image(image: ImageInput) -> Self {
        Self {
            text: None,
            image: Some(image),
        }
    }

    pub fn with_image(mut self, image: ImageInput) -> Self {
        self.image = Some(image);
        self
    }

    /// Problem text, empty when only an image was supplied
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    /// At least one of text and image must be present
    pub fn validate(&self) -> Result<()> {
        if !self.has_text() && self.image.is_none() {
            return Err(TutorError::InvalidRequest(
                "neither text nor image was supplied".into(),
            ));
        }
        Ok(())
    }
}

/// A solve request as received from the UI collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveRequest {
    pub subject: Subject,
    pub input: ProblemInput,
}

impl SolveRequest {
    pub fn new(subject: Subject, input: ProblemInput) -> Self {
        Self { subject, input }
    }

    pub fn validate(&self) -> Result<()> {
        self.input.validate()
    }
}

/// Multiple-choice practice question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawPracticeQuestion")]
pub struct PracticeQuestion {
    pub prompt: String,
    pub options: [String; 4],
    pub correct_index: u8,
    pub explanation: String,
}

impl PracticeQuestion {
    pub fn new(
        prompt: impl Into<String>,
        options: [String; 4],
        correct_index: u8,
        explanation: impl Into<String>,
    ) -> Result<Self> {
        if usize::from(correct_index) >= options.len() {
            return Err(TutorError::MalformedResponse {
                task: TaskKind::PracticeQuiz,
                reason: format!("correct index {correct_index} is out of range"),
            });
        }

        Ok(Self {
            prompt: prompt.into(),
            options,
            correct_index,
            explanation: explanation.into(),
        })
    }

    /// Text of the correct option; `None` if `correct_index` was set out of range
    pub fn correct_option(&self) -> Option<&str> {
        self.options
            .get(usize::from(self.correct_index))
            .map(String::as_str)
    }
}

/// Unchecked wire form, validated through [`PracticeQuestion::new`]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPracticeQuestion {
    prompt: String,
    options: [String; 4],
    correct_index: u8,
    explanation: String,
}

impl TryFrom<RawPracticeQuestion> for PracticeQuestion {
    type Error = TutorError;

    fn try_from(raw: RawPracticeQuestion) -> Result<Self> {
        Self::new(raw.prompt, raw.options, raw.correct_index, raw.explanation)
    }
}

/// Final answer plus calculator guidance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickAnswer {
    pub final_answer: String,
    pub calculator_steps: String,
    pub audio_summary: String,
}

/// Where an `AnalysisResult` came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResultSource {
    Live,
    /// Locally generated placeholder; the UI should tell the user
    Fallback { reason: String },
}

/// Aggregate of every task output for one solve request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub quick_answer: String,
    pub calculator_steps: String,
    pub detailed_guide: String,
    pub practice_questions: Vec<PracticeQuestion>,
    pub audio_summary: String,
    pub source: ResultSource,
}

impl AnalysisResult {
    pub fn from_parts(
        quick: QuickAnswer,
        detailed_guide: String,
        practice_questions: Vec<PracticeQuestion>,
    ) -> Self {
        Self {
            quick_answer: quick.final_answer,
            calculator_steps: quick.calculator_steps,
            detailed_guide,
            practice_questions,
            audio_summary: quick.audio_summary,
            source: ResultSource::Live,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.source, ResultSource::Fallback { .. })
    }
}

/// Result of a single task within a solve
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<T> {
    Succeeded(T),
    Failed(TutorError),
}

impl<T> TaskOutcome<T> {
    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(value) => TaskOutcome::Succeeded(value),
            Err(e) => TaskOutcome::Failed(e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded(_))
    }

    pub fn error(&self) -> Option<&TutorError> {
        match self {
            TaskOutcome::Succeeded(_) => None,
            TaskOutcome::Failed(e) => Some(e),
        }
    }

    pub fn into_result(self) -> Result<T> {
        match self {
            TaskOutcome::Succeeded(value) => Ok(value),
            TaskOutcome::Failed(e) => Err(e),
        }
    }
}

/// Per-task view of one solve request
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    pub quick: TaskOutcome<QuickAnswer>,
    pub guide: TaskOutcome<String>,
    pub quiz: TaskOutcome<Vec<PracticeQuestion>>,
}

impl SolveReport {
    pub fn all_succeeded(&self) -> bool {
        self.quick.is_success() && self.guide.is_success() && self.quiz.is_success()
    }

    /// First failure in task order, if any
    pub fn first_error(&self) -> Option<&TutorError> {
        self.quick
            .error()
            .or_else(|| self.guide.error())
            .or_else(|| self.quiz.error())
    }

    pub fn is_rate_limited(&self) -> bool {
        [self.quick.error(), self.guide.error(), self.quiz.error()]
            .into_iter()
            .flatten()
            .any(|e| matches!(e, TutorError::RateLimited))
    }

    /// Collapse into one result; any failed task fails the whole.
    pub fn into_result(self) -> Result<AnalysisResult> {
        let quick = self.quick.into_result()?;
        let guide = self.guide.into_result()?;
        let quiz = self.quiz.into_result()?;
        Ok(AnalysisResult::from_parts(quick, guide, quiz))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_prefix_is_stripped() {
        let image = ImageInput::from_data_url("data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(image.data_base64, "iVBORw0KGgo=");
        assert_eq!(image.mime_type, "image/png");
    }

    #[test]
    fn test_raw_base64_is_used_as_is() {
        let image = ImageInput::from_data_url("/9j/4AAQSkZJRg==");
        assert_eq!(image.data_base64, "/9j/4AAQSkZJRg==");
        assert_eq!(image.mime_type, DEFAULT_IMAGE_MIME);
    }

    #[test]
    fn test_input_validation() {
        assert!(ProblemInput::default().validate().is_err());
        assert!(ProblemInput::text("   ").validate().is_err());
        assert!(ProblemInput::text("2x+4=14").validate().is_ok());
        assert!(ProblemInput::image(ImageInput::from_data_url("abc"))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_practice_question_index_is_checked() {
        let options = ["1", "2", "3", "4"].map(String::from);
        assert!(PracticeQuestion::new("q", options.clone(), 3, "e").is_ok());
        assert!(PracticeQuestion::new("q", options, 4, "e").is_err());
    }

    #[test]
    fn test_subject_parsing() {
        assert_eq!("Math".parse::<Subject>().unwrap(), Subject::Math);
        assert_eq!("diary".parse::<Subject>().unwrap(), Subject::GeneralDiary);
        assert!("biology".parse::<Subject>().is_err());
    }

    #[test]
    fn test_task_formats() {
        assert_eq!(TaskKind::QuickAnswer.response_format(), ResponseFormat::Json);
        assert_eq!(TaskKind::PracticeQuiz.response_format(), ResponseFormat::Json);
        assert_eq!(
            TaskKind::DetailedGuide.response_format(),
            ResponseFormat::PlainText
        );
    }

    #[test]
    fn test_analysis_result_uses_camel_case() {
        let result = AnalysisResult::from_parts(
            QuickAnswer {
                final_answer: "x = 5".into(),
                calculator_steps: "none".into(),
                audio_summary: "x is five".into(),
            },
            "step".into(),
            Vec::new(),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["quickAnswer"], "x = 5");
        assert_eq!(json["practiceQuestions"], serde_json::json!([]));
        assert_eq!(json["source"]["kind"], "live");
    }

    #[test]
    fn test_deserialize_rejects_out_of_range_answer() {
        let json = r#"{"prompt": "1 + 1?", "options": ["1", "2", "3", "4"], "correctIndex": 7, "explanation": ""}"#;
        assert!(serde_json::from_str::<PracticeQuestion>(json).is_err());

        let json = json.replace("7", "1");
        let question: PracticeQuestion = serde_json::from_str(&json).unwrap();
        assert_eq!(question.correct_option(), Some("2"));
    }

    #[test]
    fn test_correct_option_tolerates_bad_index() {
        let mut question =
            PracticeQuestion::new("q", ["a", "b", "c", "d"].map(String::from), 0, "").unwrap();
        question.correct_index = 9;
        assert_eq!(question.correct_option(), None);
    }
}
