//! Shaping of raw model text into application data
//!
//! The prompt templates promise a JSON shape, but nothing forces the model to
//! honour it. Every structured response is validated field by field here and
//! rejected as `MalformedResponse` instead of leaking a raw parse error.

use crate::analysis::types::{PracticeQuestion, QuickAnswer, TaskKind};
use crate::{Result, TutorError};
use serde_json::{Map, Value};
use tracing::warn;

/// Literal the quick-answer prompt asks for when no calculator is needed
pub const NO_CALCULATOR_NEEDED: &str = "No calculator needed";

/// Parse a QuickAnswer response
pub fn parse_quick_answer(raw: &str) -> Result<QuickAnswer> {
    let task = TaskKind::QuickAnswer;
    let object = parse_object(task, raw)?;

    let final_answer = required_string(task, raw, &object, "finalAnswer")?;
    let calculator_steps = optional_string(&object, "casioSteps")
        .unwrap_or_else(|| NO_CALCULATOR_NEEDED.to_string());
    let audio_summary = optional_string(&object, "audioSummary").unwrap_or_default();

    Ok(QuickAnswer {
        final_answer,
        calculator_steps,
        audio_summary,
    })
}

/// Parse a PracticeQuiz response
pub fn parse_quiz(raw: &str) -> Result<Vec<PracticeQuestion>> {
    let task = TaskKind::PracticeQuiz;
    let object = parse_object(task, raw)?;

    let quizzes = object
        .get("quizzes")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed(task, raw, "missing `quizzes` array"))?;

    if quizzes.is_empty() {
        return Err(malformed(task, raw, "`quizzes` is empty"));
    }

    quizzes
        .iter()
        .enumerate()
        .map(|(i, item)| parse_question(raw, i, item))
        .collect()
}

fn parse_question(raw: &str, index: usize, item: &Value) -> Result<PracticeQuestion> {
    let task = TaskKind::PracticeQuiz;
    let object = item
        .as_object()
        .ok_or_else(|| malformed(task, raw, &format!("quiz {index} is not an object")))?;

    let prompt = required_string(task, raw, object, "question")?;
    let explanation = optional_string(object, "explanation").unwrap_or_default();

    let options = object
        .get("options")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed(task, raw, &format!("quiz {index} has no options")))?;

    let options: Vec<String> = options
        .iter()
        .map(|o| o.as_str().map(str::to_string))
        .collect::<Option<_>>()
        .ok_or_else(|| malformed(task, raw, &format!("quiz {index} has non-text options")))?;

    let options: [String; 4] = options.try_into().map_err(|v: Vec<String>| {
        malformed(
            task,
            raw,
            &format!("quiz {index} has {} options, expected 4", v.len()),
        )
    })?;

    let answer = object
        .get("answer")
        .or_else(|| object.get("correct"))
        .ok_or_else(|| malformed(task, raw, &format!("quiz {index} has no answer")))?;

    let correct_index = answer_index(answer)
        .ok_or_else(|| malformed(task, raw, &format!("quiz {index} answer {answer} is invalid")))?;

    PracticeQuestion::new(prompt, options, correct_index, explanation)
}

/// Accepts "A".."D" (optionally followed by punctuation) or an integer 0..=3
fn answer_index(answer: &Value) -> Option<u8> {
    match answer {
        Value::Number(n) => n.as_u64().filter(|i| *i < 4).map(|i| i as u8),
        Value::String(s) => {
            let letter = s.trim().chars().next()?.to_ascii_uppercase();
            match letter {
                'A'..='D' => Some(letter as u8 - b'A'),
                _ => None,
            }
        }
        _ => None,
    }
}

fn parse_object(task: TaskKind, raw: &str) -> Result<Map<String, Value>> {
    let body = strip_code_fence(raw);
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(malformed(task, raw, "top-level value is not an object")),
        Err(e) => Err(malformed(task, raw, &format!("invalid JSON: {e}"))),
    }
}

/// Models sometimes wrap JSON in a ```json fence despite the response MIME type
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn required_string(
    task: TaskKind,
    raw: &str,
    object: &Map<String, Value>,
    field: &str,
) -> Result<String> {
    object
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed(task, raw, &format!("missing string field `{field}`")))
}

fn optional_string(object: &Map<String, Value>, field: &str) -> Option<String> {
    object.get(field).and_then(Value::as_str).map(str::to_string)
}

fn malformed(task: TaskKind, raw: &str, reason: &str) -> TutorError {
    warn!(%task, reason, raw, "Rejected malformed model response");
    TutorError::MalformedResponse {
        task,
        reason: reason.to_string(),
    }
}
