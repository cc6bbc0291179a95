//! Locally generated placeholder shown when live results are unavailable

use crate::analysis::types::{AnalysisResult, PracticeQuestion, ResultSource};

/// Label prefixed to every placeholder text so it is never mistaken for a live answer
pub const FALLBACK_LABEL: &str = "[Offline example]";

/// Build the placeholder result illustrating the expected shape.
pub fn placeholder_result(reason: impl Into<String>) -> AnalysisResult {
    AnalysisResult {
        quick_answer: format!("{FALLBACK_LABEL} Answer: **x = 5**."),
        calculator_steps: format!("{FALLBACK_LABEL} [MODE] [5] [3] then enter the coefficients."),
        detailed_guide: format!(
            "### {FALLBACK_LABEL} Detailed solution\n\
             Step 1: Move the constant to the right-hand side: $2x = 14 - 4$.\n\n\
             Step 2: Divide both sides by 2: $x = 5$."
        ),
        practice_questions: placeholder_questions(),
        audio_summary: "The answer is x equals 5. Just divide 10 by 2.".to_string(),
        source: ResultSource::Fallback {
            reason: reason.into(),
        },
    }
}

fn placeholder_questions() -> Vec<PracticeQuestion> {
    vec![
        PracticeQuestion {
            prompt: format!("{FALLBACK_LABEL} Question 1 (easy): if 2x = 10, what is x?"),
            options: ["2", "5", "8", "10"].map(String::from),
            correct_index: 1,
            explanation: "x = 10 / 2 = 5".to_string(),
        },
        PracticeQuestion {
            prompt: format!("{FALLBACK_LABEL} Question 2 (hard): find x given 2x + 4 = 14"),
            options: ["3", "5", "7", "9"].map(String::from),
            correct_index: 1,
            explanation: "2x = 10, so x = 5".to_string(),
        },
    ]
}
