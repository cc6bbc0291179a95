//! Instruction templates for every task
//!
//! Each template spells out the exact output contract (field names, value
//! types, difficulty levels) that `analysis::parse` validates against.

use crate::analysis::{Subject, TaskKind};

/// Language answers are written in unless configured otherwise
pub const DEFAULT_RESPONSE_LANGUAGE: &str = "Vietnamese";

const QUICK_ANSWER_PROMPT: &str = r#"You are an expert at solving exam problems fast.
TASK: Return JSON {"finalAnswer": "...", "casioSteps": "...", "audioSummary": "..."}.
- finalAnswer: only the final answer, written in LaTeX.
- casioSteps: the shortest Casio fx-580VN X keystroke sequence that reaches the answer. If no calculator is needed, write exactly "No calculator needed".
- audioSummary: at most two short sentences to be read aloud, without complex formulas."#;

const DETAILED_GUIDE_PROMPT: &str = r#"You are a professor explaining a solution.
TASK: Solve the problem in detail, one rigorous logical step at a time.
REQUIREMENTS: Scientific language, LaTeX for every formula, Markdown headings for the steps. No greetings."#;

const PRACTICE_QUIZ_PROMPT: &str = r#"You are an expert exam author.
TASK: Write exactly 2 multiple-choice questions similar to the problem, in the style of the national high-school graduation exam.
- Question 1: comprehension level (easy).
- Question 2: application level (hard).
Each question has exactly 4 options.
Return JSON: {"quizzes": [{"question": "...", "options": ["A. ...", "B. ...", "C. ...", "D. ..."], "answer": "A", "explanation": "..."}]}
"answer" is the letter (A, B, C or D) of the correct option."#;

/// Prompt used before speech synthesis
pub const SUMMARY_PROMPT: &str =
    "Summarize the following result as one very short sentence to be read aloud. Do not read complex formulas:";

/// Lookup of the fixed template for each task
pub struct PromptCatalog;

impl PromptCatalog {
    /// Template for `task`
    pub fn lookup(task: TaskKind) -> &'static str {
        match task {
            TaskKind::QuickAnswer => QUICK_ANSWER_PROMPT,
            TaskKind::DetailedGuide => DETAILED_GUIDE_PROMPT,
            TaskKind::PracticeQuiz => PRACTICE_QUIZ_PROMPT,
        }
    }
}

/// Full instruction text sent with a task call
pub fn build_task_prompt(
    subject: Subject,
    task: TaskKind,
    problem_text: &str,
    language: &str,
) -> String {
    format!(
        "Subject: {}. Task: {}. Respond in {}. Problem: {}",
        subject.display_name(),
        PromptCatalog::lookup(task),
        language,
        problem_text
    )
}

/// Instruction text for summarize-and-speak
pub fn build_summary_prompt(content: &str) -> String {
    format!("{SUMMARY_PROMPT} {content}")
}
