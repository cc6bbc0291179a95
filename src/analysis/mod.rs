pub mod fallback;
pub mod parse;
pub mod types;

pub use fallback::placeholder_result;
pub use parse::{parse_quick_answer, parse_quiz};
pub use types::{
    AnalysisResult, ImageInput, PracticeQuestion, ProblemInput, QuickAnswer, ResponseFormat,
    ResultSource, SolveReport, SolveRequest, Subject, TaskKind, TaskOutcome,
};
