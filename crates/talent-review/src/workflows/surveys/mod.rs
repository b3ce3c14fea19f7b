//! Survey scoring that shares the averaging and missing-marker rules of the
//! 360 engine: an unanswered question is reported as missing, never as zero.

pub mod nps;
pub mod pulse;

use crate::workflows::evaluation360::EvaluationError;

pub use nps::{summarize_nps, summarize_nps_by, NpsCategory, NpsResponse, NpsSummary};
pub use pulse::{summarize_pulse, PulseQuestion, PulseResponse, PulseSummary, QuestionResult};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SurveyError {
    #[error(transparent)]
    Rating(#[from] EvaluationError),
    #[error("answer references unknown question {0}")]
    UnknownQuestion(String),
    #[error("pulse survey must define at least one question")]
    NoQuestions,
}
