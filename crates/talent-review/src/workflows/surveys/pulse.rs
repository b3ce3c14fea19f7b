use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::SurveyError;
use crate::workflows::evaluation360::aggregation::{round_to_tenth, MeanAccumulator};
use crate::workflows::evaluation360::domain::{EmployeeId, RatingScale, RatingScore};

/// Answers at or above this value count as favorable.
pub const FAVORABLE_FROM: u8 = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseQuestion {
    pub id: String,
    pub prompt: String,
}

/// One respondent's answers keyed by question id. Skipped questions are absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseResponse {
    pub respondent_id: EmployeeId,
    pub answers: BTreeMap<String, u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: String,
    pub answered: usize,
    pub average: Option<f64>,
    /// Percentage of answers >= 4, one decimal.
    pub favorable_pct: Option<f64>,
    pub missing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseSummary {
    pub respondents: usize,
    pub questions: Vec<QuestionResult>,
    pub overall: Option<f64>,
}

#[derive(Default)]
struct QuestionTally {
    mean: MeanAccumulator,
    favorable: usize,
}

pub fn summarize_pulse(
    questions: &[PulseQuestion],
    responses: &[PulseResponse],
) -> Result<PulseSummary, SurveyError> {
    if questions.is_empty() {
        return Err(SurveyError::NoQuestions);
    }

    let mut tallies: BTreeMap<&str, QuestionTally> = questions
        .iter()
        .map(|question| (question.id.as_str(), QuestionTally::default()))
        .collect();

    for response in responses {
        for (question_id, value) in &response.answers {
            let tally = tallies
                .get_mut(question_id.as_str())
                .ok_or_else(|| SurveyError::UnknownQuestion(question_id.clone()))?;
            let score = RatingScore::new(*value, RatingScale::COMPETENCY)?;
            tally.mean.push(score.as_f64());
            if score.value() >= FAVORABLE_FROM {
                tally.favorable += 1;
            }
        }
    }

    let mut overall = MeanAccumulator::default();
    let results: Vec<QuestionResult> = questions
        .iter()
        .map(|question| {
            let tally = &tallies[question.id.as_str()];
            let answered = tally.mean.count();
            let average = tally.mean.mean();
            if let Some(value) = average {
                overall.push(value);
            } else {
                debug!(question_id = %question.id, "pulse question received no answers");
            }
            QuestionResult {
                question_id: question.id.clone(),
                answered,
                average: average.map(round_to_tenth),
                favorable_pct: (answered > 0)
                    .then(|| round_to_tenth(tally.favorable as f64 / answered as f64 * 100.0)),
                missing: answered == 0,
            }
        })
        .collect();

    Ok(PulseSummary {
        respondents: responses.len(),
        questions: results,
        overall: overall.mean().map(round_to_tenth),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str) -> PulseQuestion {
        PulseQuestion {
            id: id.to_string(),
            prompt: format!("How do you rate {id}?"),
        }
    }

    fn answers(id: &str, pairs: &[(&str, u8)]) -> PulseResponse {
        PulseResponse {
            respondent_id: EmployeeId(id.to_string()),
            answers: pairs
                .iter()
                .map(|(question, value)| (question.to_string(), *value))
                .collect(),
        }
    }

    #[test]
    fn unanswered_questions_are_missing_not_zero() {
        let questions = vec![question("workload"), question("recognition")];
        let responses = vec![
            answers("a", &[("workload", 4)]),
            answers("b", &[("workload", 2)]),
        ];

        let summary = summarize_pulse(&questions, &responses).expect("valid survey");

        assert_eq!(summary.respondents, 2);
        assert_eq!(summary.questions[0].average, Some(3.0));
        assert_eq!(summary.questions[0].favorable_pct, Some(50.0));
        assert!(summary.questions[1].missing);
        assert_eq!(summary.questions[1].average, None);
        assert_eq!(summary.overall, Some(3.0));
    }

    #[test]
    fn rejects_unknown_question_and_out_of_scale_answer() {
        let questions = vec![question("workload")];

        match summarize_pulse(&questions, &[answers("a", &[("salary", 3)])]) {
            Err(SurveyError::UnknownQuestion(id)) => assert_eq!(id, "salary"),
            other => panic!("expected unknown question, got {other:?}"),
        }
        assert!(matches!(
            summarize_pulse(&questions, &[answers("a", &[("workload", 0)])]),
            Err(SurveyError::Rating(_))
        ));
    }

    #[test]
    fn requires_questions() {
        assert_eq!(summarize_pulse(&[], &[]), Err(SurveyError::NoQuestions));
    }
}
