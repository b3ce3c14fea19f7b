use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::SurveyError;
use crate::workflows::evaluation360::aggregation::{round_to_tenth, MeanAccumulator};
use crate::workflows::evaluation360::domain::{EmployeeId, RatingScale, RatingScore};

/// 0-6 detractor, 7-8 passive, 9-10 promoter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NpsCategory {
    Detractor,
    Passive,
    Promoter,
}

impl NpsCategory {
    pub const fn classify(score: RatingScore) -> Self {
        match score.value() {
            0..=6 => Self::Detractor,
            7 | 8 => Self::Passive,
            _ => Self::Promoter,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Detractor => "detractor",
            Self::Passive => "passive",
            Self::Promoter => "promoter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpsResponse {
    pub respondent_id: EmployeeId,
    pub score: u8,
    #[serde(default)]
    pub department: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpsSummary {
    pub responses: usize,
    pub promoters: usize,
    pub passives: usize,
    pub detractors: usize,
    /// Whole number in -100..=100. `None` without responses.
    pub score: Option<i32>,
    pub average: Option<f64>,
}

impl NpsSummary {
    pub fn from_scores<I>(scores: I) -> Self
    where
        I: IntoIterator<Item = RatingScore>,
    {
        let mut promoters = 0;
        let mut passives = 0;
        let mut detractors = 0;
        let mut mean = MeanAccumulator::default();

        for score in scores {
            mean.push(score.as_f64());
            match NpsCategory::classify(score) {
                NpsCategory::Promoter => promoters += 1,
                NpsCategory::Passive => passives += 1,
                NpsCategory::Detractor => detractors += 1,
            }
        }

        let responses = mean.count();
        let score = (responses > 0).then(|| {
            let net = promoters as f64 - detractors as f64;
            (net / responses as f64 * 100.0).round() as i32
        });

        Self {
            responses,
            promoters,
            passives,
            detractors,
            score,
            average: mean.mean().map(round_to_tenth),
        }
    }
}

fn validated(response: &NpsResponse) -> Result<RatingScore, SurveyError> {
    Ok(RatingScore::new(response.score, RatingScale::NPS)?)
}

/// Validate every response against the 0-10 scale, then summarize.
pub fn summarize_nps(responses: &[NpsResponse]) -> Result<NpsSummary, SurveyError> {
    let scores = responses
        .iter()
        .map(validated)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(NpsSummary::from_scores(scores))
}

/// Summaries grouped by a caller-supplied key such as department.
pub fn summarize_nps_by<K, F>(
    responses: &[NpsResponse],
    group: F,
) -> Result<BTreeMap<K, NpsSummary>, SurveyError>
where
    K: Ord,
    F: Fn(&NpsResponse) -> K,
{
    let mut grouped: BTreeMap<K, Vec<RatingScore>> = BTreeMap::new();
    for response in responses {
        let score = validated(response)?;
        grouped.entry(group(response)).or_default().push(score);
    }

    Ok(grouped
        .into_iter()
        .map(|(key, scores)| (key, NpsSummary::from_scores(scores)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::evaluation360::EvaluationError;

    fn response(id: &str, score: u8, department: &str) -> NpsResponse {
        NpsResponse {
            respondent_id: EmployeeId(id.to_string()),
            score,
            department: Some(department.to_string()),
        }
    }

    #[test]
    fn classifies_boundaries() {
        let at = |value| NpsCategory::classify(RatingScore::new(value, RatingScale::NPS).unwrap());
        assert_eq!(at(0), NpsCategory::Detractor);
        assert_eq!(at(6), NpsCategory::Detractor);
        assert_eq!(at(7), NpsCategory::Passive);
        assert_eq!(at(8), NpsCategory::Passive);
        assert_eq!(at(9), NpsCategory::Promoter);
        assert_eq!(at(10), NpsCategory::Promoter);
    }

    #[test]
    fn computes_net_score_and_average() {
        let responses = vec![
            response("a", 10, "ops"),
            response("b", 9, "ops"),
            response("c", 8, "ops"),
            response("d", 3, "sales"),
        ];

        let summary = summarize_nps(&responses).expect("valid responses");

        assert_eq!(summary.responses, 4);
        assert_eq!(summary.promoters, 2);
        assert_eq!(summary.passives, 1);
        assert_eq!(summary.detractors, 1);
        assert_eq!(summary.score, Some(25));
        assert_eq!(summary.average, Some(7.5));
    }

    #[test]
    fn empty_survey_has_no_score() {
        let summary = summarize_nps(&[]).expect("empty is valid");
        assert_eq!(summary.responses, 0);
        assert_eq!(summary.score, None);
        assert_eq!(summary.average, None);
    }

    #[test]
    fn groups_by_department() {
        let responses = vec![
            response("a", 10, "ops"),
            response("b", 2, "sales"),
            response("c", 9, "ops"),
        ];

        let grouped = summarize_nps_by(&responses, |r| r.department.clone().unwrap_or_default())
            .expect("valid responses");

        assert_eq!(grouped["ops"].score, Some(100));
        assert_eq!(grouped["sales"].score, Some(-100));
    }

    #[test]
    fn rejects_scores_above_ten() {
        match summarize_nps(&[response("a", 11, "ops")]) {
            Err(SurveyError::Rating(EvaluationError::RatingOutOfRange { value: 11, .. })) => {}
            other => panic!("expected out of range, got {other:?}"),
        }
    }
}
