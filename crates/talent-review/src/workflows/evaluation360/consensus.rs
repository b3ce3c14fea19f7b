use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::aggregation::CompetencyScore;
use super::domain::{CompetencyId, CycleId, EmployeeId, RatingScale, RaterRole};
use super::error::EvaluationError;

pub const DEFAULT_DIVERGENCE_THRESHOLD: f64 = 1.5;

/// Reconciliation policy between self and manager scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsensusPolicy {
    pub divergence_threshold: f64,
}

impl Default for ConsensusPolicy {
    fn default() -> Self {
        Self {
            divergence_threshold: DEFAULT_DIVERGENCE_THRESHOLD,
        }
    }
}

/// Final score, or the reason no automatic score exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ConsensusOutcome {
    Final {
        score: f64,
    },
    /// Self and manager diverge beyond the threshold; a person must decide.
    RequiresReview {
        self_score: f64,
        manager_score: f64,
        divergence: f64,
    },
    ManagerMissing,
}

impl ConsensusOutcome {
    pub fn final_score(&self) -> Option<f64> {
        match self {
            Self::Final { score } => Some(*score),
            _ => None,
        }
    }

    pub fn requires_review(&self) -> bool {
        matches!(self, Self::RequiresReview { .. })
    }
}

/// Manager authority wins unless |self - manager| exceeds the threshold.
pub fn resolve_consensus(
    self_score: f64,
    manager_score: f64,
    policy: &ConsensusPolicy,
) -> ConsensusOutcome {
    let divergence = (self_score - manager_score).abs();
    if divergence > policy.divergence_threshold {
        ConsensusOutcome::RequiresReview {
            self_score,
            manager_score,
            divergence,
        }
    } else {
        ConsensusOutcome::Final {
            score: manager_score,
        }
    }
}

/// Resolve when either side may be absent. Self is informative only, so a missing
/// self score leaves the manager score final.
pub fn resolve_optional(
    self_score: Option<f64>,
    manager_score: Option<f64>,
    policy: &ConsensusPolicy,
) -> ConsensusOutcome {
    match (self_score, manager_score) {
        (_, None) => ConsensusOutcome::ManagerMissing,
        (None, Some(manager_score)) => ConsensusOutcome::Final {
            score: manager_score,
        },
        (Some(self_score), Some(manager_score)) => {
            resolve_consensus(self_score, manager_score, policy)
        }
    }
}

/// Consensus for one aggregated competency from its self and manager bucket averages.
pub fn resolve_competency(score: &CompetencyScore, policy: &ConsensusPolicy) -> ConsensusOutcome {
    let average = |role| score.bucket(role).and_then(|bucket| bucket.average);
    resolve_optional(
        average(RaterRole::SelfReview),
        average(RaterRole::Manager),
        policy,
    )
}

/// Human decision closing out a `RequiresReview` outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub final_score: f64,
    pub decided_by: EmployeeId,
    pub decided_at: DateTime<Utc>,
    #[serde(default)]
    pub note: Option<String>,
}

pub fn apply_review_decision(
    outcome: &ConsensusOutcome,
    decision: &ReviewDecision,
    scale: RatingScale,
) -> Result<f64, EvaluationError> {
    if !outcome.requires_review() {
        return Err(EvaluationError::InvalidReviewDecision(
            "outcome does not require review".to_string(),
        ));
    }
    if !scale.contains(decision.final_score) {
        return Err(EvaluationError::InvalidReviewDecision(format!(
            "score {} outside scale {}..={}",
            decision.final_score, scale.min, scale.max
        )));
    }
    Ok(decision.final_score)
}

/// A review decision as stored against (cycle, subject, competency).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettledReview {
    pub cycle_id: CycleId,
    pub subject_id: EmployeeId,
    pub competency_id: CompetencyId,
    pub decision: ReviewDecision,
}
