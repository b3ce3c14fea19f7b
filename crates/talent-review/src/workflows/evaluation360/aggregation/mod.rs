mod buckets;
mod composite;

pub use buckets::{BucketScore, MeanAccumulator};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::domain::{CompetencyId, CompetencyRating, Cycle, CycleId, EmployeeId, RaterRole, RoleWeights};
use super::error::EvaluationError;
use super::weights::{resolve, ResolvedWeights};
use buckets::{bucket_scores, collect_buckets};
use composite::weighted_composite;

/// Round a full-precision score to the single decimal used in outputs.
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Per-competency result: role buckets, applied (renormalized) weights and composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyScore {
    pub competency_id: CompetencyId,
    pub buckets: Vec<BucketScore>,
    /// Percentages actually used after excluding missing buckets. Empty when skipped.
    pub applied_weights: BTreeMap<RaterRole, f64>,
    pub composite: Option<f64>,
}

impl CompetencyScore {
    pub fn bucket(&self, role: RaterRole) -> Option<&BucketScore> {
        self.buckets.iter().find(|bucket| bucket.role == role)
    }

    pub fn is_skipped(&self) -> bool {
        self.composite.is_none()
    }
}

/// Derived scores for one subject in one cycle. Recomputed on demand, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedScore {
    pub cycle_id: CycleId,
    pub subject_id: EmployeeId,
    /// Competencies in configured display order.
    pub competencies: Vec<CompetencyScore>,
    pub skipped: Vec<CompetencyId>,
    pub overall: Option<f64>,
}

impl AggregatedScore {
    pub fn competency(&self, id: &CompetencyId) -> Option<&CompetencyScore> {
        self.competencies
            .iter()
            .find(|score| &score.competency_id == id)
    }

    /// Full-precision composite for a competency, or the typed reason it is absent.
    pub fn composite_for(&self, id: &CompetencyId) -> Result<f64, EvaluationError> {
        match self.competency(id) {
            Some(CompetencyScore {
                composite: Some(value),
                ..
            }) => Ok(*value),
            Some(_) => Err(EvaluationError::NoRatingsAvailable {
                subject_id: self.subject_id.clone(),
                competency_id: id.clone(),
            }),
            None => Err(EvaluationError::UnknownCompetency(id.clone())),
        }
    }

    pub fn reported_overall(&self) -> Option<f64> {
        self.overall.map(round_to_tenth)
    }
}

/// Stateless aggregator bound to a cycle's validated weights and competency scope.
pub struct ScoreAggregator {
    cycle_id: CycleId,
    weights: ResolvedWeights,
    scope: Vec<CompetencyId>,
}

impl ScoreAggregator {
    pub fn for_cycle(cycle: &Cycle) -> Result<Self, EvaluationError> {
        Self::new(cycle, &cycle.weights)
    }

    pub fn new(cycle: &Cycle, weights: &RoleWeights) -> Result<Self, EvaluationError> {
        if cycle.competencies.is_empty() {
            return Err(EvaluationError::MissingCompetencyScope);
        }

        Ok(Self {
            cycle_id: cycle.id.clone(),
            weights: resolve(weights)?,
            scope: cycle.competency_ids().cloned().collect(),
        })
    }

    pub fn weights(&self) -> &ResolvedWeights {
        &self.weights
    }

    /// Aggregate the unfiltered rating rows for `subject_id`.
    ///
    /// Rows for other cycles, other subjects or out-of-scope competencies are ignored.
    pub fn aggregate(&self, subject_id: &EmployeeId, ratings: &[CompetencyRating]) -> AggregatedScore {
        let relevant = ratings.iter().filter(|rating| {
            if rating.cycle_id != self.cycle_id || &rating.subject_id != subject_id {
                return false;
            }
            if !self.scope.contains(&rating.competency_id) {
                debug!(
                    competency_id = %rating.competency_id,
                    "ignoring rating for competency outside cycle scope"
                );
                return false;
            }
            let is_self = rating.rater_id == rating.subject_id;
            if is_self != (rating.role == RaterRole::SelfReview) {
                warn!(
                    rater_id = %rating.rater_id,
                    subject_id = %rating.subject_id,
                    role = %rating.role,
                    "ignoring rating whose rater/subject pairing contradicts its role"
                );
                return false;
            }
            true
        });

        let collected = collect_buckets(relevant);
        let mut competencies = Vec::with_capacity(self.scope.len());
        let mut skipped = Vec::new();
        let mut composite_sum = 0.0;
        let mut composite_count = 0usize;

        for competency_id in &self.scope {
            let buckets = bucket_scores(collected.get(competency_id));
            let score = match weighted_composite(&buckets, &self.weights) {
                Some(composite) => {
                    composite_sum += composite.value;
                    composite_count += 1;
                    CompetencyScore {
                        competency_id: competency_id.clone(),
                        buckets,
                        applied_weights: composite.applied_weights,
                        composite: Some(composite.value),
                    }
                }
                None => {
                    debug!(
                        cycle_id = %self.cycle_id,
                        subject_id = %subject_id,
                        competency_id = %competency_id,
                        "no weighted ratings available; competency skipped"
                    );
                    skipped.push(competency_id.clone());
                    CompetencyScore {
                        competency_id: competency_id.clone(),
                        buckets,
                        applied_weights: BTreeMap::new(),
                        composite: None,
                    }
                }
            };
            competencies.push(score);
        }

        let overall = if composite_count == 0 {
            None
        } else {
            Some(composite_sum / composite_count as f64)
        };

        AggregatedScore {
            cycle_id: self.cycle_id.clone(),
            subject_id: subject_id.clone(),
            competencies,
            skipped,
            overall,
        }
    }
}

/// One-shot aggregation; re-validates `weights` before computing.
pub fn aggregate(
    subject_id: &EmployeeId,
    cycle: &Cycle,
    ratings: &[CompetencyRating],
    weights: &RoleWeights,
) -> Result<AggregatedScore, EvaluationError> {
    let aggregator = ScoreAggregator::new(cycle, weights)?;
    Ok(aggregator.aggregate(subject_id, ratings))
}
