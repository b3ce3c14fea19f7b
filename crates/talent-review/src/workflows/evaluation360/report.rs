use std::collections::BTreeMap;

use serde::Serialize;

use super::aggregation::{round_to_tenth, AggregatedScore, CompetencyScore};
use super::consensus::{
    resolve_competency, ConsensusOutcome, ConsensusPolicy, ReviewDecision, SettledReview,
};
use super::domain::{CompetencyId, Cycle, CycleId, CycleStatus, EmployeeId, RaterRole};
use super::gaps::{compute_gaps, unassessed_competencies, Gap, GapBand};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketView {
    pub role: RaterRole,
    pub rater_count: usize,
    pub average: Option<f64>,
    pub missing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetencyRow {
    pub competency_id: CompetencyId,
    pub name: String,
    pub buckets: Vec<BucketView>,
    pub applied_weights: BTreeMap<RaterRole, f64>,
    pub composite: Option<f64>,
    pub consensus: ConsensusOutcome,
    /// Decision that settled a divergent consensus, if one was recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewDecision>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapView {
    pub competency_id: CompetencyId,
    pub current_level: f64,
    pub required_level: f64,
    pub gap_size: f64,
    pub band: GapBand,
    pub band_label: &'static str,
}

impl From<&Gap> for GapView {
    fn from(gap: &Gap) -> Self {
        Self {
            competency_id: gap.competency_id.clone(),
            current_level: round_to_tenth(gap.current_level),
            required_level: gap.required_level,
            gap_size: round_to_tenth(gap.gap_size),
            band: gap.band,
            band_label: gap.band.label(),
        }
    }
}

/// Result object handed to UI, export and reporting callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectReport {
    pub cycle_id: CycleId,
    pub subject_id: EmployeeId,
    pub cycle_status: CycleStatus,
    pub subject_complete: bool,
    pub competencies: Vec<CompetencyRow>,
    pub skipped: Vec<CompetencyId>,
    pub overall: Option<f64>,
    pub gaps: Vec<GapView>,
    pub unassessed: Vec<CompetencyId>,
    pub requires_review: bool,
}

impl SubjectReport {
    /// Divergent competencies with a matching entry in `reviews` report the decided
    /// score as final.
    pub fn build(
        cycle: &Cycle,
        aggregated: &AggregatedScore,
        policy: &ConsensusPolicy,
        reviews: &[SettledReview],
        subject_complete: bool,
    ) -> Self {
        let required_levels = required_levels(cycle);
        let gaps = compute_gaps(aggregated, &required_levels);

        let competencies: Vec<CompetencyRow> = aggregated
            .competencies
            .iter()
            .map(|score| {
                let review = reviews.iter().find(|review| {
                    review.subject_id == aggregated.subject_id
                        && review.competency_id == score.competency_id
                });
                competency_row(cycle, score, policy, review)
            })
            .collect();
        let requires_review = competencies
            .iter()
            .any(|row| row.consensus.requires_review());

        Self {
            cycle_id: aggregated.cycle_id.clone(),
            subject_id: aggregated.subject_id.clone(),
            cycle_status: cycle.status,
            subject_complete,
            competencies,
            skipped: aggregated.skipped.clone(),
            overall: aggregated.reported_overall(),
            gaps: gaps.iter().map(GapView::from).collect(),
            unassessed: unassessed_competencies(aggregated, &required_levels),
            requires_review,
        }
    }

    pub fn review_competencies(&self) -> Vec<CompetencyId> {
        self.competencies
            .iter()
            .filter(|row| row.consensus.requires_review())
            .map(|row| row.competency_id.clone())
            .collect()
    }
}

pub fn required_levels(cycle: &Cycle) -> BTreeMap<CompetencyId, f64> {
    cycle
        .competencies
        .iter()
        .filter_map(|competency| {
            competency
                .required_level
                .map(|level| (competency.id.clone(), level))
        })
        .collect()
}

fn competency_row(
    cycle: &Cycle,
    score: &CompetencyScore,
    policy: &ConsensusPolicy,
    review: Option<&SettledReview>,
) -> CompetencyRow {
    let mut consensus = resolve_competency(score, policy);
    let review = match review {
        Some(settled) if consensus.requires_review() => {
            consensus = ConsensusOutcome::Final {
                score: settled.decision.final_score,
            };
            Some(settled.decision.clone())
        }
        _ => None,
    };

    CompetencyRow {
        competency_id: score.competency_id.clone(),
        name: cycle
            .competency(&score.competency_id)
            .map(|competency| competency.name.clone())
            .unwrap_or_default(),
        buckets: score
            .buckets
            .iter()
            .map(|bucket| BucketView {
                role: bucket.role,
                rater_count: bucket.rater_count,
                average: bucket.average.map(round_to_tenth),
                missing: bucket.is_missing(),
            })
            .collect(),
        applied_weights: score
            .applied_weights
            .iter()
            .map(|(role, weight)| (*role, (weight * 100.0).round() / 100.0))
            .collect(),
        composite: score.composite.map(round_to_tenth),
        consensus: rounded(consensus),
        review,
    }
}

fn rounded(outcome: ConsensusOutcome) -> ConsensusOutcome {
    match outcome {
        ConsensusOutcome::Final { score } => ConsensusOutcome::Final {
            score: round_to_tenth(score),
        },
        ConsensusOutcome::RequiresReview {
            self_score,
            manager_score,
            divergence,
        } => ConsensusOutcome::RequiresReview {
            self_score: round_to_tenth(self_score),
            manager_score: round_to_tenth(manager_score),
            divergence: round_to_tenth(divergence),
        },
        ConsensusOutcome::ManagerMissing => ConsensusOutcome::ManagerMissing,
    }
}
