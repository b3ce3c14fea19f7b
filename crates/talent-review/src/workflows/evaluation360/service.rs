use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::aggregation::{AggregatedScore, ScoreAggregator};
use super::consensus::{
    apply_review_decision, resolve_competency, ConsensusPolicy, ReviewDecision, SettledReview,
};
use super::cycle::{progress, submission_covers_scope, subject_is_complete, CycleProgress};
use super::domain::{
    CompetencyId, CompetencyRating, Cycle, CycleDraft, CycleId, CycleStatus, EmployeeId,
    Participant, ParticipationRole, RaterRole, RatingScale, RatingScore, RatingSubmission,
    RoleWeights, ScopedCompetency,
};
use super::error::EvaluationError;
use super::report::SubjectReport;
use super::repository::{CycleRepository, RepositoryError, ReviewAlert, ReviewNotifier};
use super::weights::resolve;

/// Facade composing the repository, notifier and the pure engine.
pub struct EvaluationCycleService<R, N> {
    repository: Arc<R>,
    notifier: Arc<N>,
    policy: ConsensusPolicy,
    default_scale: RatingScale,
}

static CYCLE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_cycle_id() -> CycleId {
    let id = CYCLE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    CycleId(format!("cycle-{id:06}"))
}

/// Outcome of an accepted rating submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    pub cycle_id: CycleId,
    pub subject_id: EmployeeId,
    pub rater_id: EmployeeId,
    pub stored: Vec<CompetencyRating>,
    pub rater_complete: bool,
    pub subject_complete: bool,
}

impl<R, N> EvaluationCycleService<R, N>
where
    R: CycleRepository + 'static,
    N: ReviewNotifier + 'static,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>, policy: ConsensusPolicy) -> Self {
        Self {
            repository,
            notifier,
            policy,
            default_scale: RatingScale::default(),
        }
    }

    pub fn with_default_scale(mut self, scale: RatingScale) -> Self {
        self.default_scale = scale;
        self
    }

    pub fn policy(&self) -> &ConsensusPolicy {
        &self.policy
    }

    /// Register a new cycle in `draft`.
    pub fn create_cycle(&self, draft: CycleDraft) -> Result<Cycle, CycleServiceError> {
        let scale = draft.rating_scale.unwrap_or(self.default_scale);
        RatingScale::new(scale.min, scale.max)?;
        resolve(&draft.weights)?;

        let cycle = Cycle {
            id: next_cycle_id(),
            name: draft.name,
            kind: draft.kind,
            starts_on: draft.starts_on,
            ends_on: draft.ends_on,
            evaluation_deadline: draft.evaluation_deadline,
            weights: draft.weights,
            rating_scale: scale,
            status: CycleStatus::Draft,
            competencies: draft.competencies,
            activated_at: None,
            closed_at: None,
            archived_at: None,
            revision: 0,
        };

        let stored = self.repository.insert_cycle(cycle)?;
        info!(cycle_id = %stored.id, kind = stored.kind.label(), "cycle drafted");
        Ok(stored)
    }

    pub fn get_cycle(&self, cycle_id: &CycleId) -> Result<Cycle, CycleServiceError> {
        let cycle = self
            .repository
            .fetch_cycle(cycle_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(cycle)
    }

    pub fn update_weights(
        &self,
        cycle_id: &CycleId,
        weights: RoleWeights,
    ) -> Result<Cycle, CycleServiceError> {
        let mut cycle = self.get_cycle(cycle_id)?;
        let expected = cycle.status;
        cycle.update_weights(weights)?;
        self.swap(expected, cycle, |actual| EvaluationError::WeightsFrozen {
            status: actual,
        })
    }

    pub fn set_competencies(
        &self,
        cycle_id: &CycleId,
        competencies: Vec<ScopedCompetency>,
    ) -> Result<Cycle, CycleServiceError> {
        let mut cycle = self.get_cycle(cycle_id)?;
        let expected = cycle.status;
        cycle.set_competencies(competencies)?;
        self.swap(expected, cycle, |actual| EvaluationError::ScopeFrozen {
            status: actual,
        })
    }

    pub fn add_participant(
        &self,
        cycle_id: &CycleId,
        employee_id: EmployeeId,
        participation: ParticipationRole,
    ) -> Result<Participant, CycleServiceError> {
        let cycle = self.get_cycle(cycle_id)?;
        if !cycle.accepts_enrollment() {
            return Err(EvaluationError::EnrollmentClosed {
                status: cycle.status,
            }
            .into());
        }

        if let ParticipationRole::Rater { role, subject } = &participation {
            if (&employee_id == subject) != (*role == RaterRole::SelfReview) {
                return Err(EvaluationError::SelfRatingMismatch {
                    rater_id: employee_id,
                    subject_id: subject.clone(),
                    role: *role,
                }
                .into());
            }
        }

        let participant = Participant {
            cycle_id: cycle.id,
            employee_id,
            participation,
            completed_at: None,
        };
        Ok(self.repository.insert_participant(participant)?)
    }

    /// Move a cycle to `target`, guarded by a compare-and-swap on the current status.
    pub fn transition(
        &self,
        cycle_id: &CycleId,
        target: CycleStatus,
    ) -> Result<Cycle, CycleServiceError> {
        let mut cycle = self.get_cycle(cycle_id)?;
        let participants = self.repository.participants(cycle_id)?;
        let from = cycle.status;

        cycle.transition_to(target, &participants, Utc::now())?;
        let stored = self.swap(from, cycle, |actual| EvaluationError::InvalidTransition {
            from: actual,
            to: target,
        })?;

        info!(
            cycle_id = %stored.id,
            from = from.label(),
            to = target.label(),
            "cycle transitioned"
        );
        if target == CycleStatus::Closed {
            let summary = progress(&stored, &participants);
            let mut details = BTreeMap::new();
            details.insert(
                "evaluated_complete".to_string(),
                format!("{}/{}", summary.evaluated_complete, summary.evaluated_total),
            );
            let alert = ReviewAlert {
                template: "cycle_closed".to_string(),
                cycle_id: stored.id.clone(),
                subject_id: None,
                details,
            };
            // The transition is already committed; a lost notice must not report failure.
            if let Err(err) = self.notifier.publish(alert) {
                warn!(cycle_id = %stored.id, error = %err, "cycle closure notice not delivered");
            }
        }

        Ok(stored)
    }

    /// Validate and store a rater's submission as a unit, then refresh completion flags.
    pub fn submit_ratings(
        &self,
        cycle_id: &CycleId,
        submission: RatingSubmission,
    ) -> Result<SubmissionReceipt, CycleServiceError> {
        let cycle = self.get_cycle(cycle_id)?;
        let mut participants = self.repository.participants(cycle_id)?;
        let ratings = validate_submission(&cycle, &participants, &submission)?;
        let aggregator = ScoreAggregator::for_cycle(&cycle)?;
        let prior = self
            .repository
            .ratings_for_subject(cycle_id, &submission.subject_id)?;
        let reviews = self
            .repository
            .reviews_for_subject(cycle_id, &submission.subject_id)?;

        let stored = match self.repository.record_ratings(cycle_id, cycle.status, ratings) {
            Ok(stored) => stored,
            Err(RepositoryError::StatusConflict { actual, .. }) => {
                return Err(EvaluationError::RatingsNotAccepted { status: actual }.into());
            }
            Err(other) => return Err(other.into()),
        };
        info!(
            cycle_id = %cycle.id,
            subject_id = %submission.subject_id,
            rater_id = %submission.rater_id,
            role = %submission.role,
            count = stored.len(),
            "rating submission accepted"
        );

        let all_ratings = self
            .repository
            .ratings_for_subject(cycle_id, &submission.subject_id)?;
        self.announce_divergence(
            &cycle,
            &submission.subject_id,
            &aggregator,
            &prior,
            &all_ratings,
            &reviews,
        );
        let now = Utc::now();

        let rater_complete = submission_covers_scope(
            &cycle,
            &submission.rater_id,
            &submission.subject_id,
            &all_ratings,
        );
        if rater_complete {
            if let Some(assignment) = participants.iter_mut().find(|participant| {
                participant.employee_id == submission.rater_id
                    && participant.rates(&submission.subject_id, submission.role)
            }) {
                if assignment.mark_complete(now) {
                    self.repository.update_participant(assignment.clone())?;
                }
            }
        }

        let subject_complete =
            subject_is_complete(&cycle, &submission.subject_id, &participants, &all_ratings)?;
        if subject_complete {
            if let Some(evaluated) = participants.iter_mut().find(|participant| {
                participant.employee_id == submission.subject_id && participant.is_evaluated()
            }) {
                if evaluated.mark_complete(now) {
                    info!(
                        cycle_id = %cycle.id,
                        subject_id = %submission.subject_id,
                        "subject evaluation complete"
                    );
                    self.repository.update_participant(evaluated.clone())?;
                }
            }
        }

        Ok(SubmissionReceipt {
            cycle_id: cycle.id,
            subject_id: submission.subject_id,
            rater_id: submission.rater_id,
            stored,
            rater_complete,
            subject_complete,
        })
    }

    pub fn progress(&self, cycle_id: &CycleId) -> Result<CycleProgress, CycleServiceError> {
        let cycle = self.get_cycle(cycle_id)?;
        let participants = self.repository.participants(cycle_id)?;
        Ok(progress(&cycle, &participants))
    }

    /// Full-precision scores for one subject, as consumed by calibration.
    pub fn aggregated_score(
        &self,
        cycle_id: &CycleId,
        subject_id: &EmployeeId,
    ) -> Result<AggregatedScore, CycleServiceError> {
        let cycle = self.get_cycle(cycle_id)?;
        if !cycle.allows_aggregation() {
            return Err(EvaluationError::AggregationUnavailable {
                status: cycle.status,
            }
            .into());
        }
        let ratings = self.repository.ratings_for_subject(cycle_id, subject_id)?;
        Ok(ScoreAggregator::for_cycle(&cycle)?.aggregate(subject_id, &ratings))
    }

    /// Aggregate, analyse gaps and reconcile consensus for one subject.
    pub fn subject_report(
        &self,
        cycle_id: &CycleId,
        subject_id: &EmployeeId,
    ) -> Result<SubjectReport, CycleServiceError> {
        let cycle = self.get_cycle(cycle_id)?;
        if !cycle.allows_aggregation() {
            return Err(EvaluationError::AggregationUnavailable {
                status: cycle.status,
            }
            .into());
        }

        let participants = self.repository.participants(cycle_id)?;
        let ratings = self.repository.ratings_for_subject(cycle_id, subject_id)?;
        let reviews = self.repository.reviews_for_subject(cycle_id, subject_id)?;
        let aggregated = ScoreAggregator::for_cycle(&cycle)?.aggregate(subject_id, &ratings);
        let complete = subject_is_complete(&cycle, subject_id, &participants, &ratings)?;
        Ok(SubjectReport::build(
            &cycle,
            &aggregated,
            &self.policy,
            &reviews,
            complete,
        ))
    }

    /// Settle a divergent competency with an explicit human decision. Each
    /// competency is settled at most once.
    pub fn decide_review(
        &self,
        cycle_id: &CycleId,
        subject_id: &EmployeeId,
        competency_id: &CompetencyId,
        decision: &ReviewDecision,
    ) -> Result<SettledReview, CycleServiceError> {
        let cycle = self.get_cycle(cycle_id)?;
        if !cycle.allows_aggregation() {
            return Err(EvaluationError::AggregationUnavailable {
                status: cycle.status,
            }
            .into());
        }

        let ratings = self.repository.ratings_for_subject(cycle_id, subject_id)?;
        let aggregated = ScoreAggregator::for_cycle(&cycle)?.aggregate(subject_id, &ratings);
        let score = aggregated
            .competency(competency_id)
            .ok_or_else(|| EvaluationError::UnknownCompetency(competency_id.clone()))?;
        apply_review_decision(
            &resolve_competency(score, &self.policy),
            decision,
            cycle.rating_scale,
        )?;

        let review = SettledReview {
            cycle_id: cycle.id.clone(),
            subject_id: subject_id.clone(),
            competency_id: competency_id.clone(),
            decision: decision.clone(),
        };
        let stored = match self.repository.record_review(review) {
            Ok(stored) => stored,
            Err(RepositoryError::Conflict) => {
                return Err(EvaluationError::ReviewAlreadySettled {
                    subject_id: subject_id.clone(),
                    competency_id: competency_id.clone(),
                }
                .into());
            }
            Err(other) => return Err(other.into()),
        };
        info!(
            cycle_id = %cycle.id,
            subject_id = %subject_id,
            competency_id = %competency_id,
            decided_by = %decision.decided_by,
            final_score = decision.final_score,
            "review decision recorded"
        );
        Ok(stored)
    }

    /// Alert on competencies that entered review with this submission. Divergence that
    /// already existed, or that a decision settled, is not announced again.
    fn announce_divergence(
        &self,
        cycle: &Cycle,
        subject_id: &EmployeeId,
        aggregator: &ScoreAggregator,
        before: &[CompetencyRating],
        after: &[CompetencyRating],
        reviews: &[SettledReview],
    ) {
        let previously = divergent(&aggregator.aggregate(subject_id, before), &self.policy);
        let flagged: Vec<CompetencyId> =
            divergent(&aggregator.aggregate(subject_id, after), &self.policy)
                .into_iter()
                .filter(|id| !previously.contains(id))
                .filter(|id| !reviews.iter().any(|review| &review.competency_id == id))
                .collect();
        if flagged.is_empty() {
            return;
        }

        warn!(
            cycle_id = %cycle.id,
            subject_id = %subject_id,
            competencies = flagged.len(),
            "self and manager scores diverge; human review required"
        );
        let mut details = BTreeMap::new();
        details.insert(
            "competencies".to_string(),
            flagged
                .iter()
                .map(|id| id.0.as_str())
                .collect::<Vec<_>>()
                .join(","),
        );
        let alert = ReviewAlert {
            template: "consensus_review_required".to_string(),
            cycle_id: cycle.id.clone(),
            subject_id: Some(subject_id.clone()),
            details,
        };
        if let Err(err) = self.notifier.publish(alert) {
            warn!(
                cycle_id = %cycle.id,
                subject_id = %subject_id,
                error = %err,
                "review alert not delivered"
            );
        }
    }

    fn swap(
        &self,
        expected: CycleStatus,
        cycle: Cycle,
        on_conflict: impl FnOnce(CycleStatus) -> EvaluationError,
    ) -> Result<Cycle, CycleServiceError> {
        match self.repository.swap_cycle(expected, cycle) {
            Ok(stored) => Ok(stored),
            Err(RepositoryError::StatusConflict { actual, .. }) => {
                Err(CycleServiceError::Evaluation(on_conflict(actual)))
            }
            Err(other) => Err(other.into()),
        }
    }
}

fn divergent(aggregated: &AggregatedScore, policy: &ConsensusPolicy) -> BTreeSet<CompetencyId> {
    aggregated
        .competencies
        .iter()
        .filter(|score| resolve_competency(score, policy).requires_review())
        .map(|score| score.competency_id.clone())
        .collect()
}

fn validate_submission(
    cycle: &Cycle,
    participants: &[Participant],
    submission: &RatingSubmission,
) -> Result<Vec<CompetencyRating>, EvaluationError> {
    if !cycle.accepts_ratings() {
        return Err(EvaluationError::RatingsNotAccepted {
            status: cycle.status,
        });
    }

    let RatingSubmission {
        subject_id,
        rater_id,
        role,
        ratings,
    } = submission;

    if (rater_id == subject_id) != (*role == RaterRole::SelfReview) {
        return Err(EvaluationError::SelfRatingMismatch {
            rater_id: rater_id.clone(),
            subject_id: subject_id.clone(),
            role: *role,
        });
    }

    let assigned = participants.iter().any(|participant| {
        if &participant.employee_id != rater_id {
            return false;
        }
        match role {
            RaterRole::SelfReview => participant.is_evaluated(),
            other => participant.rates(subject_id, *other),
        }
    });
    if !assigned {
        return Err(EvaluationError::UnassignedRater {
            rater_id: rater_id.clone(),
            subject_id: subject_id.clone(),
            role: *role,
        });
    }

    let mut by_competency = BTreeMap::new();
    for entry in ratings {
        if cycle.competency(&entry.competency_id).is_none() {
            return Err(EvaluationError::UnknownCompetency(
                entry.competency_id.clone(),
            ));
        }
        let score = RatingScore::new(entry.score, cycle.rating_scale)?;
        by_competency.insert(
            entry.competency_id.clone(),
            CompetencyRating {
                cycle_id: cycle.id.clone(),
                subject_id: subject_id.clone(),
                rater_id: rater_id.clone(),
                role: *role,
                competency_id: entry.competency_id.clone(),
                score,
                comment: entry.comment.clone(),
                version: 1,
            },
        );
    }

    Ok(by_competency.into_values().collect())
}

/// Error raised by the cycle service.
#[derive(Debug, thiserror::Error)]
pub enum CycleServiceError {
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
