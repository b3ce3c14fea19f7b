use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::aggregation::round_to_tenth;
use super::domain::{
    CompetencyRating, Cycle, CycleId, CycleStatus, EmployeeId, Participant, ParticipationRole,
    RaterRole, RoleWeights, ScopedCompetency,
};
use super::error::EvaluationError;
use super::weights::{resolve, resolve_weights};

/// Reject anything but the single forward step from `from`.
pub fn check_transition(from: CycleStatus, to: CycleStatus) -> Result<(), EvaluationError> {
    if from.successor() == Some(to) {
        Ok(())
    } else {
        Err(EvaluationError::InvalidTransition { from, to })
    }
}

impl Cycle {
    /// Apply a status change. Every precondition is checked before any field changes.
    pub fn transition_to(
        &mut self,
        target: CycleStatus,
        participants: &[Participant],
        now: DateTime<Utc>,
    ) -> Result<(), EvaluationError> {
        check_transition(self.status, target)?;

        match target {
            CycleStatus::Active => {
                resolve_weights(self)?;
                if self.competencies.is_empty() {
                    return Err(EvaluationError::MissingCompetencyScope);
                }
                let has_evaluated = participants
                    .iter()
                    .any(|participant| participant.cycle_id == self.id && participant.is_evaluated());
                if !has_evaluated {
                    return Err(EvaluationError::NoEvaluatedParticipants);
                }
                self.activated_at = Some(now);
            }
            CycleStatus::Closed => self.closed_at = Some(now),
            CycleStatus::Archived => self.archived_at = Some(now),
            CycleStatus::Draft => {}
        }

        self.status = target;
        Ok(())
    }

    pub fn activate(
        &mut self,
        participants: &[Participant],
        now: DateTime<Utc>,
    ) -> Result<(), EvaluationError> {
        self.transition_to(CycleStatus::Active, participants, now)
    }

    pub fn close(&mut self, now: DateTime<Utc>) -> Result<(), EvaluationError> {
        self.transition_to(CycleStatus::Closed, &[], now)
    }

    pub fn archive(&mut self, now: DateTime<Utc>) -> Result<(), EvaluationError> {
        self.transition_to(CycleStatus::Archived, &[], now)
    }

    /// Replace the weight configuration. Only drafts are editable.
    pub fn update_weights(&mut self, weights: RoleWeights) -> Result<(), EvaluationError> {
        if self.status != CycleStatus::Draft {
            return Err(EvaluationError::WeightsFrozen {
                status: self.status,
            });
        }
        resolve(&weights)?;
        self.weights = weights;
        Ok(())
    }

    pub fn set_competencies(
        &mut self,
        competencies: Vec<ScopedCompetency>,
    ) -> Result<(), EvaluationError> {
        if self.status != CycleStatus::Draft {
            return Err(EvaluationError::ScopeFrozen {
                status: self.status,
            });
        }
        if competencies.is_empty() {
            return Err(EvaluationError::MissingCompetencyScope);
        }
        self.competencies = competencies;
        Ok(())
    }

    pub fn accepts_enrollment(&self) -> bool {
        matches!(self.status, CycleStatus::Draft | CycleStatus::Active)
    }

    pub fn allows_aggregation(&self) -> bool {
        self.status != CycleStatus::Draft
    }
}

/// Roles whose ratings a subject needs before the evaluated record completes.
///
/// A role with positive weight is expected when someone holds that assignment for the
/// subject; self is expected whenever its weight is positive.
pub fn expected_roles(
    cycle: &Cycle,
    subject_id: &EmployeeId,
    participants: &[Participant],
) -> Result<Vec<RaterRole>, EvaluationError> {
    let weights = resolve_weights(cycle)?;
    Ok(weights
        .contributing_roles()
        .filter(|role| {
            *role == RaterRole::SelfReview
                || participants
                    .iter()
                    .any(|participant| participant.rates(subject_id, *role))
        })
        .collect())
}

/// True when every competency in scope has a rating from every expected role.
pub fn subject_is_complete(
    cycle: &Cycle,
    subject_id: &EmployeeId,
    participants: &[Participant],
    ratings: &[CompetencyRating],
) -> Result<bool, EvaluationError> {
    let roles = expected_roles(cycle, subject_id, participants)?;
    let rated: BTreeSet<(RaterRole, &str)> = ratings
        .iter()
        .filter(|rating| rating.cycle_id == cycle.id && &rating.subject_id == subject_id)
        .map(|rating| (rating.role, rating.competency_id.0.as_str()))
        .collect();

    Ok(cycle.competency_ids().all(|competency| {
        roles
            .iter()
            .all(|role| rated.contains(&(*role, competency.0.as_str())))
    }))
}

/// True when `rater_id` has rated `subject_id` on every competency in scope.
pub fn submission_covers_scope(
    cycle: &Cycle,
    rater_id: &EmployeeId,
    subject_id: &EmployeeId,
    ratings: &[CompetencyRating],
) -> bool {
    let rated: BTreeSet<&str> = ratings
        .iter()
        .filter(|rating| {
            rating.cycle_id == cycle.id
                && &rating.rater_id == rater_id
                && &rating.subject_id == subject_id
        })
        .map(|rating| rating.competency_id.0.as_str())
        .collect();

    cycle
        .competency_ids()
        .all(|competency| rated.contains(competency.0.as_str()))
}

/// Completion snapshot across a cycle's assignments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleProgress {
    pub cycle_id: CycleId,
    pub status: CycleStatus,
    pub evaluated_total: usize,
    pub evaluated_complete: usize,
    pub assignments_total: usize,
    pub assignments_complete: usize,
    /// Share of evaluated subjects complete, one decimal. `None` without subjects.
    pub completion_pct: Option<f64>,
    pub pending_subjects: Vec<EmployeeId>,
}

pub fn progress(cycle: &Cycle, participants: &[Participant]) -> CycleProgress {
    let mut evaluated_total = 0;
    let mut evaluated_complete = 0;
    let mut assignments_total = 0;
    let mut assignments_complete = 0;
    let mut pending_subjects = Vec::new();

    for participant in participants.iter().filter(|p| p.cycle_id == cycle.id) {
        match &participant.participation {
            ParticipationRole::Evaluated => {
                evaluated_total += 1;
                if participant.is_complete() {
                    evaluated_complete += 1;
                } else {
                    pending_subjects.push(participant.employee_id.clone());
                }
            }
            ParticipationRole::Rater { .. } => {
                assignments_total += 1;
                if participant.is_complete() {
                    assignments_complete += 1;
                }
            }
        }
    }

    let completion_pct = if evaluated_total == 0 {
        None
    } else {
        Some(round_to_tenth(
            evaluated_complete as f64 / evaluated_total as f64 * 100.0,
        ))
    };

    CycleProgress {
        cycle_id: cycle.id.clone(),
        status: cycle.status,
        evaluated_total,
        evaluated_complete,
        assignments_total,
        assignments_complete,
        completion_pct,
        pending_subjects,
    }
}
