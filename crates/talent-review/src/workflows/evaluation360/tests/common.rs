use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::workflows::evaluation360::consensus::{ConsensusPolicy, SettledReview};
use crate::workflows::evaluation360::domain::{
    CompetencyId, CompetencyRating, Cycle, CycleDraft, CycleId, CycleKind, CycleStatus,
    EmployeeId, Participant, ParticipationRole, RaterRole, RatingEntry, RatingKey, RatingScale,
    RatingScore, RatingSubmission, RoleWeights, ScopedCompetency,
};
use crate::workflows::evaluation360::repository::{
    CycleRepository, NotificationError, RepositoryError, ReviewAlert, ReviewNotifier,
};
use crate::workflows::evaluation360::service::EvaluationCycleService;

pub(super) fn employee(id: &str) -> EmployeeId {
    EmployeeId(id.to_string())
}

pub(super) fn competency(id: &str) -> CompetencyId {
    CompetencyId(id.to_string())
}

pub(super) fn standard_weights() -> RoleWeights {
    RoleWeights::new(20.0, 40.0, 25.0, 15.0)
}

pub(super) fn scope() -> Vec<ScopedCompetency> {
    vec![
        ScopedCompetency {
            id: competency("communication"),
            name: "Communication".to_string(),
            required_level: Some(4.0),
        },
        ScopedCompetency {
            id: competency("leadership"),
            name: "Leadership".to_string(),
            required_level: Some(5.0),
        },
        ScopedCompetency {
            id: competency("delivery"),
            name: "Delivery".to_string(),
            required_level: None,
        },
    ]
}

pub(super) fn draft() -> CycleDraft {
    CycleDraft {
        name: "2025 Annual 360".to_string(),
        kind: CycleKind::Annual,
        starts_on: NaiveDate::from_ymd_opt(2025, 1, 6).expect("valid date"),
        ends_on: NaiveDate::from_ymd_opt(2025, 12, 19).expect("valid date"),
        evaluation_deadline: NaiveDate::from_ymd_opt(2025, 11, 28).expect("valid date"),
        weights: standard_weights(),
        rating_scale: None,
        competencies: scope(),
    }
}

pub(super) fn cycle(status: CycleStatus) -> Cycle {
    let draft = draft();
    Cycle {
        id: CycleId("cycle-test".to_string()),
        name: draft.name,
        kind: draft.kind,
        starts_on: draft.starts_on,
        ends_on: draft.ends_on,
        evaluation_deadline: draft.evaluation_deadline,
        weights: draft.weights,
        rating_scale: RatingScale::COMPETENCY,
        status,
        competencies: draft.competencies,
        activated_at: None,
        closed_at: None,
        archived_at: None,
        revision: 0,
    }
}

pub(super) fn rating(
    cycle: &Cycle,
    subject: &str,
    rater: &str,
    role: RaterRole,
    competency_id: &str,
    score: u8,
) -> CompetencyRating {
    CompetencyRating {
        cycle_id: cycle.id.clone(),
        subject_id: employee(subject),
        rater_id: employee(rater),
        role,
        competency_id: competency(competency_id),
        score: RatingScore::new(score, cycle.rating_scale).expect("score within scale"),
        comment: None,
        version: 1,
    }
}

/// Participants for subject `ana`: manager `bruno`, peers `carla` and `davi`.
pub(super) fn roster(cycle_id: &CycleId) -> Vec<Participant> {
    vec![
        Participant::evaluated(cycle_id.clone(), employee("ana")),
        Participant::rater(
            cycle_id.clone(),
            employee("bruno"),
            RaterRole::Manager,
            employee("ana"),
        ),
        Participant::rater(
            cycle_id.clone(),
            employee("carla"),
            RaterRole::Peer,
            employee("ana"),
        ),
        Participant::rater(
            cycle_id.clone(),
            employee("davi"),
            RaterRole::Peer,
            employee("ana"),
        ),
    ]
}

pub(super) fn submission(rater: &str, role: RaterRole, scores: &[(&str, u8)]) -> RatingSubmission {
    RatingSubmission {
        subject_id: employee("ana"),
        rater_id: employee(rater),
        role,
        ratings: scores
            .iter()
            .map(|(competency_id, score)| RatingEntry {
                competency_id: competency(competency_id),
                score: *score,
                comment: None,
            })
            .collect(),
    }
}

pub(super) fn full_scores(score: u8) -> Vec<(&'static str, u8)> {
    vec![
        ("communication", score),
        ("leadership", score),
        ("delivery", score),
    ]
}

pub(super) fn build_service() -> (
    EvaluationCycleService<MemoryRepository, MemoryNotifier>,
    Arc<MemoryRepository>,
    Arc<MemoryNotifier>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let service = EvaluationCycleService::new(
        repository.clone(),
        notifier.clone(),
        ConsensusPolicy::default(),
    );
    (service, repository, notifier)
}

/// Draft a cycle, enrol the standard roster and activate it.
pub(super) fn active_cycle(
    service: &EvaluationCycleService<MemoryRepository, MemoryNotifier>,
) -> Cycle {
    let cycle = service.create_cycle(draft()).expect("draft created");
    for participant in roster(&cycle.id) {
        service
            .add_participant(&cycle.id, participant.employee_id, participant.participation)
            .expect("participant enrolled");
    }
    service
        .transition(&cycle.id, CycleStatus::Active)
        .expect("cycle activates")
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    cycles: Arc<Mutex<HashMap<CycleId, Cycle>>>,
    participants: Arc<Mutex<Vec<Participant>>>,
    ratings: Arc<Mutex<BTreeMap<RatingKey, CompetencyRating>>>,
    reviews: Arc<Mutex<Vec<SettledReview>>>,
}

impl MemoryRepository {
    pub(super) fn participant(
        &self,
        employee_id: &EmployeeId,
        evaluated: bool,
    ) -> Option<Participant> {
        self.participants
            .lock()
            .expect("repository mutex poisoned")
            .iter()
            .find(|participant| {
                &participant.employee_id == employee_id && participant.is_evaluated() == evaluated
            })
            .cloned()
    }
}

impl CycleRepository for MemoryRepository {
    fn insert_cycle(&self, cycle: Cycle) -> Result<Cycle, RepositoryError> {
        let mut guard = self.cycles.lock().expect("repository mutex poisoned");
        if guard.contains_key(&cycle.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(cycle.id.clone(), cycle.clone());
        Ok(cycle)
    }

    fn fetch_cycle(&self, id: &CycleId) -> Result<Option<Cycle>, RepositoryError> {
        let guard = self.cycles.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn swap_cycle(&self, expected: CycleStatus, cycle: Cycle) -> Result<Cycle, RepositoryError> {
        let mut guard = self.cycles.lock().expect("repository mutex poisoned");
        let current = guard.get(&cycle.id).ok_or(RepositoryError::NotFound)?;
        if current.status != expected {
            return Err(RepositoryError::StatusConflict {
                expected,
                actual: current.status,
            });
        }
        if current.revision != cycle.revision {
            return Err(RepositoryError::StaleRevision {
                expected: cycle.revision,
                actual: current.revision,
            });
        }
        let mut cycle = cycle;
        cycle.revision += 1;
        guard.insert(cycle.id.clone(), cycle.clone());
        Ok(cycle)
    }

    fn participants(&self, cycle_id: &CycleId) -> Result<Vec<Participant>, RepositoryError> {
        let guard = self.participants.lock().expect("repository mutex poisoned");
        Ok(guard
            .iter()
            .filter(|participant| &participant.cycle_id == cycle_id)
            .cloned()
            .collect())
    }

    fn insert_participant(&self, participant: Participant) -> Result<Participant, RepositoryError> {
        let mut guard = self.participants.lock().expect("repository mutex poisoned");
        if guard.iter().any(|existing| same_assignment(existing, &participant)) {
            return Err(RepositoryError::Conflict);
        }
        guard.push(participant.clone());
        Ok(participant)
    }

    fn update_participant(&self, participant: Participant) -> Result<(), RepositoryError> {
        let mut guard = self.participants.lock().expect("repository mutex poisoned");
        let slot = guard
            .iter_mut()
            .find(|existing| same_assignment(existing, &participant))
            .ok_or(RepositoryError::NotFound)?;
        *slot = participant;
        Ok(())
    }

    fn record_ratings(
        &self,
        cycle_id: &CycleId,
        expected: CycleStatus,
        ratings: Vec<CompetencyRating>,
    ) -> Result<Vec<CompetencyRating>, RepositoryError> {
        let cycles = self.cycles.lock().expect("repository mutex poisoned");
        let actual = cycles.get(cycle_id).ok_or(RepositoryError::NotFound)?.status;
        if actual != expected {
            return Err(RepositoryError::StatusConflict { expected, actual });
        }
        let mut guard = self.ratings.lock().expect("repository mutex poisoned");
        let mut stored = Vec::with_capacity(ratings.len());
        for mut rating in ratings {
            let key = rating.key();
            rating.version = guard.get(&key).map(|prior| prior.version + 1).unwrap_or(1);
            guard.insert(key, rating.clone());
            stored.push(rating);
        }
        Ok(stored)
    }

    fn ratings_for_subject(
        &self,
        cycle_id: &CycleId,
        subject_id: &EmployeeId,
    ) -> Result<Vec<CompetencyRating>, RepositoryError> {
        let guard = self.ratings.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|rating| &rating.cycle_id == cycle_id && &rating.subject_id == subject_id)
            .cloned()
            .collect())
    }

    fn record_review(&self, review: SettledReview) -> Result<SettledReview, RepositoryError> {
        let mut guard = self.reviews.lock().expect("repository mutex poisoned");
        if guard.iter().any(|existing| {
            existing.cycle_id == review.cycle_id
                && existing.subject_id == review.subject_id
                && existing.competency_id == review.competency_id
        }) {
            return Err(RepositoryError::Conflict);
        }
        guard.push(review.clone());
        Ok(review)
    }

    fn reviews_for_subject(
        &self,
        cycle_id: &CycleId,
        subject_id: &EmployeeId,
    ) -> Result<Vec<SettledReview>, RepositoryError> {
        let guard = self.reviews.lock().expect("repository mutex poisoned");
        Ok(guard
            .iter()
            .filter(|review| &review.cycle_id == cycle_id && &review.subject_id == subject_id)
            .cloned()
            .collect())
    }
}

fn same_assignment(a: &Participant, b: &Participant) -> bool {
    a.cycle_id == b.cycle_id && a.employee_id == b.employee_id && a.participation == b.participation
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifier {
    events: Arc<Mutex<Vec<ReviewAlert>>>,
}

impl MemoryNotifier {
    pub(super) fn events(&self) -> Vec<ReviewAlert> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl ReviewNotifier for MemoryNotifier {
    fn publish(&self, alert: ReviewAlert) -> Result<(), NotificationError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(alert);
        Ok(())
    }
}

/// Counts delivery attempts and rejects every one of them.
#[derive(Default)]
pub(super) struct FailingNotifier {
    attempts: Mutex<usize>,
}

impl FailingNotifier {
    pub(super) fn attempts(&self) -> usize {
        *self.attempts.lock().expect("notifier mutex poisoned")
    }
}

impl ReviewNotifier for FailingNotifier {
    fn publish(&self, _alert: ReviewAlert) -> Result<(), NotificationError> {
        *self.attempts.lock().expect("notifier mutex poisoned") += 1;
        Err(NotificationError::Transport("smtp relay down".to_string()))
    }
}

/// Closes the stored cycle just before ratings are written, as a concurrent close would.
pub(super) struct CloseBeforeWrite {
    inner: MemoryRepository,
}

impl CloseBeforeWrite {
    pub(super) fn new(inner: MemoryRepository) -> Self {
        Self { inner }
    }
}

impl CycleRepository for CloseBeforeWrite {
    fn insert_cycle(&self, cycle: Cycle) -> Result<Cycle, RepositoryError> {
        self.inner.insert_cycle(cycle)
    }

    fn fetch_cycle(&self, id: &CycleId) -> Result<Option<Cycle>, RepositoryError> {
        self.inner.fetch_cycle(id)
    }

    fn swap_cycle(&self, expected: CycleStatus, cycle: Cycle) -> Result<Cycle, RepositoryError> {
        self.inner.swap_cycle(expected, cycle)
    }

    fn participants(&self, cycle_id: &CycleId) -> Result<Vec<Participant>, RepositoryError> {
        self.inner.participants(cycle_id)
    }

    fn insert_participant(&self, participant: Participant) -> Result<Participant, RepositoryError> {
        self.inner.insert_participant(participant)
    }

    fn update_participant(&self, participant: Participant) -> Result<(), RepositoryError> {
        self.inner.update_participant(participant)
    }

    fn record_ratings(
        &self,
        cycle_id: &CycleId,
        expected: CycleStatus,
        ratings: Vec<CompetencyRating>,
    ) -> Result<Vec<CompetencyRating>, RepositoryError> {
        let mut cycle = self
            .inner
            .fetch_cycle(cycle_id)?
            .ok_or(RepositoryError::NotFound)?;
        let status = cycle.status;
        cycle.status = CycleStatus::Closed;
        self.inner.swap_cycle(status, cycle)?;
        self.inner.record_ratings(cycle_id, expected, ratings)
    }

    fn ratings_for_subject(
        &self,
        cycle_id: &CycleId,
        subject_id: &EmployeeId,
    ) -> Result<Vec<CompetencyRating>, RepositoryError> {
        self.inner.ratings_for_subject(cycle_id, subject_id)
    }

    fn record_review(&self, review: SettledReview) -> Result<SettledReview, RepositoryError> {
        self.inner.record_review(review)
    }

    fn reviews_for_subject(
        &self,
        cycle_id: &CycleId,
        subject_id: &EmployeeId,
    ) -> Result<Vec<SettledReview>, RepositoryError> {
        self.inner.reviews_for_subject(cycle_id, subject_id)
    }
}

pub(super) struct UnavailableRepository;

impl CycleRepository for UnavailableRepository {
    fn insert_cycle(&self, _cycle: Cycle) -> Result<Cycle, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_cycle(&self, _id: &CycleId) -> Result<Option<Cycle>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn swap_cycle(&self, _expected: CycleStatus, _cycle: Cycle) -> Result<Cycle, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn participants(&self, _cycle_id: &CycleId) -> Result<Vec<Participant>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert_participant(&self, _participant: Participant) -> Result<Participant, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_participant(&self, _participant: Participant) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn record_ratings(
        &self,
        _cycle_id: &CycleId,
        _expected: CycleStatus,
        _ratings: Vec<CompetencyRating>,
    ) -> Result<Vec<CompetencyRating>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn ratings_for_subject(
        &self,
        _cycle_id: &CycleId,
        _subject_id: &EmployeeId,
    ) -> Result<Vec<CompetencyRating>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn record_review(&self, _review: SettledReview) -> Result<SettledReview, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn reviews_for_subject(
        &self,
        _cycle_id: &CycleId,
        _subject_id: &EmployeeId,
    ) -> Result<Vec<SettledReview>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn evaluated_participation() -> ParticipationRole {
    ParticipationRole::Evaluated
}
