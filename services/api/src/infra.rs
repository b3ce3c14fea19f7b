use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError};
use talent_review::workflows::evaluation360::domain::RatingKey;
use talent_review::workflows::evaluation360::{
    CompetencyRating, CycleRepository, Cycle, CycleId, CycleStatus, EmployeeId,
    NotificationError, Participant, RepositoryError, ReviewAlert, ReviewNotifier, SettledReview,
};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn poisoned<T>(_: PoisonError<T>) -> RepositoryError {
    RepositoryError::Unavailable("in-memory store lock poisoned".to_string())
}

/// Process-local storage used by the API binary and the demo.
#[derive(Default, Clone)]
pub(crate) struct InMemoryCycleRepository {
    cycles: Arc<Mutex<HashMap<CycleId, Cycle>>>,
    participants: Arc<Mutex<Vec<Participant>>>,
    ratings: Arc<Mutex<BTreeMap<RatingKey, CompetencyRating>>>,
    reviews: Arc<Mutex<Vec<SettledReview>>>,
}

fn same_assignment(a: &Participant, b: &Participant) -> bool {
    a.cycle_id == b.cycle_id && a.employee_id == b.employee_id && a.participation == b.participation
}

impl CycleRepository for InMemoryCycleRepository {
    fn insert_cycle(&self, cycle: Cycle) -> Result<Cycle, RepositoryError> {
        let mut guard = self.cycles.lock().map_err(poisoned)?;
        if guard.contains_key(&cycle.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(cycle.id.clone(), cycle.clone());
        Ok(cycle)
    }

    fn fetch_cycle(&self, id: &CycleId) -> Result<Option<Cycle>, RepositoryError> {
        let guard = self.cycles.lock().map_err(poisoned)?;
        Ok(guard.get(id).cloned())
    }

    fn swap_cycle(&self, expected: CycleStatus, cycle: Cycle) -> Result<Cycle, RepositoryError> {
        let mut guard = self.cycles.lock().map_err(poisoned)?;
        let (actual, revision) = guard
            .get(&cycle.id)
            .map(|current| (current.status, current.revision))
            .ok_or(RepositoryError::NotFound)?;
        if actual != expected {
            return Err(RepositoryError::StatusConflict { expected, actual });
        }
        if revision != cycle.revision {
            return Err(RepositoryError::StaleRevision {
                expected: cycle.revision,
                actual: revision,
            });
        }
        let cycle = Cycle {
            revision: revision + 1,
            ..cycle
        };
        guard.insert(cycle.id.clone(), cycle.clone());
        Ok(cycle)
    }

    fn participants(&self, cycle_id: &CycleId) -> Result<Vec<Participant>, RepositoryError> {
        let guard = self.participants.lock().map_err(poisoned)?;
        Ok(guard
            .iter()
            .filter(|participant| &participant.cycle_id == cycle_id)
            .cloned()
            .collect())
    }

    fn insert_participant(&self, participant: Participant) -> Result<Participant, RepositoryError> {
        let mut guard = self.participants.lock().map_err(poisoned)?;
        if guard
            .iter()
            .any(|existing| same_assignment(existing, &participant))
        {
            return Err(RepositoryError::Conflict);
        }
        guard.push(participant.clone());
        Ok(participant)
    }

    fn update_participant(&self, participant: Participant) -> Result<(), RepositoryError> {
        let mut guard = self.participants.lock().map_err(poisoned)?;
        match guard
            .iter_mut()
            .find(|existing| same_assignment(existing, &participant))
        {
            Some(slot) => {
                *slot = participant;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn record_ratings(
        &self,
        cycle_id: &CycleId,
        expected: CycleStatus,
        ratings: Vec<CompetencyRating>,
    ) -> Result<Vec<CompetencyRating>, RepositoryError> {
        // Held across the write so a concurrent close cannot interleave.
        let cycles = self.cycles.lock().map_err(poisoned)?;
        let actual = cycles
            .get(cycle_id)
            .map(|current| current.status)
            .ok_or(RepositoryError::NotFound)?;
        if actual != expected {
            return Err(RepositoryError::StatusConflict { expected, actual });
        }
        let mut guard = self.ratings.lock().map_err(poisoned)?;
        Ok(ratings
            .into_iter()
            .map(|mut rating| {
                let key = rating.key();
                rating.version = guard.get(&key).map_or(1, |prior| prior.version + 1);
                guard.insert(key, rating.clone());
                rating
            })
            .collect())
    }

    fn ratings_for_subject(
        &self,
        cycle_id: &CycleId,
        subject_id: &EmployeeId,
    ) -> Result<Vec<CompetencyRating>, RepositoryError> {
        let guard = self.ratings.lock().map_err(poisoned)?;
        Ok(guard
            .values()
            .filter(|rating| &rating.cycle_id == cycle_id && &rating.subject_id == subject_id)
            .cloned()
            .collect())
    }

    fn record_review(&self, review: SettledReview) -> Result<SettledReview, RepositoryError> {
        let mut guard = self.reviews.lock().map_err(poisoned)?;
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
        let guard = self.reviews.lock().map_err(poisoned)?;
        Ok(guard
            .iter()
            .filter(|review| &review.cycle_id == cycle_id && &review.subject_id == subject_id)
            .cloned()
            .collect())
    }
}

/// Logs alerts and keeps them for inspection; stands in for the mail/notification worker.
#[derive(Default, Clone)]
pub(crate) struct InMemoryReviewNotifier {
    events: Arc<Mutex<Vec<ReviewAlert>>>,
}

impl ReviewNotifier for InMemoryReviewNotifier {
    fn publish(&self, alert: ReviewAlert) -> Result<(), NotificationError> {
        info!(
            template = %alert.template,
            cycle_id = %alert.cycle_id,
            "review alert queued"
        );
        let mut guard = self
            .events
            .lock()
            .map_err(|_| NotificationError::Transport("alert queue lock poisoned".to_string()))?;
        guard.push(alert);
        Ok(())
    }
}

impl InMemoryReviewNotifier {
    pub(crate) fn events(&self) -> Vec<ReviewAlert> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
