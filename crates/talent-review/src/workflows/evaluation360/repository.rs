use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::consensus::SettledReview;
use super::domain::{CompetencyRating, Cycle, CycleId, CycleStatus, EmployeeId, Participant};

/// Storage abstraction for cycles, participants, ratings and review decisions.
///
/// Implementations own persistence and must serialize writers: `swap_cycle` is a
/// compare-and-swap on status and revision, ratings are unique per (cycle, subject,
/// rater, competency) with the last accepted write winning, and review decisions are
/// write-once per (cycle, subject, competency).
pub trait CycleRepository: Send + Sync {
    fn insert_cycle(&self, cycle: Cycle) -> Result<Cycle, RepositoryError>;
    fn fetch_cycle(&self, id: &CycleId) -> Result<Option<Cycle>, RepositoryError>;
    /// Persist `cycle` only if the stored status still equals `expected` and the stored
    /// revision still equals `cycle.revision`. The stored copy carries the next revision.
    fn swap_cycle(&self, expected: CycleStatus, cycle: Cycle) -> Result<Cycle, RepositoryError>;

    fn participants(&self, cycle_id: &CycleId) -> Result<Vec<Participant>, RepositoryError>;
    fn insert_participant(&self, participant: Participant)
        -> Result<Participant, RepositoryError>;
    fn update_participant(&self, participant: Participant) -> Result<(), RepositoryError>;

    /// Store ratings, replacing rows with the same key and bumping their version.
    ///
    /// The status check and the write happen under one lock: if the stored cycle is
    /// no longer in `expected`, nothing is written and `StatusConflict` is returned.
    fn record_ratings(
        &self,
        cycle_id: &CycleId,
        expected: CycleStatus,
        ratings: Vec<CompetencyRating>,
    ) -> Result<Vec<CompetencyRating>, RepositoryError>;
    fn ratings_for_subject(
        &self,
        cycle_id: &CycleId,
        subject_id: &EmployeeId,
    ) -> Result<Vec<CompetencyRating>, RepositoryError>;

    /// Store a review decision; `Conflict` if the competency was already settled.
    fn record_review(&self, review: SettledReview) -> Result<SettledReview, RepositoryError>;
    fn reviews_for_subject(
        &self,
        cycle_id: &CycleId,
        subject_id: &EmployeeId,
    ) -> Result<Vec<SettledReview>, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("cycle status changed concurrently (expected {expected}, found {actual})")]
    StatusConflict {
        expected: CycleStatus,
        actual: CycleStatus,
    },
    #[error("cycle was modified concurrently (expected revision {expected}, found {actual})")]
    StaleRevision { expected: u64, actual: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook for e-mail or inbox adapters.
pub trait ReviewNotifier: Send + Sync {
    fn publish(&self, alert: ReviewAlert) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewAlert {
    pub template: String,
    pub cycle_id: CycleId,
    pub subject_id: Option<EmployeeId>,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
