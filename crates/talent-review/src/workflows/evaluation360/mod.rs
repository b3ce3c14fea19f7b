//! Multi-rater (360) evaluation engine.
//!
//! Ratings from self, manager, peer and subordinate raters are averaged per role,
//! combined with the cycle's weights (renormalized over the roles that actually rated),
//! compared against required levels and reconciled between self and manager. The
//! computational parts are pure; [`service::EvaluationCycleService`] wires them to the
//! storage and notification collaborators.

pub mod aggregation;
pub mod consensus;
pub mod cycle;
pub mod domain;
pub mod error;
pub mod gaps;
pub mod import;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;
pub mod weights;

#[cfg(test)]
mod tests;

pub use aggregation::{aggregate, AggregatedScore, BucketScore, CompetencyScore, ScoreAggregator};
pub use consensus::{
    resolve_consensus, ConsensusOutcome, ConsensusPolicy, ReviewDecision, SettledReview,
};
pub use cycle::{check_transition, CycleProgress};
pub use domain::{
    CompetencyId, CompetencyRating, Cycle, CycleDraft, CycleId, CycleKind, CycleStatus,
    EmployeeId, Participant, ParticipationRole, RaterRole, RatingEntry, RatingScale, RatingScore,
    RatingSubmission, RoleWeights, ScopedCompetency,
};
pub use error::EvaluationError;
pub use gaps::{compute_gaps, Gap, GapBand};
pub use import::{RatingCsvImporter, RatingImportError};
pub use report::SubjectReport;
pub use repository::{
    CycleRepository, NotificationError, RepositoryError, ReviewAlert, ReviewNotifier,
};
pub use router::cycle_router;
pub use service::{CycleServiceError, EvaluationCycleService, SubmissionReceipt};
pub use weights::{resolve_weights, ResolvedWeights};
