use super::domain::{CompetencyId, CycleStatus, EmployeeId, RaterRole};

/// Typed failures surfaced by the evaluation engine so callers can render specific states.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("invalid weight configuration: {reason}")]
    InvalidWeightConfiguration { reason: String },

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: CycleStatus, to: CycleStatus },

    #[error("no ratings available for competency {competency_id} of subject {subject_id}")]
    NoRatingsAvailable {
        subject_id: EmployeeId,
        competency_id: CompetencyId,
    },

    #[error("rating {value} outside scale {min}..={max}")]
    RatingOutOfRange { value: u8, min: u8, max: u8 },

    #[error("rating scale minimum {min} must be below maximum {max}")]
    InvalidRatingScale { min: u8, max: u8 },

    #[error("rater {rater_id} cannot rate subject {subject_id} as {role}")]
    SelfRatingMismatch {
        rater_id: EmployeeId,
        subject_id: EmployeeId,
        role: RaterRole,
    },

    #[error("cycle is {status}; ratings are only accepted while active")]
    RatingsNotAccepted { status: CycleStatus },

    #[error("weights are frozen once a cycle leaves draft (current status {status})")]
    WeightsFrozen { status: CycleStatus },

    #[error("competency scope is frozen once a cycle leaves draft (current status {status})")]
    ScopeFrozen { status: CycleStatus },

    #[error("participants cannot be added while cycle is {status}")]
    EnrollmentClosed { status: CycleStatus },

    #[error("cycle has no competencies in scope")]
    MissingCompetencyScope,

    #[error("cycle has no evaluated participants")]
    NoEvaluatedParticipants,

    #[error("competency {0} is not in the cycle scope")]
    UnknownCompetency(CompetencyId),

    #[error("{rater_id} holds no {role} assignment for subject {subject_id}")]
    UnassignedRater {
        rater_id: EmployeeId,
        subject_id: EmployeeId,
        role: RaterRole,
    },

    #[error("unknown rater role '{0}'")]
    UnknownRole(String),

    #[error("aggregation unavailable while cycle is {status}")]
    AggregationUnavailable { status: CycleStatus },

    #[error("review decision rejected: {0}")]
    InvalidReviewDecision(String),

    #[error("competency {competency_id} of subject {subject_id} already has a review decision")]
    ReviewAlreadySettled {
        subject_id: EmployeeId,
        competency_id: CompetencyId,
    },
}
