use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::error::EvaluationError;

/// Identifier wrapper for evaluation cycles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CycleId(pub String);

/// Identifier wrapper for employees (subjects and raters alike).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmployeeId(pub String);

/// Identifier wrapper for competencies in a cycle's scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompetencyId(pub String);

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CompetencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed set of rater perspectives feeding a 360 evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaterRole {
    #[serde(rename = "self")]
    SelfReview,
    Manager,
    Peer,
    Subordinate,
}

impl RaterRole {
    pub const fn ordered() -> [Self; 4] {
        [Self::SelfReview, Self::Manager, Self::Peer, Self::Subordinate]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::SelfReview => "self",
            Self::Manager => "manager",
            Self::Peer => "peer",
            Self::Subordinate => "subordinate",
        }
    }
}

impl fmt::Display for RaterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RaterRole {
    type Err = EvaluationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "self" => Ok(Self::SelfReview),
            "manager" => Ok(Self::Manager),
            "peer" => Ok(Self::Peer),
            "subordinate" => Ok(Self::Subordinate),
            other => Err(EvaluationError::UnknownRole(other.to_string())),
        }
    }
}

/// Inclusive integer bounds for a rating instrument (1-5 for competencies, 0-10 for NPS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingScale {
    pub min: u8,
    pub max: u8,
}

impl RatingScale {
    pub const COMPETENCY: Self = Self { min: 1, max: 5 };
    pub const NPS: Self = Self { min: 0, max: 10 };

    pub fn new(min: u8, max: u8) -> Result<Self, EvaluationError> {
        if min >= max {
            return Err(EvaluationError::InvalidRatingScale { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= f64::from(self.min) && value <= f64::from(self.max)
    }
}

impl Default for RatingScale {
    fn default() -> Self {
        Self::COMPETENCY
    }
}

/// A rating value already checked against its scale.
///
/// Only [`RatingScore::new`] builds one, so there is no `Deserialize` impl:
///
/// ```compile_fail
/// use talent_review::workflows::evaluation360::RatingScore;
///
/// let _: RatingScore = serde_json::from_str("200").unwrap();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RatingScore(u8);

impl RatingScore {
    pub fn new(value: u8, scale: RatingScale) -> Result<Self, EvaluationError> {
        if value < scale.min || value > scale.max {
            return Err(EvaluationError::RatingOutOfRange {
                value,
                min: scale.min,
                max: scale.max,
            });
        }
        Ok(Self(value))
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0)
    }
}

/// Per-role percentages as configured on a cycle. Validated by the weight resolver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoleWeights {
    #[serde(rename = "self")]
    pub self_review: f64,
    pub manager: f64,
    pub peer: f64,
    pub subordinate: f64,
}

impl RoleWeights {
    pub const fn new(self_review: f64, manager: f64, peer: f64, subordinate: f64) -> Self {
        Self {
            self_review,
            manager,
            peer,
            subordinate,
        }
    }

    pub fn weight_for(&self, role: RaterRole) -> f64 {
        match role {
            RaterRole::SelfReview => self.self_review,
            RaterRole::Manager => self.manager,
            RaterRole::Peer => self.peer,
            RaterRole::Subordinate => self.subordinate,
        }
    }

    pub fn total(&self) -> f64 {
        RaterRole::ordered()
            .iter()
            .map(|role| self.weight_for(*role))
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleKind {
    Annual,
    Semiannual,
    Quarterly,
}

impl CycleKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Annual => "annual",
            Self::Semiannual => "semiannual",
            Self::Quarterly => "quarterly",
        }
    }
}

/// Lifecycle status of a cycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Draft,
    Active,
    Closed,
    Archived,
}

impl CycleStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Archived => "archived",
        }
    }

    /// The single legal successor, if any.
    pub const fn successor(self) -> Option<Self> {
        match self {
            Self::Draft => Some(Self::Active),
            Self::Active => Some(Self::Closed),
            Self::Closed => Some(Self::Archived),
            Self::Archived => None,
        }
    }
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Competency selected for a cycle, in configured display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopedCompetency {
    pub id: CompetencyId,
    pub name: String,
    #[serde(default)]
    pub required_level: Option<f64>,
}

/// Evaluation period together with its weighting policy and scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    pub id: CycleId,
    pub name: String,
    pub kind: CycleKind,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub evaluation_deadline: NaiveDate,
    pub weights: RoleWeights,
    #[serde(default)]
    pub rating_scale: RatingScale,
    pub status: CycleStatus,
    pub competencies: Vec<ScopedCompetency>,
    #[serde(default)]
    pub activated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
    /// Bumped by the repository on every stored write.
    #[serde(default)]
    pub revision: u64,
}

impl Cycle {
    pub fn competency(&self, id: &CompetencyId) -> Option<&ScopedCompetency> {
        self.competencies.iter().find(|competency| &competency.id == id)
    }

    pub fn competency_ids(&self) -> impl Iterator<Item = &CompetencyId> {
        self.competencies.iter().map(|competency| &competency.id)
    }

    pub fn accepts_ratings(&self) -> bool {
        self.status == CycleStatus::Active
    }
}

/// How an employee takes part in a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ParticipationRole {
    Evaluated,
    Rater {
        role: RaterRole,
        subject: EmployeeId,
    },
}

/// A (cycle, employee) assignment with its one-way completion flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub cycle_id: CycleId,
    pub employee_id: EmployeeId,
    pub participation: ParticipationRole,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Participant {
    pub fn evaluated(cycle_id: CycleId, employee_id: EmployeeId) -> Self {
        Self {
            cycle_id,
            employee_id,
            participation: ParticipationRole::Evaluated,
            completed_at: None,
        }
    }

    pub fn rater(
        cycle_id: CycleId,
        employee_id: EmployeeId,
        role: RaterRole,
        subject: EmployeeId,
    ) -> Self {
        Self {
            cycle_id,
            employee_id,
            participation: ParticipationRole::Rater { role, subject },
            completed_at: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Flips the completion flag once. Returns `true` only on the first call.
    pub fn mark_complete(&mut self, now: DateTime<Utc>) -> bool {
        if self.completed_at.is_some() {
            return false;
        }
        self.completed_at = Some(now);
        true
    }

    pub fn is_evaluated(&self) -> bool {
        matches!(self.participation, ParticipationRole::Evaluated)
    }

    pub fn rates(&self, subject: &EmployeeId, role: RaterRole) -> bool {
        matches!(
            &self.participation,
            ParticipationRole::Rater { role: assigned, subject: assigned_subject }
                if *assigned == role && assigned_subject == subject
        )
    }
}

/// One stored rating keyed by (cycle, subject, rater, competency).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetencyRating {
    pub cycle_id: CycleId,
    pub subject_id: EmployeeId,
    pub rater_id: EmployeeId,
    pub role: RaterRole,
    pub competency_id: CompetencyId,
    pub score: RatingScore,
    pub comment: Option<String>,
    pub version: u32,
}

impl CompetencyRating {
    pub fn key(&self) -> RatingKey {
        RatingKey {
            cycle_id: self.cycle_id.clone(),
            subject_id: self.subject_id.clone(),
            rater_id: self.rater_id.clone(),
            competency_id: self.competency_id.clone(),
        }
    }
}

/// Uniqueness key enforced by rating storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RatingKey {
    pub cycle_id: CycleId,
    pub subject_id: EmployeeId,
    pub rater_id: EmployeeId,
    pub competency_id: CompetencyId,
}

/// Raw entry inside a rater's submission, before scale validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingEntry {
    pub competency_id: CompetencyId,
    pub score: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

/// A rater's full submission for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSubmission {
    pub subject_id: EmployeeId,
    pub rater_id: EmployeeId,
    pub role: RaterRole,
    pub ratings: Vec<RatingEntry>,
}

/// Draft cycle definition supplied by an administrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleDraft {
    pub name: String,
    pub kind: CycleKind,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub evaluation_deadline: NaiveDate,
    pub weights: RoleWeights,
    #[serde(default)]
    pub rating_scale: Option<RatingScale>,
    #[serde(default)]
    pub competencies: Vec<ScopedCompetency>,
}
