use serde::{Deserialize, Serialize};

use super::CalibrationError;
use crate::workflows::evaluation360::aggregation::{round_to_tenth, AggregatedScore};
use crate::workflows::evaluation360::domain::{CycleId, EmployeeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    const fn index(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }
}

/// Cut-offs turning an overall composite into a performance level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceThresholds {
    medium_from: f64,
    high_from: f64,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            medium_from: 3.0,
            high_from: 4.0,
        }
    }
}

impl PerformanceThresholds {
    pub fn new(medium_from: f64, high_from: f64) -> Result<Self, CalibrationError> {
        if !medium_from.is_finite() || !high_from.is_finite() || medium_from >= high_from {
            return Err(CalibrationError::InvalidThresholds {
                medium_from,
                high_from,
            });
        }
        Ok(Self {
            medium_from,
            high_from,
        })
    }

    pub fn level_for(&self, composite: f64) -> Level {
        if composite >= self.high_from {
            Level::High
        } else if composite >= self.medium_from {
            Level::Medium
        } else {
            Level::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NineBoxPosition {
    pub performance: Level,
    pub potential: Level,
}

impl NineBoxPosition {
    pub const fn new(performance: Level, potential: Level) -> Self {
        Self {
            performance,
            potential,
        }
    }

    pub fn box_key(&self) -> String {
        format!(
            "{}_performance_{}_potential",
            self.performance.label(),
            self.potential.label()
        )
    }

    /// 1 for low/low up to 9 for high/high, potential varying fastest.
    pub const fn box_number(&self) -> u8 {
        self.performance.index() * 3 + self.potential.index() + 1
    }

    pub const fn label(&self) -> &'static str {
        match (self.performance, self.potential) {
            (Level::Low, Level::Low) => "Underperformer",
            (Level::Low, Level::Medium) => "Inconsistent performer",
            (Level::Low, Level::High) => "Rough diamond",
            (Level::Medium, Level::Low) => "Effective contributor",
            (Level::Medium, Level::Medium) => "Core player",
            (Level::Medium, Level::High) => "Emerging talent",
            (Level::High, Level::Low) => "Trusted professional",
            (Level::High, Level::Medium) => "High performer",
            (Level::High, Level::High) => "Star",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub cycle_id: CycleId,
    pub employee_id: EmployeeId,
    pub overall: f64,
    pub position: NineBoxPosition,
    pub box_key: String,
    pub box_number: u8,
    pub label: &'static str,
}

/// Place a subject using the full-precision overall composite.
pub fn place(
    aggregated: &AggregatedScore,
    potential: Level,
    thresholds: &PerformanceThresholds,
) -> Result<Placement, CalibrationError> {
    let overall = aggregated
        .overall
        .ok_or_else(|| CalibrationError::Unscored {
            subject_id: aggregated.subject_id.clone(),
        })?;
    let position = NineBoxPosition::new(thresholds.level_for(overall), potential);

    Ok(Placement {
        cycle_id: aggregated.cycle_id.clone(),
        employee_id: aggregated.subject_id.clone(),
        overall: round_to_tenth(overall),
        box_key: position.box_key(),
        box_number: position.box_number(),
        label: position.label(),
        position,
    })
}
