use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::aggregation::AggregatedScore;
use super::domain::CompetencyId;

/// Severity band used to pick remediation templates downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapBand {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl GapBand {
    /// Lower bounds are inclusive: 3 is critical, 2 is high, 1 is medium.
    pub fn classify(gap_size: f64) -> Self {
        if gap_size >= 3.0 {
            Self::Critical
        } else if gap_size >= 2.0 {
            Self::High
        } else if gap_size >= 1.0 {
            Self::Medium
        } else if gap_size > 0.0 {
            Self::Low
        } else {
            Self::None
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub competency_id: CompetencyId,
    pub current_level: f64,
    pub required_level: f64,
    pub gap_size: f64,
    pub band: GapBand,
}

/// Compare composites against required levels.
///
/// Competencies without a required level, without a composite, or already at the
/// required level are left out. The result is ordered by descending gap; ties keep
/// the configured competency order of `aggregated`.
pub fn compute_gaps(
    aggregated: &AggregatedScore,
    required_levels: &BTreeMap<CompetencyId, f64>,
) -> Vec<Gap> {
    let mut gaps: Vec<Gap> = aggregated
        .competencies
        .iter()
        .filter_map(|score| {
            let required_level = *required_levels.get(&score.competency_id)?;
            let current_level = score.composite?;
            let gap_size = (required_level - current_level).max(0.0);
            if gap_size <= 0.0 {
                return None;
            }
            Some(Gap {
                competency_id: score.competency_id.clone(),
                current_level,
                required_level,
                gap_size,
                band: GapBand::classify(gap_size),
            })
        })
        .collect();

    // `sort_by` is stable, so equal gaps retain scope order.
    gaps.sort_by(|a, b| b.gap_size.total_cmp(&a.gap_size));
    gaps
}

/// Competencies that carry a required level but could not be scored.
pub fn unassessed_competencies(
    aggregated: &AggregatedScore,
    required_levels: &BTreeMap<CompetencyId, f64>,
) -> Vec<CompetencyId> {
    aggregated
        .competencies
        .iter()
        .filter(|score| score.is_skipped() && required_levels.contains_key(&score.competency_id))
        .map(|score| score.competency_id.clone())
        .collect()
}
