use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::super::domain::{CompetencyId, CompetencyRating, RaterRole};

/// Running sum for one role bucket. Averages stay undefined until a value arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeanAccumulator {
    sum: f64,
    count: usize,
}

impl MeanAccumulator {
    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

impl FromIterator<f64> for MeanAccumulator {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut accumulator = Self::default();
        for value in iter {
            accumulator.push(value);
        }
        accumulator
    }
}

/// Average of all raters of one role for one competency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketScore {
    pub role: RaterRole,
    pub rater_count: usize,
    pub average: Option<f64>,
}

impl BucketScore {
    pub fn is_missing(&self) -> bool {
        self.average.is_none()
    }
}

pub(crate) type CompetencyBuckets = BTreeMap<CompetencyId, BTreeMap<RaterRole, MeanAccumulator>>;

pub(crate) fn collect_buckets<'a, I>(ratings: I) -> CompetencyBuckets
where
    I: IntoIterator<Item = &'a CompetencyRating>,
{
    let mut buckets = CompetencyBuckets::new();
    for rating in ratings {
        buckets
            .entry(rating.competency_id.clone())
            .or_default()
            .entry(rating.role)
            .or_default()
            .push(rating.score.as_f64());
    }
    buckets
}

/// Expand a competency's accumulators into one entry per role, missing ones included.
pub(crate) fn bucket_scores(accumulators: Option<&BTreeMap<RaterRole, MeanAccumulator>>) -> Vec<BucketScore> {
    RaterRole::ordered()
        .into_iter()
        .map(|role| {
            let accumulator = accumulators
                .and_then(|by_role| by_role.get(&role))
                .copied()
                .unwrap_or_default();
            BucketScore {
                role,
                rater_count: accumulator.count(),
                average: accumulator.mean(),
            }
        })
        .collect()
}
