use std::collections::BTreeMap;

use super::super::domain::RaterRole;
use super::super::weights::ResolvedWeights;
use super::buckets::BucketScore;

pub(crate) struct Composite {
    pub value: f64,
    pub applied_weights: BTreeMap<RaterRole, f64>,
}

/// Combine present buckets, redistributing the weight of missing ones proportionally.
///
/// Returns `None` when no bucket with a positive weight has ratings.
pub(crate) fn weighted_composite(
    buckets: &[BucketScore],
    weights: &ResolvedWeights,
) -> Option<Composite> {
    let present: Vec<(RaterRole, f64, f64)> = buckets
        .iter()
        .filter_map(|bucket| {
            let weight = weights.weight_for(bucket.role);
            match bucket.average {
                Some(average) if weight > 0.0 => Some((bucket.role, weight, average)),
                _ => None,
            }
        })
        .collect();

    let present_total: f64 = present.iter().map(|(_, weight, _)| weight).sum();
    if present.is_empty() || present_total <= 0.0 {
        return None;
    }

    let mut applied_weights = BTreeMap::new();
    let mut value = 0.0;
    for (role, weight, average) in present {
        let share = weight / present_total;
        value += average * share;
        applied_weights.insert(role, share * 100.0);
    }

    Some(Composite {
        value,
        applied_weights,
    })
}
