use serde::Serialize;

use super::domain::{Cycle, RaterRole, RoleWeights};
use super::error::EvaluationError;

/// Allowed distance between the configured weight total and 100.
pub const WEIGHT_SUM_EPSILON: f64 = 0.01;

const WEIGHT_TOTAL: f64 = 100.0;

/// Role weights that passed validation. Only obtainable through [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedWeights(RoleWeights);

impl ResolvedWeights {
    pub fn weight_for(&self, role: RaterRole) -> f64 {
        self.0.weight_for(role)
    }

    pub fn as_config(&self) -> &RoleWeights {
        &self.0
    }

    /// Roles contributing to composites (weight above zero), in canonical order.
    pub fn contributing_roles(&self) -> impl Iterator<Item = RaterRole> + '_ {
        RaterRole::ordered()
            .into_iter()
            .filter(|role| self.0.weight_for(*role) > 0.0)
    }
}

/// Resolve the weights stored on a cycle.
pub fn resolve_weights(cycle: &Cycle) -> Result<ResolvedWeights, EvaluationError> {
    resolve(&cycle.weights)
}

pub fn resolve(weights: &RoleWeights) -> Result<ResolvedWeights, EvaluationError> {
    for role in RaterRole::ordered() {
        let weight = weights.weight_for(role);
        if !weight.is_finite() {
            return Err(EvaluationError::InvalidWeightConfiguration {
                reason: format!("{role} weight is not a finite number"),
            });
        }
        if weight < 0.0 {
            return Err(EvaluationError::InvalidWeightConfiguration {
                reason: format!("{role} weight {weight} is negative"),
            });
        }
    }

    let total = weights.total();
    if (total - WEIGHT_TOTAL).abs() > WEIGHT_SUM_EPSILON {
        return Err(EvaluationError::InvalidWeightConfiguration {
            reason: format!("weights must sum to 100, found {total}"),
        });
    }

    Ok(ResolvedWeights(*weights))
}
