//! Centralized optimization weights, shared by the evaluator and the ACO
//! heuristic so both read off the same configuration.

use serde::{Deserialize, Serialize};

/// Unified weights for route optimization. Loaded from static defaults at
/// process start; an external weight-learner may atomically replace the
/// active instance (outside this crate's scope). The orchestrator takes a
/// snapshot by value at the start of a run, so concurrent replacement never
/// perturbs an in-flight optimization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizationWeights {
    // Heuristic component weights (should sum to 1.0).
    pub distance_weight: f64,
    pub popularity_weight: f64,
    pub urgency_weight: f64,
    pub rating_weight: f64,

    // Fitness penalty weights.
    pub travel_time_penalty: f64,
    pub cost_penalty: f64,
    pub constraint_violation: f64,

    // Time window penalties.
    pub wait_time_penalty: f64,
    pub missed_poi_penalty: f64,
    pub insufficient_time_penalty: f64,
    pub avoided_category_penalty: f64,
    pub mandatory_missing_penalty: f64,

    // Urgency penalties.
    pub non_visitable_penalty: f64,
}

impl Default for OptimizationWeights {
    fn default() -> Self {
        Self {
            distance_weight: 0.35,
            popularity_weight: 0.30,
            urgency_weight: 0.20,
            rating_weight: 0.15,

            travel_time_penalty: 0.1,
            cost_penalty: 0.5,
            constraint_violation: 2.0,

            wait_time_penalty: 0.5,
            missed_poi_penalty: 200.0,
            insufficient_time_penalty: 150.0,
            avoided_category_penalty: 50.0,
            mandatory_missing_penalty: 100.0,

            non_visitable_penalty: 300.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_weights_sum_to_one() {
        let w = OptimizationWeights::default();
        let sum = w.distance_weight + w.popularity_weight + w.urgency_weight + w.rating_weight;
        assert!((sum - 1.0).abs() < 1e-9, "weights summed to {sum}");
    }
}
