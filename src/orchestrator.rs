//! Ties the pieces together: candidate narrowing, availability filtering,
//! distance acquisition, ACO with a GA fallback, and final scheduling.
//!
//! Grounded on `optimizer.py`'s request handler — the five-step pipeline it
//! runs end to end, reproduced here as a library call instead of an HTTP
//! endpoint.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::aco::{self, AcoParams};
use crate::error::Error;
use crate::evaluator;
use crate::ga::{self, GaParams};
use crate::hours;
use crate::oracle::{DistanceMatrixCache, DistanceOracle, ProviderKind};
use crate::poi::{Constraints, Poi, Timeline};
use crate::weights::OptimizationWeights;

/// Cooperative cancellation flag threaded through ACO iterations and GA
/// generations. Cheap to check, cheap to clone the `Arc` around if the
/// caller wants to cancel from another thread.
#[derive(Debug, Default)]
pub struct CancellationToken(AtomicBool);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One optimization request: the candidate pool, the hard constraints, an
/// optional explicit POI selection, and an optional starting point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeRequest {
    pub candidates: Vec<Poi>,
    pub constraints: Constraints,
    /// When given, narrowing skips the rating/proximity/top-20 heuristic and
    /// restricts the candidate pool to exactly these POIs, in this order.
    pub selected_poi_ids: Option<Vec<u64>>,
    pub start_location: Option<(f64, f64)>,
}

/// The result of one optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorResult {
    pub route_id: String,
    pub route_poi_ids: Vec<u64>,
    pub fitness: f64,
    pub timeline: Timeline,
    pub selected_provider: ProviderKind,
    /// `true` if ACO produced no route and the GA fallback ran instead.
    pub used_ga: bool,
}

/// Narrow `candidates` down to the pool ACO/GA will actually search over.
///
/// With an explicit `selected_poi_ids`, the pool is exactly those POIs, in
/// the given order, dropping any id absent from `candidates`. Otherwise:
/// keep POIs rated 3.0 or above, then add back any POI within roughly 3km of
/// `start_location` the rating filter dropped, then cap the result to the
/// 20 most popular.
fn narrow_candidates(candidates: Vec<Poi>, selected_poi_ids: Option<&[u64]>, start_location: Option<(f64, f64)>) -> Vec<Poi> {
    if let Some(ids) = selected_poi_ids {
        let by_id: HashMap<u64, Poi> = candidates.into_iter().map(|poi| (poi.id, poi)).collect();
        return ids.iter().filter_map(|id| by_id.get(id).cloned()).collect();
    }

    let mut narrowed: Vec<Poi> = candidates.iter().filter(|poi| poi.rating >= 3.0).cloned().collect();

    if let Some((lat0, lon0)) = start_location {
        let already_included: HashSet<u64> = narrowed.iter().map(|poi| poi.id).collect();
        for poi in &candidates {
            if already_included.contains(&poi.id) {
                continue;
            }
            // Roughly 3km in degrees at mid-latitudes; matches the original's
            // plain coordinate-delta proximity check rather than haversine.
            let degree_dist = ((poi.latitude - lat0).powi(2) + (poi.longitude - lon0).powi(2)).sqrt();
            if degree_dist < 0.027 {
                tracing::info!(poi = %poi.name, "adding nearby POI back into candidates despite low rating");
                narrowed.push(poi.clone());
            }
        }
    }

    narrowed.sort_by(|a, b| b.popularity.cmp(&a.popularity));
    narrowed.truncate(20);
    narrowed
}

/// Orchestrates one optimization run against a given distance oracle.
pub struct Orchestrator {
    oracle: Box<dyn DistanceOracle + Send + Sync>,
    cache: DistanceMatrixCache,
}

impl Orchestrator {
    pub fn new(oracle: Box<dyn DistanceOracle + Send + Sync>) -> Self {
        Self { oracle, cache: DistanceMatrixCache::new() }
    }

    /// `cancel` and `deadline` are both checked between ACO iterations and
    /// between GA generations; either one tripping stops the search early
    /// with whatever best route has been found so far.
    pub fn optimize(
        &self,
        request: OptimizeRequest,
        weights: &OptimizationWeights,
        seed: u64,
        cancel: Option<&CancellationToken>,
        deadline: Option<Instant>,
    ) -> Result<OrchestratorResult, Error> {
        let OptimizeRequest { candidates, constraints, selected_poi_ids, start_location } = request;

        let narrowed = narrow_candidates(candidates, selected_poi_ids.as_deref(), start_location);
        tracing::info!(count = narrowed.len(), "candidates narrowed");

        let available: Vec<Poi> = narrowed
            .into_iter()
            .filter(|poi| {
                let visitable = hours::is_visitable(&poi.opening_hours, constraints.day_of_week, constraints.start_time as i64, poi.visit_duration as i64);
                if !visitable {
                    tracing::info!(poi = %poi.name, day = %constraints.day_of_week, "dropping POI: not open at the requested start time");
                }
                visitable
            })
            .collect();

        if available.is_empty() {
            return Err(Error::NoAvailablePois { day: constraints.day_of_week, start_time: constraints.start_time });
        }
        tracing::info!(count = available.len(), "candidates available after opening-hours filter");

        if cancel.is_some_and(CancellationToken::is_cancelled) || deadline.is_some_and(|by| Instant::now() >= by) {
            return Err(Error::Cancelled { best_so_far: None });
        }

        let coords: Vec<(f64, f64)> = available.iter().map(|poi| (poi.latitude, poi.longitude)).collect();
        let oracle_result = self.cache.get_or_compute(self.oracle.as_ref(), &coords, constraints.transport_profile).ok_or(Error::OracleUnavailable)?;
        tracing::info!(provider = ?oracle_result.selected_provider, "distance matrix ready");

        let start_to_each = start_location.and_then(|origin| self.oracle.start_to_each(origin, &coords, constraints.transport_profile));

        let aco_outcome = aco::run(&available, &constraints, weights, Some(&oracle_result.minutes), start_location, &AcoParams::default(), seed, cancel, deadline);

        let (route, fitness, used_ga) = if !aco_outcome.best_route.is_empty() {
            (aco_outcome.best_route, aco_outcome.best_fitness, false)
        } else {
            tracing::warn!("ACO produced no route, falling back to GA");
            let ga_outcome = ga::run(&available, &constraints, weights, Some(&oracle_result.minutes), &GaParams::default(), seed, cancel, deadline);
            (ga_outcome.best_route, ga_outcome.best_fitness, true)
        };

        if route.is_empty() {
            return Err(Error::NoFeasibleRoute);
        }

        let timeline = evaluator::schedule(&available, &route, &constraints, Some(&oracle_result.minutes), start_location, start_to_each.as_deref())?;

        let route_poi_ids: Vec<u64> = route.iter().map(|&idx| available[idx].id).collect();
        tracing::info!(fitness, used_ga, "optimization complete");

        Ok(OrchestratorResult {
            route_id: uuid::Uuid::new_v4().to_string(),
            route_poi_ids,
            fitness,
            timeline,
            selected_provider: oracle_result.selected_provider,
            used_ga,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::FallbackOracle;
    use crate::poi::{UserPace, Weekday};

    fn poi(id: u64, name: &str, lat: f64, lon: f64, popularity: u32, rating: f64, open_min: u32, close_min: u32) -> Poi {
        let mut opening_hours = HashMap::new();
        opening_hours.insert(Weekday::Monday, Some(format!("{:02}:{:02}-{:02}:{:02}", open_min / 60, open_min % 60, close_min / 60, close_min % 60)));
        Poi {
            id,
            name: name.to_string(),
            latitude: lat,
            longitude: lon,
            popularity,
            opening_minute: open_min,
            closing_minute: close_min,
            visit_duration: 60,
            category: "museum".to_string(),
            price: 10.0,
            rating,
            tags: Vec::new(),
            district: "centro".to_string(),
            learned_weight: 1.0,
            opening_hours,
        }
    }

    fn constraints() -> Constraints {
        Constraints {
            max_duration: 480,
            max_budget: 1000.0,
            start_time: 540,
            user_pace: UserPace::Medium,
            mandatory_categories: Vec::new(),
            avoid_categories: Vec::new(),
            preferred_districts: Vec::new(),
            weather: None,
            transport_profile: crate::poi::TransportProfile::Walking,
            day_of_week: Weekday::Monday,
        }
    }

    #[test]
    fn produces_a_feasible_timeline_for_a_simple_request() {
        let candidates = vec![
            poi(1, "Plaza Mayor", -12.0464, -77.0428, 90, 4.5, 480, 1200),
            poi(2, "Museo de Arte", -12.0500, -77.0400, 70, 4.2, 480, 1200),
            poi(3, "Parque Kennedy", -12.1211, -77.0297, 60, 4.0, 480, 1200),
        ];
        let orchestrator = Orchestrator::new(Box::new(FallbackOracle::haversine_only()));
        let request = OptimizeRequest { candidates, constraints: constraints(), selected_poi_ids: None, start_location: Some((-12.0464, -77.0428)) };

        let result = orchestrator.optimize(request, &OptimizationWeights::default(), 7, None, None).unwrap();

        assert!(!result.route_poi_ids.is_empty());
        assert_eq!(result.timeline.num_pois, result.route_poi_ids.len());
    }

    #[test]
    fn no_available_pois_is_an_error() {
        let candidates = vec![poi(1, "Closed Museum", -12.0, -77.0, 50, 4.0, 2000, 2100)];
        let orchestrator = Orchestrator::new(Box::new(FallbackOracle::haversine_only()));
        let request = OptimizeRequest { candidates, constraints: constraints(), selected_poi_ids: None, start_location: None };

        let err = orchestrator.optimize(request, &OptimizationWeights::default(), 1, None, None).unwrap_err();
        assert!(matches!(err, Error::NoAvailablePois { .. }));
    }

    #[test]
    fn explicit_selection_still_goes_through_the_opening_hours_filter() {
        let candidates = vec![
            poi(1, "Open All Day", -12.0, -77.0, 50, 4.0, 0, 1440),
            poi(2, "Closed Now", -12.01, -77.01, 80, 4.8, 2000, 2100),
        ];
        let orchestrator = Orchestrator::new(Box::new(FallbackOracle::haversine_only()));
        let request = OptimizeRequest {
            candidates,
            constraints: constraints(),
            selected_poi_ids: Some(vec![1, 2]),
            start_location: None,
        };

        let result = orchestrator.optimize(request, &OptimizationWeights::default(), 1, None, None).unwrap();
        assert!(result.route_poi_ids.iter().all(|&id| id == 1));
    }

    #[test]
    fn same_seed_is_deterministic() {
        let candidates = vec![
            poi(1, "A", -12.04, -77.04, 80, 4.5, 480, 1200),
            poi(2, "B", -12.05, -77.03, 60, 4.0, 480, 1200),
            poi(3, "C", -12.06, -77.02, 70, 4.2, 480, 1200),
            poi(4, "D", -12.07, -77.01, 50, 3.8, 480, 1200),
        ];
        let orchestrator = Orchestrator::new(Box::new(FallbackOracle::haversine_only()));
        let weights = OptimizationWeights::default();

        let first = orchestrator
            .optimize(OptimizeRequest { candidates: candidates.clone(), constraints: constraints(), selected_poi_ids: None, start_location: None }, &weights, 42, None, None)
            .unwrap();
        let second = orchestrator
            .optimize(OptimizeRequest { candidates, constraints: constraints(), selected_poi_ids: None, start_location: None }, &weights, 42, None, None)
            .unwrap();

        assert_eq!(first.route_poi_ids, second.route_poi_ids);
        assert_eq!(first.fitness, second.fitness);
    }

    #[test]
    fn cancelling_before_the_search_starts_yields_no_best_so_far() {
        let candidates = vec![poi(1, "A", -12.0, -77.0, 80, 4.5, 480, 1200)];
        let orchestrator = Orchestrator::new(Box::new(FallbackOracle::haversine_only()));
        let token = CancellationToken::new();
        token.cancel();

        let request = OptimizeRequest { candidates, constraints: constraints(), selected_poi_ids: None, start_location: None };
        let err = orchestrator.optimize(request, &OptimizationWeights::default(), 1, Some(&token), None).unwrap_err();
        assert!(matches!(err, Error::Cancelled { best_so_far: None }));
    }
}
