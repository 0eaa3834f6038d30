//! TOPTW scheduler/evaluator: scores a route and, separately, expands it into
//! a detailed visit timeline.
//!
//! `fitness` and `schedule` walk the same route the same way — travel,
//! waiting, time-window checks, weighted scoring — but serve different
//! callers: `fitness` is the scalar the constructors (`aco`, `ga`) optimize
//! against, `schedule` is the human-facing itinerary the orchestrator returns
//! once a route has been chosen. `schedule` additionally redistributes visit
//! time across the route proportional to POI popularity; `fitness` does not,
//! matching the asymmetry in the system this was ported from.

use std::collections::{HashMap, HashSet};

use crate::error::EvalError;
use crate::hours::{self, MAX_WAIT};
use crate::oracle_haversine::HaversineOracle;
use crate::poi::{Constraints, Poi, Timeline, TimelineEntry, WeatherContext};
use crate::weights::OptimizationWeights;

/// Penalty for waiting longer than [`MAX_WAIT`] minutes for a POI to open.
/// A literal in the system this is ported from, not one of the centralized
/// [`OptimizationWeights`] — the wait-time weight field exists but is unused
/// on this path.
const EXCESSIVE_WAIT_PENALTY: f64 = 500.0;
const WAIT_TIME_PENALTY_MULTIPLIER: f64 = 2.0;

fn validate(pois: &[Poi], route: &[usize], dist_matrix: Option<&[Vec<f64>]>) -> Result<(), EvalError> {
    if let Some(matrix) = dist_matrix {
        if matrix.len() != pois.len() {
            return Err(EvalError::DimensionMismatch { expected: pois.len(), actual: matrix.len() });
        }
    }
    for &idx in route {
        if idx >= pois.len() {
            return Err(EvalError::InvalidIndex(idx));
        }
    }
    Ok(())
}

pub(crate) fn travel_minutes(pois: &[Poi], dist_matrix: Option<&[Vec<f64>]>, from_idx: usize, to_idx: usize, profile: crate::poi::TransportProfile) -> f64 {
    match dist_matrix {
        Some(matrix) => matrix[from_idx][to_idx],
        None => HaversineOracle::estimate_minutes(
            (pois[from_idx].latitude, pois[from_idx].longitude),
            (pois[to_idx].latitude, pois[to_idx].longitude),
            profile,
        ),
    }
}

fn weather_weight(poi: &Poi, weather: Option<&WeatherContext>) -> f64 {
    let mut weight = 1.0;
    let Some(w) = weather else { return weight };

    if w.precipitation_mm_per_hour > 2.0 {
        if poi.tags.iter().any(|t| matches!(t.as_str(), "outdoor" | "park" | "beach")) {
            weight *= 0.5;
        } else if poi.tags.iter().any(|t| matches!(t.as_str(), "museum" | "indoor" | "cultural")) {
            weight *= 1.3;
        }
    }

    if w.temperature_c > 30.0 {
        if poi.tags.iter().any(|t| t == "outdoor") {
            weight *= 0.7;
        } else if poi.tags.iter().any(|t| t == "indoor") {
            weight *= 1.2;
        }
    } else if w.temperature_c < 15.0 && poi.tags.iter().any(|t| t == "beach") {
        weight *= 0.6;
    }

    if w.wind_speed_kmh > 30.0 && poi.tags.iter().any(|t| t == "beach" || t == "outdoor") {
        weight *= 0.8;
    }

    weight
}

fn user_preference_weight(poi: &Poi, constraints: &Constraints) -> f64 {
    let mut weight = 1.0;
    if constraints.mandatory_categories.iter().any(|c| c == &poi.category) {
        weight *= 1.5;
    }
    if constraints.avoid_categories.iter().any(|c| c == &poi.category) {
        weight *= 0.2;
    }
    if !constraints.preferred_districts.is_empty() {
        if constraints.preferred_districts.iter().any(|d| d == &poi.district) {
            weight *= 1.3;
        } else {
            weight *= 0.8;
        }
    }
    weight
}

/// Score a route. `dist_matrix`, when given, must be indexed the same way as
/// `pois` (row/col `i` corresponds to `pois[i]`); `None` falls back to a
/// haversine estimate per leg. Never negative — unreachable or fully
/// penalized routes bottom out at `0.0`, never an error.
pub fn fitness(
    pois: &[Poi],
    route: &[usize],
    constraints: &Constraints,
    weights: &OptimizationWeights,
    dist_matrix: Option<&[Vec<f64>]>,
) -> Result<f64, EvalError> {
    validate(pois, route, dist_matrix)?;
    if route.is_empty() {
        return Ok(0.0);
    }

    let mut total_score = 0.0;
    let mut total_time = 0.0;
    let mut total_cost = 0.0;
    let mut current_time = constraints.start_time as f64;
    let mut penalties = 0.0;
    let mut visited_categories: HashSet<&str> = HashSet::new();

    for (i, &poi_idx) in route.iter().enumerate() {
        let poi = &pois[poi_idx];
        visited_categories.insert(poi.category.as_str());

        if i > 0 {
            let travel = travel_minutes(pois, dist_matrix, route[i - 1], poi_idx, constraints.transport_profile);
            total_time += travel;
            current_time += travel;
        }

        if constraints.avoid_categories.iter().any(|c| c == &poi.category) {
            penalties += weights.avoided_category_penalty;
            continue;
        }

        let opening = poi.opening_minute as f64;
        let closing = poi.closing_minute as f64;

        if current_time < opening {
            let wait = opening - current_time;
            if wait > MAX_WAIT as f64 {
                penalties += EXCESSIVE_WAIT_PENALTY;
                continue;
            }
            penalties += wait * WAIT_TIME_PENALTY_MULTIPLIER;
            current_time = opening;
            total_time += wait;
        }

        if current_time >= closing {
            penalties += weights.missed_poi_penalty;
            continue;
        }

        if current_time + poi.visit_duration as f64 > closing {
            penalties += weights.insufficient_time_penalty;
            continue;
        }

        total_time += poi.visit_duration as f64;
        current_time += poi.visit_duration as f64;
        total_cost += poi.price;

        let weather_w = weather_weight(poi, constraints.weather.as_ref());
        let user_w = user_preference_weight(poi, constraints);
        let urgency_w = hours::urgency(&poi.opening_hours, constraints.day_of_week, current_time as i64, poi.visit_duration as i64);

        if urgency_w == 0.0 {
            penalties += weights.non_visitable_penalty;
            continue;
        }

        let poi_score = poi.popularity as f64 * weather_w * user_w * poi.learned_weight * urgency_w * (poi.rating / 5.0);
        total_score += poi_score;
    }

    for category in &constraints.mandatory_categories {
        if !visited_categories.contains(category.as_str()) {
            penalties += weights.mandatory_missing_penalty;
        }
    }

    if total_time > constraints.max_duration as f64 {
        let overtime = total_time - constraints.max_duration as f64;
        penalties += overtime * weights.constraint_violation;
    }

    if total_cost > constraints.max_budget {
        let over_budget = total_cost - constraints.max_budget;
        penalties += over_budget * weights.cost_penalty * 10.0;
    }

    let pace_multiplier = constraints.user_pace.multiplier();
    let adjusted_time = total_time * pace_multiplier;
    if adjusted_time > constraints.max_duration as f64 {
        penalties += (adjusted_time - constraints.max_duration as f64) * weights.constraint_violation;
    }

    let fitness = total_score - (weights.travel_time_penalty * total_time) - (weights.cost_penalty * total_cost) - penalties;
    Ok(fitness.max(0.0))
}

/// Expand a route into a detailed timeline: arrival/wait/departure times,
/// cost and a smart redistribution of visit time across the route
/// proportional to each POI's popularity (min 30, max 180 minutes per stop).
///
/// `start_location`, when given, is the tour's origin; `start_to_each[poi_id]`
/// (oracle-backed) takes priority over a haversine estimate from
/// `start_location` for the first leg.
pub fn schedule(
    pois: &[Poi],
    route: &[usize],
    constraints: &Constraints,
    dist_matrix: Option<&[Vec<f64>]>,
    start_location: Option<(f64, f64)>,
    start_to_each: Option<&[f64]>,
) -> Result<Timeline, EvalError> {
    validate(pois, route, dist_matrix)?;
    if route.is_empty() {
        let t = constraints.start_time as i64;
        return Ok(Timeline { entries: Vec::new(), total_duration: 0, total_cost: 0.0, num_pois: 0, start_time: t, end_time: t });
    }

    let first_leg_minutes = |poi_idx: usize, poi: &Poi| -> f64 {
        match start_location {
            None => 0.0,
            Some(origin) => match start_to_each.and_then(|v| v.get(poi_idx)) {
                Some(&t) => t,
                None => {
                    let t = HaversineOracle::estimate_minutes(origin, (poi.latitude, poi.longitude), constraints.transport_profile);
                    tracing::warn!(poi = %poi.name, minutes = t, "using fallback haversine travel time to first POI");
                    t
                }
            },
        }
    };

    let mut total_travel_time = first_leg_minutes(route[0], &pois[route[0]]);
    for i in 1..route.len() {
        total_travel_time += travel_minutes(pois, dist_matrix, route[i - 1], route[i], constraints.transport_profile);
    }

    let visit_time_budget = constraints.max_duration as f64 - total_travel_time;
    let total_importance: u64 = route.iter().map(|&idx| pois[idx].popularity as u64).sum();

    let visit_durations: HashMap<usize, i64> = route
        .iter()
        .map(|&idx| {
            let poi = &pois[idx];
            let duration = if total_importance > 0 {
                let allocated = (poi.popularity as f64 / total_importance as f64) * visit_time_budget;
                (allocated as i64).clamp(30, 180)
            } else {
                poi.visit_duration as i64
            };
            (idx, duration)
        })
        .collect();

    let mut entries = Vec::with_capacity(route.len());
    let mut current_time = constraints.start_time as i64;
    let mut total_cost = 0.0;

    for (i, &poi_idx) in route.iter().enumerate() {
        let poi = &pois[poi_idx];

        let travel_time = if i == 0 {
            first_leg_minutes(poi_idx, poi)
        } else {
            travel_minutes(pois, dist_matrix, route[i - 1], poi_idx, constraints.transport_profile)
        };
        current_time += travel_time.round() as i64;

        // Mirrors `fitness`'s per-POI skip ladder (steps 2-6): avoided
        // category, excessive wait, missed closing, insufficient remaining
        // time, and zero urgency all drop the POI from the timeline with no
        // further advance of `current_time` beyond the travel leg already
        // taken, exactly as the scoring path does.
        if constraints.avoid_categories.iter().any(|c| c == &poi.category) {
            continue;
        }

        let arrival_minute = current_time;
        let mut wait_minutes = 0i64;
        if current_time < poi.opening_minute as i64 {
            wait_minutes = poi.opening_minute as i64 - current_time;
            if wait_minutes > MAX_WAIT {
                continue;
            }
            current_time = poi.opening_minute as i64;
        }

        if current_time >= poi.closing_minute as i64 {
            continue;
        }

        let visit_duration = *visit_durations.get(&poi_idx).unwrap_or(&(poi.visit_duration as i64));
        if current_time + visit_duration > poi.closing_minute as i64 {
            continue;
        }

        let urgency_w = hours::urgency(&poi.opening_hours, constraints.day_of_week, current_time, visit_duration);
        if urgency_w == 0.0 {
            continue;
        }

        let departure_minute = current_time + visit_duration;

        entries.push(TimelineEntry {
            poi_id: poi.id,
            arrival_minute,
            wait_minutes,
            departure_minute,
            travel_minutes_from_prev: travel_time,
            price: poi.price,
            is_free: poi.is_free(),
            district: poi.district.clone(),
            category: poi.category.clone(),
            rating: poi.rating,
        });

        current_time = departure_minute;
        total_cost += poi.price;
    }

    let end_time = current_time;
    let num_pois = entries.len();
    Ok(Timeline {
        total_duration: end_time - constraints.start_time as i64,
        total_cost,
        num_pois,
        start_time: constraints.start_time as i64,
        end_time,
        entries,
    })
}
