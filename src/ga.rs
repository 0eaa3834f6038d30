//! Genetic Algorithm fallback constructor for TOPTW routes.
//!
//! Used when [`aco`](crate::aco) fails to produce any route. Population
//! fitness evaluation is independent per individual and runs via `rayon`;
//! selection, crossover and mutation are sequential generation-by-generation
//! decisions driven by one seeded RNG, so a run is reproducible.

use std::collections::BTreeSet;
use std::time::Instant;

use rand::seq::{index::sample, SliceRandom};
use rand::Rng as _;
use rayon::prelude::*;

use crate::evaluator;
use crate::oracle_haversine::HaversineOracle;
use crate::orchestrator::CancellationToken;
use crate::poi::{Constraints, Poi};
use crate::rng::{self, Rng};
use crate::weights::OptimizationWeights;

#[derive(Debug, Clone, Copy)]
pub struct GaParams {
    pub population_size: usize,
    pub generations: usize,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    pub elite_ratio: f64,
    pub tournament_size: usize,
}

impl Default for GaParams {
    fn default() -> Self {
        Self { population_size: 100, generations: 200, mutation_rate: 0.15, crossover_rate: 0.8, elite_ratio: 0.1, tournament_size: 5 }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationStats {
    pub generation: usize,
    pub best_fitness: f64,
    pub avg_fitness: f64,
    pub worst_fitness: f64,
}

#[derive(Debug, Clone, Default)]
pub struct GaOutcome {
    pub best_route: Vec<usize>,
    pub best_fitness: f64,
    pub fitness_history: Vec<GenerationStats>,
}

fn random_route(num_pois: usize, route_length: usize, rng: &mut Rng) -> Vec<usize> {
    sample(rng, num_pois, route_length.min(num_pois)).into_vec()
}

/// Greedily build `count` routes: each POI added is whichever survivor scores
/// best on `popularity - 0.5 * travel_time`, feasible only if it's reached
/// before closing. Always estimates travel via haversine, matching the
/// behavior this mirrors (it never consults the supplied distance matrix).
fn generate_greedy_routes(pois: &[Poi], constraints: &Constraints, count: usize, rng: &mut Rng) -> Vec<Vec<usize>> {
    let mut routes = Vec::with_capacity(count);

    for _ in 0..count {
        let mut route: Vec<usize> = Vec::new();
        let mut available: BTreeSet<usize> = (0..pois.len()).collect();
        let mut current_time = constraints.start_time as f64;
        let mut total_time = 0.0;

        let available_vec: Vec<usize> = available.iter().copied().collect();
        if let Some(&first) = available_vec.choose(rng) {
            route.push(first);
            available.remove(&first);
            let poi = &pois[first];
            current_time = current_time.max(poi.opening_minute as f64) + poi.visit_duration as f64;
            total_time += poi.visit_duration as f64;
        }

        while !available.is_empty() && total_time < constraints.max_duration as f64 {
            let prev = &pois[*route.last().unwrap()];
            let mut best_score = f64::NEG_INFINITY;
            let mut best_idx: Option<usize> = None;

            for &idx in &available {
                let poi = &pois[idx];
                let travel_time = HaversineOracle::estimate_minutes((prev.latitude, prev.longitude), (poi.latitude, poi.longitude), constraints.transport_profile);
                let arrival_time = current_time + travel_time;
                if arrival_time >= poi.closing_minute as f64 {
                    continue;
                }
                let score = poi.popularity as f64 - (travel_time * 0.5);
                if score > best_score {
                    best_score = score;
                    best_idx = Some(idx);
                }
            }

            let Some(best_idx) = best_idx else { break };
            available.remove(&best_idx);

            let poi = &pois[best_idx];
            let travel_time = HaversineOracle::estimate_minutes((prev.latitude, prev.longitude), (poi.latitude, poi.longitude), constraints.transport_profile);
            current_time += travel_time;
            current_time = current_time.max(poi.opening_minute as f64);
            current_time += poi.visit_duration as f64;
            total_time += travel_time + poi.visit_duration as f64;

            route.push(best_idx);
        }

        if route.len() >= 3 {
            routes.push(route);
        }
    }

    routes
}

fn initialize_population(pois: &[Poi], constraints: &Constraints, params: &GaParams, rng: &mut Rng) -> Vec<Vec<usize>> {
    let num_pois = pois.len();
    if num_pois == 0 {
        tracing::warn!("no POIs available for route generation");
        return Vec::new();
    }

    let max_route_length = 12.min(num_pois);
    let min_route_length = 3.min(num_pois);

    let mut population = Vec::with_capacity(params.population_size);
    for _ in 0..params.population_size {
        let route_length = if max_route_length <= min_route_length { max_route_length } else { rng.gen_range(min_route_length..=max_route_length) };
        population.push(random_route(num_pois, route_length, rng));
    }

    let greedy_count = 10.min(params.population_size / 10);
    population.extend(generate_greedy_routes(pois, constraints, greedy_count, rng));
    population.truncate(params.population_size);
    population
}

fn tournament_selection(population: &[Vec<usize>], pois: &[Poi], constraints: &Constraints, weights: &OptimizationWeights, dist_matrix: Option<&[Vec<f64>]>, params: &GaParams, rng: &mut Rng) -> Vec<usize> {
    let k = params.tournament_size.min(population.len());
    let indices = sample(rng, population.len(), k).into_vec();
    indices
        .into_iter()
        .map(|i| (i, evaluator::fitness(pois, &population[i], constraints, weights, dist_matrix).unwrap_or(0.0)))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| population[i].clone())
        .unwrap_or_default()
}

fn create_ox_child(parent1: &[usize], parent2: &[usize], start: usize, end: usize) -> Vec<usize> {
    let size = parent1.len();
    let mut child: Vec<Option<usize>> = vec![None; size];
    child[start..end].copy_from_slice(&parent1[start..end].iter().copied().map(Some).collect::<Vec<_>>());

    let in_child: BTreeSet<usize> = child[start..end].iter().filter_map(|g| *g).collect();
    let empty_slots = size - (end - start);

    // Classic OX assumes both parents are permutations of the same set, but
    // here they are different POI subsets: `parent2` may carry genes not in
    // `parent1` at all, and may be missing genes `parent1` has outside the
    // segment. Bound the fill to the actual number of empty slots, then pad
    // from `parent1`'s own leftover genes so the child is always completed.
    let mut filler: Vec<usize> = parent2.iter().copied().filter(|g| !in_child.contains(g)).take(empty_slots).collect();
    if filler.len() < empty_slots {
        for gene in parent1.iter().copied() {
            if filler.len() >= empty_slots {
                break;
            }
            if !in_child.contains(&gene) && !filler.contains(&gene) {
                filler.push(gene);
            }
        }
    }

    let mut child_idx = end;
    for gene in filler {
        if child_idx >= size {
            child_idx = 0;
        }
        while child[child_idx].is_some() {
            child_idx += 1;
            if child_idx >= size {
                child_idx = 0;
            }
        }
        child[child_idx] = Some(gene);
    }

    child.into_iter().map(|g| g.expect("ordered crossover leaves no empty slot")).collect()
}

fn ordered_crossover(parent1: &[usize], parent2: &[usize], rng: &mut Rng) -> (Vec<usize>, Vec<usize>) {
    if parent1.len() < 2 || parent2.len() < 2 {
        return (parent1.to_vec(), parent2.to_vec());
    }

    let size = parent1.len().min(parent2.len());
    let mut points = sample(rng, size, 2).into_vec();
    points.sort_unstable();
    let (start, end) = (points[0], points[1]);

    let child1 = create_ox_child(&parent1[..size], &parent2[..size], start, end);
    let child2 = create_ox_child(&parent2[..size], &parent1[..size], start, end);
    (child1, child2)
}

fn mutate(route: &[usize], pois: &[Poi], params: &GaParams, rng: &mut Rng) -> Vec<usize> {
    if rng.gen::<f64>() > params.mutation_rate {
        return route.to_vec();
    }

    let mut mutated = route.to_vec();

    if mutated.len() < 2 {
        let present: BTreeSet<usize> = mutated.iter().copied().collect();
        let available: Vec<usize> = (0..pois.len()).filter(|i| !present.contains(i)).collect();
        if let Some(&gene) = available.choose(rng) {
            mutated.push(gene);
        }
        return mutated;
    }

    let operators = ["swap", "insert", "shuffle", "add", "remove"];
    match *operators.choose(rng).unwrap() {
        "swap" => {
            let idx = sample(rng, mutated.len(), 2).into_vec();
            mutated.swap(idx[0], idx[1]);
        }
        "insert" => {
            let idx = sample(rng, mutated.len(), 2).into_vec();
            let gene = mutated.remove(idx[0]);
            let target = idx[1].min(mutated.len());
            mutated.insert(target, gene);
        }
        "shuffle" => {
            if mutated.len() >= 4 {
                let mut points = sample(rng, mutated.len(), 2).into_vec();
                points.sort_unstable();
                let (i, j) = (points[0], points[1]);
                mutated[i..j].shuffle(rng);
            }
        }
        "add" => {
            let present: BTreeSet<usize> = mutated.iter().copied().collect();
            let available: Vec<usize> = (0..pois.len()).filter(|i| !present.contains(i)).collect();
            if !available.is_empty() && mutated.len() < 15 {
                let gene = *available.choose(rng).unwrap();
                let insert_pos = rng.gen_range(0..=mutated.len());
                mutated.insert(insert_pos, gene);
            }
        }
        "remove" => {
            if mutated.len() > 3 {
                let remove_idx = rng.gen_range(0..mutated.len());
                mutated.remove(remove_idx);
            }
        }
        _ => unreachable!(),
    }

    mutated
}

/// Run the full GA evolution and return the best route found, its fitness,
/// and per-generation telemetry.
#[allow(clippy::too_many_arguments)]
pub fn run(
    pois: &[Poi],
    constraints: &Constraints,
    weights: &OptimizationWeights,
    dist_matrix: Option<&[Vec<f64>]>,
    params: &GaParams,
    seed: u64,
    cancel: Option<&CancellationToken>,
    deadline: Option<Instant>,
) -> GaOutcome {
    let mut rng = rng::from_seed(seed);
    let mut population = initialize_population(pois, constraints, params, &mut rng);
    if population.is_empty() {
        tracing::error!("failed to initialize GA population");
        return GaOutcome::default();
    }

    tracing::info!(generations = params.generations, population = params.population_size, "starting GA evolution");

    let mut best_route = Vec::new();
    let mut best_fitness = 0.0;
    let mut history: Vec<GenerationStats> = Vec::with_capacity(params.generations);

    for generation in 0..params.generations {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            tracing::warn!(generation, "GA cancelled");
            break;
        }
        if deadline.is_some_and(|by| Instant::now() >= by) {
            tracing::warn!(generation, "GA deadline reached");
            break;
        }

        let fitnesses: Vec<f64> = population.par_iter().map(|route| evaluator::fitness(pois, route, constraints, weights, dist_matrix).unwrap_or(0.0)).collect();

        let (best_idx, gen_best_fitness) = fitnesses
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, &v)| (i, v))
            .expect("non-empty population");

        if gen_best_fitness > best_fitness {
            best_fitness = gen_best_fitness;
            best_route = population[best_idx].clone();
            tracing::debug!(generation, best_fitness, "GA new best");
        }

        let avg_fitness = fitnesses.iter().sum::<f64>() / fitnesses.len() as f64;
        let worst_fitness = fitnesses.iter().cloned().fold(f64::INFINITY, f64::min);
        history.push(GenerationStats { generation, best_fitness: gen_best_fitness, avg_fitness, worst_fitness });

        let elite_count = ((params.elite_ratio * params.population_size as f64) as usize).max(1);
        let mut ranked: Vec<usize> = (0..population.len()).collect();
        ranked.sort_by(|&a, &b| fitnesses[a].partial_cmp(&fitnesses[b]).unwrap_or(std::cmp::Ordering::Equal));
        let mut new_population: Vec<Vec<usize>> = ranked.iter().rev().take(elite_count).map(|&i| population[i].clone()).collect();

        while new_population.len() < params.population_size {
            let parent1 = tournament_selection(&population, pois, constraints, weights, dist_matrix, params, &mut rng);
            let parent2 = tournament_selection(&population, pois, constraints, weights, dist_matrix, params, &mut rng);

            let (mut child1, mut child2) =
                if rng.gen::<f64>() < params.crossover_rate { ordered_crossover(&parent1, &parent2, &mut rng) } else { (parent1.clone(), parent2.clone()) };

            child1 = mutate(&child1, pois, params, &mut rng);
            child2 = mutate(&child2, pois, params, &mut rng);

            new_population.push(child1);
            if new_population.len() < params.population_size {
                new_population.push(child2);
            }
        }

        population = new_population;
        population.truncate(params.population_size);

        if generation > 50 && history.len() > 50 {
            let recent = &history[history.len() - 50..];
            let max = recent.iter().map(|h| h.best_fitness).fold(f64::MIN, f64::max);
            let min = recent.iter().map(|h| h.best_fitness).fold(f64::MAX, f64::min);
            if (max - min).abs() < f64::EPSILON {
                tracing::info!(generation, "GA early stopping: no improvement");
                break;
            }
        }
    }

    tracing::info!(best_fitness, "GA evolution complete");
    GaOutcome { best_route, best_fitness, fitness_history: history }
}
