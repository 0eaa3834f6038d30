//! `DistanceOracle`: the travel-time matrix interface consumed by the
//! optimizer, its three-tier fallback composition, and the process-wide
//! matrix cache.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::oracle_haversine::HaversineOracle;
use crate::oracle_keyed::KeyedHttpOracle;
use crate::oracle_public::PublicHttpOracle;
use crate::poi::TransportProfile;

/// Which tier of the fallback chain ultimately produced a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    Keyed,
    Public,
    Haversine,
}

/// A computed travel-time matrix plus provenance.
#[derive(Debug, Clone)]
pub struct OracleResult {
    /// `minutes[i][j]` is the travel time from location `i` to location `j`.
    pub minutes: Vec<Vec<f64>>,
    pub selected_provider: ProviderKind,
    pub latency: Duration,
}

/// Interface consumed by the optimizer for travel-time matrices. Row/col `i`
/// is 0; unreachable pairs may carry a large sentinel value; determinism is
/// required per `(coords, profile)`.
pub trait DistanceOracle {
    fn matrix(&self, coords: &[(f64, f64)], profile: TransportProfile) -> Option<OracleResult>;

    /// Travel time from an external origin to each coordinate, using the
    /// same fallback order. `None` means "not supported by this oracle";
    /// callers fall back to haversine estimation from the origin directly.
    fn start_to_each(&self, _origin: (f64, f64), _coords: &[(f64, f64)], _profile: TransportProfile) -> Option<Vec<f64>> {
        None
    }
}

/// Composes the three providers in the exact fallback order required: keyed
/// HTTP provider, then public HTTP provider, then the infallible haversine
/// estimate.
pub struct FallbackOracle {
    pub keyed: Option<KeyedHttpOracle>,
    pub public: PublicHttpOracle,
    pub haversine: HaversineOracle,
}

impl FallbackOracle {
    pub fn new(keyed: Option<KeyedHttpOracle>, public: PublicHttpOracle) -> Self {
        Self {
            keyed,
            public,
            haversine: HaversineOracle::default(),
        }
    }

    pub fn haversine_only() -> Self {
        Self {
            keyed: None,
            public: PublicHttpOracle::disabled(),
            haversine: HaversineOracle::default(),
        }
    }
}

impl DistanceOracle for FallbackOracle {
    fn matrix(&self, coords: &[(f64, f64)], profile: TransportProfile) -> Option<OracleResult> {
        if let Some(keyed) = &self.keyed {
            let start = Instant::now();
            match keyed.matrix(coords, profile) {
                Some(minutes) => {
                    tracing::info!(provider = "keyed", n = coords.len(), "distance matrix computed");
                    return Some(OracleResult {
                        minutes,
                        selected_provider: ProviderKind::Keyed,
                        latency: start.elapsed(),
                    });
                }
                None => tracing::warn!("keyed distance provider failed, falling back to public"),
            }
        } else {
            tracing::info!("no keyed distance provider configured, skipping");
        }

        let start = Instant::now();
        match self.public.matrix(coords, profile) {
            Some(minutes) => {
                tracing::info!(provider = "public", n = coords.len(), "distance matrix computed");
                return Some(OracleResult {
                    minutes,
                    selected_provider: ProviderKind::Public,
                    latency: start.elapsed(),
                });
            }
            None => tracing::warn!("public distance provider failed, falling back to haversine"),
        }

        let start = Instant::now();
        let minutes = self.haversine.matrix_unconditional(coords, profile);
        tracing::info!(provider = "haversine", n = coords.len(), "distance matrix computed");
        Some(OracleResult {
            minutes,
            selected_provider: ProviderKind::Haversine,
            latency: start.elapsed(),
        })
    }

    fn start_to_each(&self, origin: (f64, f64), coords: &[(f64, f64)], profile: TransportProfile) -> Option<Vec<f64>> {
        if let Some(keyed) = &self.keyed {
            if let Some(times) = keyed.start_to_each(origin, coords, profile) {
                return Some(times);
            }
        }
        if let Some(times) = self.public.start_to_each(origin, coords, profile) {
            return Some(times);
        }
        Some(self.haversine.start_to_each_unconditional(origin, coords, profile))
    }
}

/// Cache key: coordinates rounded to 1e-6 degrees (matching GPS precision)
/// plus the transport profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    coords: Vec<(i64, i64)>,
    profile: u8,
}

fn cache_key(coords: &[(f64, f64)], profile: TransportProfile) -> CacheKey {
    CacheKey {
        coords: coords
            .iter()
            .map(|(lat, lon)| ((lat * 1e6).round() as i64, (lon * 1e6).round() as i64))
            .collect(),
        profile: profile as u8,
    }
}

/// Process-wide cache of computed matrices, keyed by `(coord list, profile)`.
/// A first caller populates under a write lock; subsequent callers with the
/// same key read the cached matrix without recomputation.
#[derive(Default)]
pub struct DistanceMatrixCache {
    entries: RwLock<HashMap<CacheKey, OracleResult>>,
}

impl DistanceMatrixCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a cached matrix for `(coords, profile)` if present, else call
    /// `oracle`, cache the result and return it.
    pub fn get_or_compute(&self, oracle: &dyn DistanceOracle, coords: &[(f64, f64)], profile: TransportProfile) -> Option<OracleResult> {
        let key = cache_key(coords, profile);
        if let Some(hit) = self.entries.read().unwrap().get(&key) {
            tracing::debug!("distance matrix cache hit");
            return Some(hit.clone());
        }

        let computed = oracle.matrix(coords, profile)?;
        self.entries.write().unwrap().insert(key, computed.clone());
        Some(computed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingOracle {
        calls: std::sync::atomic::AtomicUsize,
    }

    impl DistanceOracle for CountingOracle {
        fn matrix(&self, coords: &[(f64, f64)], _profile: TransportProfile) -> Option<OracleResult> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let n = coords.len();
            Some(OracleResult {
                minutes: vec![vec![0.0; n]; n],
                selected_provider: ProviderKind::Haversine,
                latency: Duration::default(),
            })
        }
    }

    #[test]
    fn cache_hit_avoids_recomputation() {
        let oracle = CountingOracle { calls: Default::default() };
        let cache = DistanceMatrixCache::new();
        let coords = vec![(1.0, 2.0), (3.0, 4.0)];

        let first = cache.get_or_compute(&oracle, &coords, TransportProfile::Walking).unwrap();
        let second = cache.get_or_compute(&oracle, &coords, TransportProfile::Walking).unwrap();

        assert_eq!(oracle.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(first.minutes, second.minutes);
    }

    #[test]
    fn different_profile_is_a_different_cache_entry() {
        let oracle = CountingOracle { calls: Default::default() };
        let cache = DistanceMatrixCache::new();
        let coords = vec![(1.0, 2.0), (3.0, 4.0)];

        cache.get_or_compute(&oracle, &coords, TransportProfile::Walking).unwrap();
        cache.get_or_compute(&oracle, &coords, TransportProfile::Driving).unwrap();

        assert_eq!(oracle.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn fallback_oracle_with_no_http_providers_still_produces_a_matrix() {
        let oracle = FallbackOracle::haversine_only();
        let coords = vec![(-12.12, -77.03), (-12.10, -77.02)];
        let result = oracle.matrix(&coords, TransportProfile::Walking).unwrap();
        assert_eq!(result.selected_provider, ProviderKind::Haversine);
        assert_eq!(result.minutes[0][0], 0.0);
    }
}
