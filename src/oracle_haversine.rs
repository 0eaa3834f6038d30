//! Haversine distance oracle — the always-available fallback tier.
//!
//! Estimates travel time from great-circle distance and a profile-specific
//! average speed. Ignores roads, but can never fail, which is what makes the
//! three-tier fallback chain infallible overall.

use crate::poi::TransportProfile;

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct HaversineOracle;

impl HaversineOracle {
    pub(crate) fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
        let (lat1, lon1) = from;
        let (lat2, lon2) = to;

        let lat1_rad = lat1.to_radians();
        let lat2_rad = lat2.to_radians();
        let dlat = (lat2 - lat1).to_radians();
        let dlon = (lon2 - lon1).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_KM * c
    }

    fn km_to_minutes(km: f64, profile: TransportProfile) -> f64 {
        (km / profile.default_speed_kmh()) * 60.0
    }

    pub fn estimate_minutes(from: (f64, f64), to: (f64, f64), profile: TransportProfile) -> f64 {
        Self::km_to_minutes(Self::haversine_km(from, to), profile)
    }

    /// Compute a full matrix. Infallible — always returns `Some` in practice,
    /// but this inherent method has no `Option` in its signature so callers
    /// that know they're on the fallback tier don't need to unwrap.
    pub fn matrix_unconditional(&self, coords: &[(f64, f64)], profile: TransportProfile) -> Vec<Vec<f64>> {
        let n = coords.len();
        let mut matrix = vec![vec![0.0; n]; n];
        for (i, from) in coords.iter().enumerate() {
            for (j, to) in coords.iter().enumerate() {
                if i != j {
                    matrix[i][j] = Self::estimate_minutes(*from, *to, profile);
                }
            }
        }
        matrix
    }

    pub fn start_to_each_unconditional(&self, origin: (f64, f64), coords: &[(f64, f64)], profile: TransportProfile) -> Vec<f64> {
        coords.iter().map(|c| Self::estimate_minutes(origin, *c, profile)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_is_zero_distance() {
        let dist = HaversineOracle::haversine_km((36.1, -115.1), (36.1, -115.1));
        assert!(dist < 0.001);
    }

    #[test]
    fn known_distance_lima_to_callao() {
        // Lima center to Callao center, roughly 15km apart.
        let dist = HaversineOracle::haversine_km((-12.0464, -77.0428), (-12.0622, -77.1181));
        assert!(dist > 5.0 && dist < 20.0, "got {dist} km");
    }

    #[test]
    fn matrix_diagonal_is_zero() {
        let oracle = HaversineOracle;
        let coords = vec![(-12.1, -77.0), (-12.2, -77.1), (-12.3, -77.2)];
        let matrix = oracle.matrix_unconditional(&coords, TransportProfile::Walking);
        for i in 0..coords.len() {
            assert_eq!(matrix[i][i], 0.0);
        }
    }

    #[test]
    fn matrix_is_symmetric() {
        let oracle = HaversineOracle;
        let coords = vec![(-12.1, -77.0), (-12.2, -77.1)];
        let matrix = oracle.matrix_unconditional(&coords, TransportProfile::Driving);
        assert!((matrix[0][1] - matrix[1][0]).abs() < 1e-9);
    }

    #[test]
    fn faster_profile_yields_shorter_time() {
        let from = (-12.1, -77.0);
        let to = (-12.2, -77.1);
        let walking = HaversineOracle::estimate_minutes(from, to, TransportProfile::Walking);
        let driving = HaversineOracle::estimate_minutes(from, to, TransportProfile::Driving);
        assert!(driving < walking);
    }
}
