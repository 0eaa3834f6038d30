//! Public HTTP distance provider — fallback tier B.
//!
//! Generalizes the teacher's OSRM table-service client to the profile set
//! this crate needs, mapping [`TransportProfile`] to OSRM's own profile
//! strings (`driving`/`walking`; cycling has no first-class demo-server
//! profile, so it approximates with `driving`, matching the original
//! Python's own `osrm_profile_map`).

use serde::Deserialize;

use crate::poi::TransportProfile;

#[derive(Debug, Clone)]
pub struct PublicHttpOracleConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for PublicHttpOracleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://router.project-osrm.org".to_string(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublicHttpOracle {
    config: Option<PublicHttpOracleConfig>,
    client: Option<reqwest::blocking::Client>,
}

impl PublicHttpOracle {
    pub fn new(config: PublicHttpOracleConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config: Some(config), client: Some(client) })
    }

    /// A provider with no backing HTTP client, always returning `None`, so
    /// callers who only want the haversine tier don't need an HTTP client.
    pub fn disabled() -> Self {
        Self { config: None, client: None }
    }

    fn osrm_profile(profile: TransportProfile) -> &'static str {
        match profile {
            TransportProfile::Driving => "driving",
            TransportProfile::Cycling => "driving",
            TransportProfile::Walking => "walking",
        }
    }

    pub fn matrix(&self, coords: &[(f64, f64)], profile: TransportProfile) -> Option<Vec<Vec<f64>>> {
        let (config, client) = (self.config.as_ref()?, self.client.as_ref()?);
        if coords.is_empty() {
            return Some(Vec::new());
        }

        let osrm_profile = Self::osrm_profile(profile);
        let coords_str = coords
            .iter()
            .map(|(lat, lon)| format!("{lon},{lat}"))
            .collect::<Vec<_>>()
            .join(";");
        let url = format!("{}/table/v1/{}/{}?annotations=duration", config.base_url, osrm_profile, coords_str);

        let response = client.get(&url).send().and_then(|r| r.error_for_status()).and_then(|r| r.json::<OsrmTableResponse>());

        match response {
            Ok(body) if body.code == "Ok" => {
                let durations = body.durations?;
                Some(
                    durations
                        .into_iter()
                        .map(|row| row.into_iter().map(|v| v.map(|s| s / 60.0).unwrap_or(f64::MAX / 2.0)).collect())
                        .collect(),
                )
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "public distance provider request failed");
                None
            }
        }
    }

    pub fn start_to_each(&self, origin: (f64, f64), coords: &[(f64, f64)], profile: TransportProfile) -> Option<Vec<f64>> {
        if coords.is_empty() {
            return Some(Vec::new());
        }
        let mut all = vec![origin];
        all.extend_from_slice(coords);
        let matrix = self.matrix(&all, profile)?;
        Some(matrix.first()?[1..].to_vec())
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    code: String,
    durations: Option<Vec<Vec<Option<f64>>>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_provider_returns_none() {
        let oracle = PublicHttpOracle::disabled();
        let coords = vec![(-12.1, -77.0), (-12.2, -77.1)];
        assert!(oracle.matrix(&coords, TransportProfile::Walking).is_none());
    }

    #[test]
    fn profile_mapping_has_no_panics_for_all_variants() {
        for profile in [TransportProfile::Walking, TransportProfile::Cycling, TransportProfile::Driving] {
            let _ = PublicHttpOracle::osrm_profile(profile);
        }
    }
}
