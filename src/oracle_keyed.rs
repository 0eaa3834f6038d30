//! Keyed HTTP distance provider — fallback tier A.
//!
//! Grounded on the original service's `_get_ors_matrix`: an OpenRouteService
//! style matrix endpoint, authenticated with an API key header, addressed in
//! `[lon, lat]` order, returning durations in seconds.

use serde::{Deserialize, Serialize};

use crate::poi::TransportProfile;

#[derive(Debug, Clone)]
pub struct KeyedHttpOracleConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl KeyedHttpOracleConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), api_key: api_key.into(), timeout_secs: 15 }
    }
}

#[derive(Debug, Clone)]
pub struct KeyedHttpOracle {
    config: KeyedHttpOracleConfig,
    client: reqwest::blocking::Client,
}

impl KeyedHttpOracle {
    pub fn new(config: KeyedHttpOracleConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    fn ors_profile(profile: TransportProfile) -> &'static str {
        match profile {
            TransportProfile::Walking => "foot-walking",
            TransportProfile::Cycling => "cycling-regular",
            TransportProfile::Driving => "driving-car",
        }
    }

    pub fn matrix(&self, coords: &[(f64, f64)], profile: TransportProfile) -> Option<Vec<Vec<f64>>> {
        if coords.is_empty() {
            return Some(Vec::new());
        }
        if self.config.api_key.is_empty() {
            return None;
        }

        let locations: Vec<[f64; 2]> = coords.iter().map(|(lat, lon)| [*lon, *lat]).collect();
        let body = OrsMatrixRequest { locations, metrics: vec!["duration".to_string()], units: "m".to_string() };
        let url = format!("{}/matrix/{}", self.config.base_url, Self::ors_profile(profile));

        let response = self
            .client
            .post(&url)
            .header("Authorization", &self.config.api_key)
            .json(&body)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json::<OrsMatrixResponse>());

        match response {
            Ok(parsed) => {
                let durations = parsed.durations?;
                Some(durations.into_iter().map(|row| row.into_iter().map(|s| s.map(|v| v / 60.0).unwrap_or(f64::MAX / 2.0)).collect()).collect())
            }
            Err(e) => {
                tracing::warn!(error = %e, "keyed distance provider request failed");
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

#[derive(Debug, Serialize)]
struct OrsMatrixRequest {
    locations: Vec<[f64; 2]>,
    metrics: Vec<String>,
    units: String,
}

#[derive(Debug, Deserialize)]
struct OrsMatrixResponse {
    durations: Option<Vec<Vec<Option<f64>>>>,
}
