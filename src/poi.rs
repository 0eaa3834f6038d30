//! Core data model: points of interest, constraints, routes and timelines.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Weekday label, canonical English form per the request contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        };
        f.write_str(s)
    }
}

impl FromStr for Weekday {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Monday" => Ok(Weekday::Monday),
            "Tuesday" => Ok(Weekday::Tuesday),
            "Wednesday" => Ok(Weekday::Wednesday),
            "Thursday" => Ok(Weekday::Thursday),
            "Friday" => Ok(Weekday::Friday),
            "Saturday" => Ok(Weekday::Saturday),
            "Sunday" => Ok(Weekday::Sunday),
            other => Err(format!("unrecognized weekday label: {other}")),
        }
    }
}

/// User walking/travel pace, scaling effective time consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserPace {
    Slow,
    Medium,
    Fast,
}

impl UserPace {
    pub fn multiplier(self) -> f64 {
        match self {
            UserPace::Slow => 1.3,
            UserPace::Medium => 1.0,
            UserPace::Fast => 0.8,
        }
    }
}

/// Transport profile used for routing and the haversine fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportProfile {
    Walking,
    Cycling,
    Driving,
}

impl TransportProfile {
    /// Average speed (km/h) used by the haversine fallback oracle.
    pub fn default_speed_kmh(self) -> f64 {
        match self {
            TransportProfile::Walking => 4.5,
            TransportProfile::Cycling => 15.0,
            TransportProfile::Driving => 25.0,
        }
    }
}

/// A candidate point of interest. Immutable for the duration of one
/// optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poi {
    pub id: u64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub popularity: u32,
    /// Opening minute-of-day for the active day, after parsing `opening_hours`.
    pub opening_minute: u32,
    /// Closing minute-of-day for the active day (may exceed 1440 if the
    /// window crosses midnight).
    pub closing_minute: u32,
    pub visit_duration: u32,
    pub category: String,
    pub price: f64,
    pub rating: f64,
    pub tags: Vec<String>,
    pub district: String,
    #[serde(default = "default_learned_weight")]
    pub learned_weight: f64,
    pub opening_hours: HashMap<Weekday, Option<String>>,
}

fn default_learned_weight() -> f64 {
    1.0
}

impl Poi {
    pub fn is_free(&self) -> bool {
        self.price <= 0.0
    }
}

/// Weather context, optionally supplied to the evaluator.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WeatherContext {
    pub precipitation_mm_per_hour: f64,
    pub temperature_c: f64,
    pub wind_speed_kmh: f64,
    pub weather_code: i32,
}

/// Hard constraints for one optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraints {
    pub max_duration: u32,
    pub max_budget: f64,
    pub start_time: u32,
    pub user_pace: UserPace,
    pub mandatory_categories: Vec<String>,
    pub avoid_categories: Vec<String>,
    pub preferred_districts: Vec<String>,
    pub weather: Option<WeatherContext>,
    pub transport_profile: TransportProfile,
    pub day_of_week: Weekday,
}

/// Parse an "HH:MM" 24h time string into minutes-from-midnight.
pub fn parse_hhmm(s: &str) -> Result<u32, String> {
    let (h, m) = s
        .split_once(':')
        .ok_or_else(|| format!("not an HH:MM time string: {s}"))?;
    let h: u32 = h.trim().parse().map_err(|_| format!("bad hour in {s}"))?;
    let m: u32 = m.trim().parse().map_err(|_| format!("bad minute in {s}"))?;
    if h > 23 || m > 59 {
        return Err(format!("time out of range: {s}"));
    }
    Ok((h * 60 + m) % 1440)
}

pub fn minutes_to_hhmm(minutes: i64) -> String {
    let minutes = minutes.rem_euclid(1440);
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// A single entry in a computed [`Timeline`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub poi_id: u64,
    pub arrival_minute: i64,
    pub wait_minutes: i64,
    pub departure_minute: i64,
    pub travel_minutes_from_prev: f64,
    pub price: f64,
    pub is_free: bool,
    pub district: String,
    pub category: String,
    pub rating: f64,
}

/// The scheduled output of [`crate::evaluator::schedule`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    pub entries: Vec<TimelineEntry>,
    pub total_duration: i64,
    pub total_cost: f64,
    pub num_pois: usize,
    pub start_time: i64,
    pub end_time: i64,
}
