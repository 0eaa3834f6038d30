//! Opening-hours parsing and time-window utilities.
//!
//! Pure functions, side-effect-free beyond a `tracing::warn!` on the
//! unparseable-string path, so they can be unit-tested in isolation from the
//! rest of the optimizer.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::poi::Weekday;

/// Matches an `HH:MM-HH:MM` time range once dashes have been normalized to
/// ASCII hyphen by [`normalize_dashes`].
static TIME_RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2}):(\d{2})\s*-\s*(\d{1,2}):(\d{2})").expect("valid opening-hours time-range pattern"));

/// Hard cap on how long a tour will idle before a POI opens.
pub const MAX_WAIT: i64 = 30;

/// Result of parsing one day's opening-hours string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Hours {
    /// Open from `open_min` to `close_min` (minutes from midnight; `close_min`
    /// may exceed 1440 if the window crosses midnight).
    Range { open_min: i64, close_min: i64 },
    Closed,
    AlwaysOpen,
}

impl Hours {
    fn as_range(self) -> Option<(i64, i64)> {
        match self {
            Hours::Range { open_min, close_min } => Some((open_min, close_min)),
            Hours::AlwaysOpen => Some((0, 1440)),
            Hours::Closed => None,
        }
    }
}

fn normalize_dashes(s: &str) -> String {
    s.replace(['\u{2013}', '\u{2014}'], "-")
}

/// Parse one day's opening-hours entry.
///
/// Recognized forms, case-insensitive and whitespace-tolerant: an absent or
/// `None` entry is `AlwaysOpen`; a string containing "24 hours"/"24 horas" is
/// `AlwaysOpen`; a string containing "closed"/"cerrado" is `Closed`; a string
/// matching `HH:MM<sep>HH:MM` (sep is `-`, en-dash or em-dash) is a `Range`,
/// adding 1440 to the close minute if it is earlier than the open minute
/// (crosses midnight). Anything else is unparseable and falls back to
/// `AlwaysOpen`, logged at warning level.
pub fn parse_opening_hours(hours: &HashMap<Weekday, Option<String>>, day: Weekday) -> Hours {
    let Some(entry) = hours.get(&day) else {
        return Hours::AlwaysOpen;
    };
    let Some(raw) = entry else {
        return Hours::AlwaysOpen;
    };

    let lower = raw.to_lowercase();
    if lower.contains("24 hours") || lower.contains("24 horas") {
        return Hours::AlwaysOpen;
    }
    if lower.contains("closed") || lower.contains("cerrado") {
        return Hours::Closed;
    }

    let normalized = normalize_dashes(raw);
    if let Some((open_min, close_min)) = parse_time_range(&normalized) {
        let close_min = if close_min < open_min { close_min + 1440 } else { close_min };
        return Hours::Range { open_min, close_min };
    }

    tracing::warn!(hours = %raw, day = %day, "could not parse opening hours, treating as always open");
    Hours::AlwaysOpen
}

/// Extract the first `HH:MM-HH:MM` match from an already dash-normalized
/// string, tolerant of surrounding whitespace around the separator.
fn parse_time_range(s: &str) -> Option<(i64, i64)> {
    let caps = TIME_RANGE_RE.captures(s)?;
    let open_h: i64 = caps[1].parse().ok()?;
    let open_m: i64 = caps[2].parse().ok()?;
    let close_h: i64 = caps[3].parse().ok()?;
    let close_m: i64 = caps[4].parse().ok()?;
    Some((open_h * 60 + open_m, close_h * 60 + close_m))
}

/// True iff the POI can be visited starting at `start_min` for `visit_duration`
/// minutes on `day`: not closed, and arrival leaves enough time before close.
pub fn is_visitable(hours: &HashMap<Weekday, Option<String>>, day: Weekday, start_min: i64, visit_duration: i64) -> bool {
    match parse_opening_hours(hours, day).as_range() {
        None => false,
        Some((_, close_min)) => start_min <= close_min - visit_duration,
    }
}

/// Urgency multiplier in `[0, 2]` favoring POIs whose remaining open window
/// is narrow. `0` means the POI is no longer visitable from `now_min`.
pub fn urgency(hours: &HashMap<Weekday, Option<String>>, day: Weekday, now_min: i64, visit_duration: i64) -> f64 {
    let Some((_, close_min)) = parse_opening_hours(hours, day).as_range() else {
        return 0.0;
    };
    if close_min >= 1440 {
        // AlwaysOpen normalizes to (0, 1440); a Range that happens to span a
        // full day or more behaves the same way.
        return 1.0;
    }
    let time_until_close = close_min - now_min;
    if time_until_close <= visit_duration {
        return 0.0;
    }
    let slack = time_until_close - visit_duration;
    if slack <= 30 {
        2.0
    } else if slack >= 180 {
        1.0
    } else {
        let raw = 2.0 - ((slack - 30) as f64 / 150.0);
        raw.clamp(1.0, 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hours_map(entries: &[(Weekday, Option<&str>)]) -> HashMap<Weekday, Option<String>> {
        entries
            .iter()
            .map(|(d, v)| (*d, v.map(str::to_string)))
            .collect()
    }

    #[test]
    fn missing_entry_is_always_open() {
        let hours = hours_map(&[]);
        assert_eq!(parse_opening_hours(&hours, Weekday::Monday), Hours::AlwaysOpen);
    }

    #[test]
    fn null_entry_is_always_open() {
        let hours = hours_map(&[(Weekday::Monday, None)]);
        assert_eq!(parse_opening_hours(&hours, Weekday::Monday), Hours::AlwaysOpen);
    }

    #[test]
    fn twenty_four_hours_variants() {
        let hours = hours_map(&[(Weekday::Monday, Some("Open 24 hours"))]);
        assert_eq!(parse_opening_hours(&hours, Weekday::Monday), Hours::AlwaysOpen);
        let hours = hours_map(&[(Weekday::Monday, Some("Abierto 24 horas"))]);
        assert_eq!(parse_opening_hours(&hours, Weekday::Monday), Hours::AlwaysOpen);
    }

    #[test]
    fn closed_variants() {
        let hours = hours_map(&[(Weekday::Monday, Some("Closed"))]);
        assert_eq!(parse_opening_hours(&hours, Weekday::Monday), Hours::Closed);
        let hours = hours_map(&[(Weekday::Monday, Some("Cerrado"))]);
        assert_eq!(parse_opening_hours(&hours, Weekday::Monday), Hours::Closed);
    }

    #[test]
    fn ascii_hyphen_range() {
        let hours = hours_map(&[(Weekday::Monday, Some("09:00-18:00"))]);
        assert_eq!(
            parse_opening_hours(&hours, Weekday::Monday),
            Hours::Range { open_min: 540, close_min: 1080 }
        );
    }

    #[test]
    fn en_dash_and_em_dash_ranges() {
        let hours = hours_map(&[(Weekday::Monday, Some("09:00\u{2013}18:00"))]);
        assert_eq!(
            parse_opening_hours(&hours, Weekday::Monday),
            Hours::Range { open_min: 540, close_min: 1080 }
        );
        let hours = hours_map(&[(Weekday::Monday, Some("09:00\u{2014}18:00"))]);
        assert_eq!(
            parse_opening_hours(&hours, Weekday::Monday),
            Hours::Range { open_min: 540, close_min: 1080 }
        );
    }

    #[test]
    fn crosses_midnight() {
        let hours = hours_map(&[(Weekday::Monday, Some("22:00-02:00"))]);
        assert_eq!(
            parse_opening_hours(&hours, Weekday::Monday),
            Hours::Range { open_min: 1320, close_min: 1560 }
        );
    }

    #[test]
    fn unparseable_falls_back_to_always_open() {
        let hours = hours_map(&[(Weekday::Monday, Some("ask the front desk"))]);
        assert_eq!(parse_opening_hours(&hours, Weekday::Monday), Hours::AlwaysOpen);
    }

    #[test]
    fn is_visitable_respects_closing_minus_duration() {
        let hours = hours_map(&[(Weekday::Monday, Some("09:00-10:00"))]);
        assert!(is_visitable(&hours, Weekday::Monday, 540, 60));
        assert!(!is_visitable(&hours, Weekday::Monday, 541, 60));
    }

    #[test]
    fn is_visitable_false_when_closed() {
        let hours = hours_map(&[(Weekday::Monday, Some("Closed"))]);
        assert!(!is_visitable(&hours, Weekday::Monday, 540, 60));
    }

    #[test]
    fn urgency_always_open_is_one() {
        let hours = hours_map(&[(Weekday::Monday, None)]);
        assert_eq!(urgency(&hours, Weekday::Monday, 540, 60), 1.0);
    }

    #[test]
    fn urgency_zero_when_not_visitable() {
        let hours = hours_map(&[(Weekday::Monday, Some("09:00-10:00"))]);
        assert_eq!(urgency(&hours, Weekday::Monday, 950, 60), 0.0);
    }

    #[test]
    fn urgency_maxes_out_under_tight_slack() {
        // Closes at 18:00 (1080), now 960, duration 60 -> slack = 1080-960-60=60... adjust
        let hours = hours_map(&[(Weekday::Monday, Some("09:00-18:00"))]);
        // slack = (1080 - 1010) - 60 = 10 <= 30 -> urgency 2.0
        assert_eq!(urgency(&hours, Weekday::Monday, 1010, 60), 2.0);
    }

    #[test]
    fn urgency_is_one_with_ample_slack() {
        let hours = hours_map(&[(Weekday::Monday, Some("09:00-22:00"))]);
        // slack = (1320 - 540) - 60 = 720 >= 180 -> urgency 1.0
        assert_eq!(urgency(&hours, Weekday::Monday, 540, 60), 1.0);
    }

    #[test]
    fn urgency_interpolates_linearly() {
        let hours = hours_map(&[(Weekday::Monday, Some("09:00-18:00"))]);
        // close=1080, duration=60, pick now so slack=105 (midpoint of 30..180)
        // time_until_close = slack + duration = 165, now = 1080-165=915
        let u = urgency(&hours, Weekday::Monday, 915, 60);
        let expected = 2.0 - ((105.0 - 30.0) / 150.0);
        assert!((u - expected).abs() < 1e-9);
    }
}
