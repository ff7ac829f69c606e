// src/utils/date.rs

//! Date-format adapters for the source notice formats.
//!
//! Every parser returns `None` on malformed input; callers decide how to
//! report the degradation.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;

static HOUR_MINUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})\s*[hH:]\s*(\d{2})?$").unwrap());

/// Offset-free ISO-8601 layouts, `T` or space separated.
const NAIVE_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%MZ",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// ISO-8601 layouts with a numeric offset that RFC 3339 rejects.
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M%:z", "%Y-%m-%d %H:%M%:z"];

/// Parse an ISO-8601 timestamp, keeping the wall-clock time it was written in.
///
/// Offsets (`+01:00`, `Z`) are accepted but not applied. Seconds and
/// fractions are optional, and a bare `YYYY-MM-DD` reads as midnight.
pub fn parse_iso_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(raw, fmt).ok())
    {
        return Some(dt.naive_local());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Split a deadline timestamp into its date and its `HH:MM` time.
///
/// `"2025-12-15T12:00:00+01:00"` gives `2025-12-15` and `12:00`.
pub fn split_datetime(raw: &str) -> Option<(NaiveDate, NaiveTime)> {
    parse_iso_datetime(raw).map(|dt| (dt.date(), truncate_to_minute(dt.time())))
}

/// Parse an ISO calendar date, or the date part of an ISO timestamp.
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_iso_datetime(raw).map(|dt| dt.date()))
}

/// Parse a day-first date with a two-digit year (`"18/12/24"`).
pub fn parse_short_fr_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%d/%m/%y").ok()
}

/// Parse a French hour notation: `"16h00"`, `"16h"`, `"16:00"`.
pub fn parse_hour_minute(raw: &str) -> Option<NaiveTime> {
    let caps = HOUR_MINUTE.captures(raw.trim())?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Lenient date reading used by filters: a timestamp containing `T` is
/// parsed as ISO-8601, anything else by its first ten characters.
pub fn parse_leading_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.contains('T') {
        return parse_iso_datetime(raw).map(|dt| dt.date());
    }
    raw.get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
}

/// Drop seconds and sub-seconds.
pub fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}
