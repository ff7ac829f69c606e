//! Utility functions and helpers.

pub mod date;
pub mod text;

use chrono::NaiveDate;

/// Compact `YYYYMMDD` suffix used in batch file names.
pub fn day_suffix(day: NaiveDate) -> String {
    day.format("%Y%m%d").to_string()
}

/// Parse a `YYYYMMDD` suffix back into a date.
pub fn parse_day_suffix(suffix: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(suffix, "%Y%m%d").ok()
}
