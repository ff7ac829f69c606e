// src/services/filter.rs

//! BOAMP pre-selection.
//!
//! The BOAMP dataset is national and covers every market type; these
//! predicates keep recent, still-open service markets in the target
//! departments before normalization.

use chrono::{NaiveDate, TimeDelta};

use crate::models::{BoampRecord, FilterConfig};
use crate::observer::{Observer, PipelineEvent};
use crate::utils::date::parse_leading_date;

/// Market type fields checked for "SERVICE".
const MARKET_TYPE_FIELDS: [&str; 2] = ["type_marche", "type_marche_facette"];

/// Whether the record is a service market.
pub fn is_services_market(record: &BoampRecord) -> bool {
    MARKET_TYPE_FIELDS.iter().any(|key| {
        record
            .raw_str(key)
            .is_some_and(|value| value.to_uppercase().contains("SERVICE"))
    })
}

/// Whether the record's department is one of `targets`.
///
/// A full postal code is reduced to its first two digits.
pub fn is_in_target_departments(record: &BoampRecord, targets: &[String]) -> bool {
    let Some(code) = record.department.as_deref().map(str::trim) else {
        return false;
    };
    let code = match code.get(..2) {
        Some(head) if head.chars().all(|c| c.is_ascii_digit()) => head,
        _ => code,
    };
    targets.iter().any(|t| t == code)
}

/// Published within `max_age_days` of `today` and deadline not passed.
///
/// Missing or unparsable dates reject the record. An age reaching past the
/// calendar range sets no lower bound.
pub fn is_recent_and_open(record: &BoampRecord, today: NaiveDate, max_age_days: i64) -> bool {
    let oldest = TimeDelta::try_days(max_age_days).and_then(|age| today.checked_sub_signed(age));

    let published = record.publication_date.as_deref().and_then(parse_leading_date);
    if !published.is_some_and(|d| oldest.is_none_or(|oldest| d >= oldest)) {
        return false;
    }

    let deadline = record
        .application_deadline
        .as_deref()
        .and_then(parse_leading_date);
    deadline.is_some_and(|d| d >= today)
}

/// Apply the enabled filters in order, reporting each step.
pub fn select_boamp(
    records: Vec<BoampRecord>,
    config: &FilterConfig,
    today: NaiveDate,
    observer: &dyn Observer,
) -> Vec<BoampRecord> {
    if !config.enabled {
        return records;
    }

    let mut records = records;
    if config.services_only {
        records = apply(records, "services", observer, is_services_market);
    }
    records = apply(records, "departments", observer, |r| {
        is_in_target_departments(r, &config.target_departments)
    });
    apply(records, "recent_open", observer, |r| {
        is_recent_and_open(r, today, config.max_age_days)
    })
}

fn apply(
    records: Vec<BoampRecord>,
    step: &'static str,
    observer: &dyn Observer,
    keep: impl Fn(&BoampRecord) -> bool,
) -> Vec<BoampRecord> {
    let before = records.len();
    let kept: Vec<BoampRecord> = records.into_iter().filter(|r| keep(r)).collect();
    observer.observe(PipelineEvent::Filtered {
        step,
        before,
        after: kept.len(),
    });
    kept
}
