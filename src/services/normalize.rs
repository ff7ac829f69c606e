// src/services/normalize.rs

//! Source record normalization.
//!
//! One pure mapping per source variant. A malformed sub-field is dropped and
//! reported to the observer; the record itself is always kept.

use chrono::{NaiveDate, NaiveTime};

use crate::models::{
    AwsRecord, BoampRecord, Extra, MaximilienRecord, Notice, Source, SourceBatches, SourceRecord,
};
use crate::observer::{Observer, PipelineEvent};
use crate::utils::date::{parse_hour_minute, parse_iso_date, parse_short_fr_date, split_datetime};
use crate::utils::text::{clean, parse_amount, parenthesized_code};

/// Raw BOAMP fields promoted into `extra`.
const BOAMP_EXTRA_FIELDS: [&str; 3] = ["type_marche", "descripteur_libelle", "etat"];

/// Map a BOAMP API record.
pub fn normalize_boamp(record: &BoampRecord, observer: &dyn Observer) -> Notice {
    let reference = clean(record.reference.as_deref());
    let id = reference.clone().unwrap_or_else(|| record.record_id.clone());
    let report = Reporter::new(observer, Source::Boamp, &id);

    let objet = clean(record.raw_str("objet"));
    let title = clean(record.title.as_deref()).or_else(|| objet.clone());
    let description = objet.or_else(|| title.clone());

    let publication_date = clean(record.publication_date.as_deref())
        .and_then(|raw| report.check("publication_date", &raw, parse_iso_date(&raw)));

    let (deadline_date, deadline_time) = clean(record.application_deadline.as_deref())
        .and_then(|raw| report.check("deadline", &raw, split_datetime(&raw)))
        .map_or((None, None), |(date, time)| (Some(date), Some(time)));

    let mut extra = Extra::new();
    for key in BOAMP_EXTRA_FIELDS {
        extra.insert_opt(key, record.raw_fields.get(key).cloned());
    }

    Notice {
        reference,
        title,
        description,
        buyer_name: clean(record.buyer_name.as_deref()),
        department: clean(record.department.as_deref()),
        city: clean(record.city.as_deref()),
        postal_code: clean(record.postal_code.as_deref()),
        publication_date,
        deadline_date,
        deadline_time,
        url: clean(record.url.as_deref()),
        extra,
        ..Notice::new(Source::Boamp, id)
    }
}

/// Map a marches-publics.info listing row.
///
/// The listing does not show the department, so the caller passes the one
/// the search was run for.
pub fn normalize_aws(
    record: &AwsRecord,
    department: Option<&str>,
    observer: &dyn Observer,
) -> Notice {
    let reference = clean(record.reference.as_deref());
    let detail_url = clean(record.detail_url.as_deref());
    let id = reference
        .clone()
        .or_else(|| detail_url.clone())
        .unwrap_or_default();
    let report = Reporter::new(observer, Source::Aws, &id);

    let object = clean(record.object.as_deref());

    let publication_date = clean(record.publication_date.as_deref())
        .and_then(|raw| report.check("publication_date", &raw, parse_short_fr_date(&raw)));
    let deadline_date = clean(record.deadline_date.as_deref())
        .and_then(|raw| report.check("deadline_date", &raw, parse_short_fr_date(&raw)));
    let deadline_time = clean(record.deadline_time.as_deref())
        .and_then(|raw| report.check("deadline_time", &raw, parse_hour_minute(&raw)));

    let estimated_budget_raw = clean(record.estimated_budget_raw.as_deref());
    let estimated_budget = record.estimated_budget.or_else(|| {
        estimated_budget_raw
            .as_deref()
            .and_then(|raw| report.check("estimated_budget", raw, parse_amount(raw)))
    });

    let mut extra = Extra::new();
    extra.insert_opt("category", clean(record.category.as_deref()));
    extra.insert_opt("lots_info", clean(record.lots_info.as_deref()));
    extra.insert_opt("buyer_code", clean(record.buyer_code.as_deref()));

    Notice {
        title: object.clone().or_else(|| reference.clone()),
        description: object,
        reference,
        buyer_name: clean(record.buyer_name.as_deref()),
        department: clean(department),
        publication_date,
        deadline_date,
        deadline_time,
        url: detail_url,
        estimated_budget,
        estimated_budget_raw,
        extra,
        ..Notice::new(Source::Aws, id)
    }
}

/// Map a Maximilien consultation.
pub fn normalize_maximilien(record: &MaximilienRecord, observer: &dyn Observer) -> Notice {
    let reference = clean(record.reference.as_deref());
    let id = clean(record.source_id.as_deref())
        .or_else(|| reference.clone())
        .unwrap_or_default();
    let report = Reporter::new(observer, Source::Maximilien, &id);

    let publication_date = record
        .published_at
        .as_ref()
        .and_then(|value| report.check("publication_date", &value.display(), value.to_date()));

    let (deadline_date, deadline_time): (Option<NaiveDate>, Option<NaiveTime>) = record
        .deadline
        .as_ref()
        .and_then(|value| report.check("deadline", &value.display(), value.to_date_time()))
        .map_or((None, None), |(date, time)| (Some(date), time));

    let department = record.locations.first().and_then(|l| parenthesized_code(l));

    let mut extra = Extra::new();
    extra.insert_opt("procedure", clean(record.procedure.as_deref()));
    extra.insert_opt("category", clean(record.category.as_deref()));
    if !record.locations.is_empty() {
        extra.insert("raw_locations", record.locations.clone());
    }

    Notice {
        reference,
        title: clean(record.title.as_deref()),
        description: clean(record.object.as_deref()),
        buyer_name: clean(record.buyer.as_deref()),
        department,
        publication_date,
        deadline_date,
        deadline_time,
        url: clean(record.url.as_deref()),
        extra,
        ..Notice::new(Source::Maximilien, id)
    }
}

/// Map any tagged record.
pub fn normalize_record(
    record: &SourceRecord,
    aws_department: Option<&str>,
    observer: &dyn Observer,
) -> Notice {
    match record {
        SourceRecord::Boamp(r) => normalize_boamp(r, observer),
        SourceRecord::Aws(r) => normalize_aws(r, aws_department, observer),
        SourceRecord::Maximilien(r) => normalize_maximilien(r, observer),
    }
}

/// Normalize every batch, BOAMP first, then AWS, then Maximilien.
pub fn normalize_all(
    batches: &SourceBatches,
    aws_department: Option<&str>,
    observer: &dyn Observer,
) -> Vec<Notice> {
    let mut notices = Vec::with_capacity(batches.len());
    notices.extend(batches.boamp.iter().map(|r| normalize_boamp(r, observer)));
    notices.extend(
        batches
            .aws
            .iter()
            .map(|r| normalize_aws(r, aws_department, observer)),
    );
    notices.extend(
        batches
            .maximilien
            .iter()
            .map(|r| normalize_maximilien(r, observer)),
    );

    observer.observe(PipelineEvent::Normalized {
        boamp: batches.boamp.len(),
        aws: batches.aws.len(),
        maximilien: batches.maximilien.len(),
        total: notices.len(),
    });
    notices
}

/// Reports dropped fields for one record.
struct Reporter<'a> {
    observer: &'a dyn Observer,
    source: Source,
    notice_id: &'a str,
}

impl<'a> Reporter<'a> {
    fn new(observer: &'a dyn Observer, source: Source, notice_id: &'a str) -> Self {
        Self {
            observer,
            source,
            notice_id,
        }
    }

    /// Pass `parsed` through, reporting `raw` when it is `None`.
    fn check<T>(&self, field: &'static str, raw: &str, parsed: Option<T>) -> Option<T> {
        if parsed.is_none() {
            self.observer.observe(PipelineEvent::FieldDegraded {
                source: self.source,
                notice_id: self.notice_id.to_string(),
                field,
                raw: raw.to_string(),
            });
        }
        parsed
    }
}
