//! Raw notice shapes produced by the three collectors.
//!
//! These mirror the JSON batches written by the fetchers. Optional fields may
//! be missing, null or blank; normalization decides what survives.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::models::Source;
use crate::utils::date::{parse_iso_date, parse_iso_datetime, truncate_to_minute};

/// A notice from the BOAMP open-data API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoampRecord {
    /// Internal dataset record id
    #[serde(default, deserialize_with = "lenient::string")]
    pub record_id: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub reference: Option<String>,
    /// ISO date, e.g. "2025-11-19"
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub publication_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub buyer_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub department: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub postal_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub url: Option<String>,
    /// ISO timestamp with offset, e.g. "2025-12-15T12:00:00+01:00"
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub application_deadline: Option<String>,
    /// Untouched API fields
    #[serde(default)]
    pub raw_fields: Map<String, Value>,
}

impl BoampRecord {
    /// Build a record from an API result (`{"recordid": …, "fields": {…}}`).
    pub fn from_api_record(record: &Value) -> Result<Self> {
        let object = record
            .as_object()
            .ok_or_else(|| AppError::invalid_record("BOAMP record is not a JSON object"))?;
        let fields = object
            .get("fields")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        Ok(Self {
            record_id: object
                .get("recordid")
                .and_then(scalar_string)
                .unwrap_or_default(),
            title: first_field(&fields, &["objet", "intitule"]),
            reference: first_field(&fields, &["numeroad", "idweb"]),
            publication_date: first_field(&fields, &["dateparution"]),
            buyer_name: first_field(&fields, &["nom_acheteur", "nomacheteur"]),
            department: first_field(&fields, &["code_departement", "departement"]),
            city: first_field(&fields, &["ville"]),
            postal_code: first_field(&fields, &["code_postal", "codepostal"]),
            url: first_field(&fields, &["lien", "url", "url_avis"]),
            application_deadline: first_field(&fields, &["datelimitereponse"]),
            raw_fields: fields,
        })
    }

    /// String value of a raw API field.
    pub fn raw_str(&self, key: &str) -> Option<&str> {
        self.raw_fields.get(key).and_then(Value::as_str)
    }
}

/// First non-blank field among `keys`, stringified.
fn first_field(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find_map(scalar_string)
}

/// Strings and numbers as text; arrays yield their first usable item.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.iter().find_map(scalar_string),
        _ => None,
    }
}

/// A row of the marches-publics.info result listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AwsRecord {
    /// Market category, e.g. "SERVICES"
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub category: Option<String>,
    /// `DD/MM/YY`
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub publication_date: Option<String>,
    /// `DD/MM/YY`
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub deadline_date: Option<String>,
    /// e.g. "16h00"
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub deadline_time: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub buyer_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub buyer_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub reference: Option<String>,
    /// Market object, used as title
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub object: Option<String>,
    /// e.g. "[Marché alloti : 2 lots]"
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub lots_info: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub detail_url: Option<String>,
    /// Listing block kept for debugging
    #[serde(default, deserialize_with = "lenient::string")]
    pub raw_html: String,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub estimated_budget: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub estimated_budget_raw: Option<String>,
}

/// A date that upstream tooling may already have parsed, or left as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateValue {
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Text(String),
}

impl DateValue {
    /// Calendar date, if the value holds one.
    pub fn to_date(&self) -> Option<NaiveDate> {
        match self {
            DateValue::DateTime(dt) => Some(dt.date()),
            DateValue::Date(d) => Some(*d),
            DateValue::Text(s) => parse_iso_date(s),
        }
    }

    /// Calendar date and, when the value carries one, the `HH:MM` time.
    pub fn to_date_time(&self) -> Option<(NaiveDate, Option<NaiveTime>)> {
        match self {
            DateValue::DateTime(dt) => Some((dt.date(), Some(truncate_to_minute(dt.time())))),
            DateValue::Date(d) => Some((*d, None)),
            DateValue::Text(s) => match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
                Ok(d) => Some((d, None)),
                Err(_) => parse_iso_datetime(s)
                    .map(|dt| (dt.date(), Some(truncate_to_minute(dt.time())))),
            },
        }
    }

    /// Text form for diagnostics.
    pub fn display(&self) -> String {
        match self {
            DateValue::DateTime(dt) => dt.to_string(),
            DateValue::Date(d) => d.to_string(),
            DateValue::Text(s) => s.clone(),
        }
    }
}

/// A consultation from the Maximilien search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaximilienRecord {
    /// Numeric id taken from the consultation URL
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub source_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub reference: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub object: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub buyer: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub procedure: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub category: Option<String>,
    /// e.g. ["(78) Yvelines", "(92) Hauts-de-Seine"]
    #[serde(default, deserialize_with = "lenient::strings")]
    pub locations: Vec<String>,
    #[serde(default, deserialize_with = "lenient::opt_date")]
    pub published_at: Option<DateValue>,
    #[serde(default, deserialize_with = "lenient::opt_date")]
    pub deadline: Option<DateValue>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub url: Option<String>,
}

/// Any source record, tagged by its `source` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum SourceRecord {
    Boamp(BoampRecord),
    Aws(AwsRecord),
    Maximilien(MaximilienRecord),
}

impl SourceRecord {
    pub fn source(&self) -> Source {
        match self {
            SourceRecord::Boamp(_) => Source::Boamp,
            SourceRecord::Aws(_) => Source::Aws,
            SourceRecord::Maximilien(_) => Source::Maximilien,
        }
    }

    /// Decode a tagged record, rejecting a missing or unknown discriminant.
    pub fn from_value(value: Value) -> Result<Self> {
        match value.get("source") {
            None | Some(Value::Null) => {
                return Err(AppError::invalid_record("missing `source` discriminant"));
            }
            Some(Value::String(tag)) if Source::ALL.iter().any(|s| s.as_str() == tag.as_str()) => {}
            Some(other) => {
                return Err(AppError::invalid_record(format!("unknown source {other}")));
            }
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Decode one item of a per-source batch file.
    ///
    /// Untagged items take the batch's source; a tag that disagrees with it
    /// is rejected. BOAMP items still in the API shape (`recordid` +
    /// `fields`) are converted.
    pub fn from_batch_item(source: Source, value: Value) -> Result<Self> {
        if source == Source::Boamp && value.get("fields").is_some_and(Value::is_object) {
            return BoampRecord::from_api_record(&value).map(SourceRecord::Boamp);
        }

        let value = match value {
            Value::Object(mut map) => {
                map.entry("source")
                    .or_insert_with(|| Value::from(source.as_str()));
                Value::Object(map)
            }
            other => {
                return Err(AppError::invalid_record(format!(
                    "{source} batch item is not an object: {other}"
                )));
            }
        };

        let record = Self::from_value(value)?;
        if record.source() != source {
            return Err(AppError::invalid_record(format!(
                "{} record found in {source} batch",
                record.source()
            )));
        }
        Ok(record)
    }
}

/// Field readers that accept what the scrapers actually emit: numbers for
/// text fields, a single string for a list. Anything else reads as missing.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::DateValue;

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(text(Value::deserialize(deserializer)?).unwrap_or_default())
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(text(Value::deserialize(deserializer)?))
    }

    pub fn opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items.into_iter().filter_map(text).collect(),
            other => text(other).into_iter().collect(),
        })
    }

    pub fn opt_date<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateValue>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(serde_json::from_value(value.clone())
            .ok()
            .or_else(|| text(value).map(DateValue::Text)))
    }

    fn text(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Array(items) => items.into_iter().find_map(text),
            _ => None,
        }
    }
}

/// One run's records, grouped by source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceBatches {
    #[serde(default)]
    pub boamp: Vec<BoampRecord>,
    #[serde(default)]
    pub aws: Vec<AwsRecord>,
    #[serde(default)]
    pub maximilien: Vec<MaximilienRecord>,
}

impl SourceBatches {
    /// Split tagged records into per-source batches, keeping their order.
    pub fn from_records(records: impl IntoIterator<Item = SourceRecord>) -> Self {
        let mut batches = Self::default();
        for record in records {
            batches.push(record);
        }
        batches
    }

    pub fn push(&mut self, record: SourceRecord) {
        match record {
            SourceRecord::Boamp(r) => self.boamp.push(r),
            SourceRecord::Aws(r) => self.aws.push(r),
            SourceRecord::Maximilien(r) => self.maximilien.push(r),
        }
    }

    /// Number of records for one source.
    pub fn count(&self, source: Source) -> usize {
        match source {
            Source::Boamp => self.boamp.len(),
            Source::Aws => self.aws.len(),
            Source::Maximilien => self.maximilien.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.boamp.len() + self.aws.len() + self.maximilien.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
