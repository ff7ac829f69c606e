//! Canonical notice data structures.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Collector that produced a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// BOAMP open-data tender API
    Boamp,
    /// marches-publics.info result listing
    Aws,
    /// Maximilien regional marketplace
    Maximilien,
}

impl Source {
    /// All sources, in normalization order.
    pub const ALL: [Source; 3] = [Source::Boamp, Source::Aws, Source::Maximilien];

    /// Serialized name of the source.
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Boamp => "boamp",
            Source::Aws => "aws",
            Source::Maximilien => "maximilien",
        }
    }

    /// Rank used to pick the representative of a merged group (higher wins).
    pub fn priority(&self) -> u8 {
        match self {
            Source::Boamp => 3,
            Source::Maximilien => 2,
            Source::Aws => 1,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field names of [`Notice`] that `extra` may never carry.
pub const RESERVED_FIELDS: &[&str] = &[
    "source",
    "source_notice_id",
    "reference",
    "title",
    "description",
    "buyer_name",
    "department",
    "city",
    "postal_code",
    "publication_date",
    "deadline_date",
    "deadline_time",
    "url",
    "estimated_budget",
    "estimated_budget_raw",
    "extra",
];

/// Source-specific metadata attached to a notice.
///
/// Keys are kept sorted so serialized output is stable. Null values and
/// keys that collide with a first-class [`Notice`] field are never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, Value>",
    into = "BTreeMap<String, Value>"
)]
pub struct Extra(BTreeMap<String, Value>);

impl Extra {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value. Returns `false` when the key is reserved or the value is null.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        let key = key.into();
        let value = value.into();
        if value.is_null() || RESERVED_FIELDS.contains(&key.as_str()) {
            return false;
        }
        self.0.insert(key, value);
        true
    }

    /// Insert a value only when it is present.
    pub fn insert_opt<T: Into<Value>>(&mut self, key: &str, value: Option<T>) -> bool {
        match value {
            Some(v) => self.insert(key, v),
            None => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// String items of an array entry, e.g. `merged_sources`.
    pub fn strings(&self, key: &str) -> Vec<&str> {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<BTreeMap<String, Value>> for Extra {
    fn from(map: BTreeMap<String, Value>) -> Self {
        let mut extra = Extra::new();
        for (key, value) in map {
            extra.insert(key, value);
        }
        extra
    }
}

impl From<Extra> for BTreeMap<String, Value> {
    fn from(extra: Extra) -> Self {
        extra.0
    }
}

/// Source-independent representation of a tender notice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    /// Collector that produced the notice
    pub source: Source,

    /// Identifier, unique within `source` only
    pub source_notice_id: String,

    pub reference: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,

    /// Contracting authority
    pub buyer_name: Option<String>,
    /// Department code, e.g. "92"
    pub department: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,

    pub publication_date: Option<NaiveDate>,
    pub deadline_date: Option<NaiveDate>,
    /// Deadline wall-clock time, serialized as `HH:MM`
    #[serde(default, with = "hhmm")]
    pub deadline_time: Option<NaiveTime>,

    /// Link to the notice detail page
    pub url: Option<String>,

    #[serde(default)]
    pub estimated_budget: Option<f64>,
    /// Budget as printed by the source
    #[serde(default)]
    pub estimated_budget_raw: Option<String>,

    /// Source-specific metadata
    #[serde(default)]
    pub extra: Extra,
}

impl Notice {
    /// Create a notice carrying only its identity.
    pub fn new(source: Source, source_notice_id: impl Into<String>) -> Self {
        Self {
            source,
            source_notice_id: source_notice_id.into(),
            reference: None,
            title: None,
            description: None,
            buyer_name: None,
            department: None,
            city: None,
            postal_code: None,
            publication_date: None,
            deadline_date: None,
            deadline_time: None,
            url: None,
            estimated_budget: None,
            estimated_budget_raw: None,
            extra: Extra::new(),
        }
    }

    /// Strict identity of the notice within its source.
    pub fn identity(&self) -> (Source, &str) {
        (self.source, self.source_notice_id.as_str())
    }

    /// Identity rendered as `source:source_notice_id`.
    pub fn provenance_id(&self) -> String {
        format!("{}:{}", self.source, self.source_notice_id)
    }
}

/// Published feed consumed by the front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    /// UTC timestamp of the publish run
    pub generated_at: DateTime<Utc>,
    pub notices: Vec<Notice>,
}

impl Feed {
    /// Wrap notices with the current timestamp.
    pub fn new(notices: Vec<Notice>) -> Self {
        Self::at(Utc::now(), notices)
    }

    pub fn at(generated_at: DateTime<Utc>, notices: Vec<Notice>) -> Self {
        Self {
            generated_at,
            notices,
        }
    }
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => s.serialize_str(&t.format(FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|s| NaiveTime::parse_from_str(&s, FORMAT).map_err(D::Error::custom))
            .transpose()
    }
}
