//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Normalization settings
    #[serde(default)]
    pub normalize: NormalizeConfig,

    /// Duplicate merging heuristics
    #[serde(default)]
    pub dedup: DedupConfig,

    /// BOAMP pre-selection rules
    #[serde(default)]
    pub filter: FilterConfig,

    /// Batch and feed locations, relative to the data directory
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if let Some(dept) = &self.normalize.aws_department {
            if !is_department_code(dept) {
                return Err(AppError::validation(format!(
                    "normalize.aws_department '{dept}' is not a department code"
                )));
            }
        }
        let threshold = self.dedup.similarity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(AppError::validation(
                "dedup.similarity_threshold must be in (0, 1]",
            ));
        }
        if self.filter.enabled {
            if self.filter.target_departments.is_empty() {
                return Err(AppError::validation("No target departments defined"));
            }
            if let Some(bad) = self
                .filter
                .target_departments
                .iter()
                .find(|d| !is_department_code(d))
            {
                return Err(AppError::validation(format!(
                    "filter.target_departments contains '{bad}'"
                )));
            }
            if self.filter.max_age_days <= 0 {
                return Err(AppError::validation("filter.max_age_days must be > 0"));
            }
        }
        if self.paths.raw_dir.trim().is_empty() || self.paths.processed_dir.trim().is_empty() {
            return Err(AppError::validation("paths.raw_dir and paths.processed_dir are required"));
        }
        if self.paths.feed_file.trim().is_empty() {
            return Err(AppError::validation("paths.feed_file is empty"));
        }
        Ok(())
    }
}

fn is_department_code(code: &str) -> bool {
    (2..=3).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Department the marches-publics.info search was run for
    #[serde(default = "defaults::aws_department")]
    pub aws_department: Option<String>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            aws_department: defaults::aws_department(),
        }
    }
}

/// Duplicate merging heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Minimum title token-set Jaccard similarity against the group's first member
    #[serde(default = "defaults::similarity_threshold")]
    pub similarity_threshold: f64,

    /// When set, deadlines no longer need to match exactly: every member must
    /// fall within this many days of the first member's deadline
    #[serde(default)]
    pub deadline_tolerance_days: Option<u32>,

    /// Words ignored when comparing titles
    #[serde(default = "defaults::title_stop_words")]
    pub title_stop_words: Vec<String>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: defaults::similarity_threshold(),
            deadline_tolerance_days: None,
            title_stop_words: defaults::title_stop_words(),
        }
    }
}

/// BOAMP pre-selection rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Apply the filters before normalization
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Keep only service markets
    #[serde(default = "defaults::enabled")]
    pub services_only: bool,

    /// Department codes to keep
    #[serde(default = "defaults::target_departments")]
    pub target_departments: Vec<String>,

    /// Maximum publication age in days
    #[serde(default = "defaults::max_age_days")]
    pub max_age_days: i64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            services_only: defaults::enabled(),
            target_departments: defaults::target_departments(),
            max_age_days: defaults::max_age_days(),
        }
    }
}

/// Batch and feed locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Raw per-source batches written by the fetchers
    #[serde(default = "defaults::raw_dir")]
    pub raw_dir: String,

    /// Normalized and deduplicated batches
    #[serde(default = "defaults::processed_dir")]
    pub processed_dir: String,

    /// Published feed
    #[serde(default = "defaults::feed_file")]
    pub feed_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: defaults::raw_dir(),
            processed_dir: defaults::processed_dir(),
            feed_file: defaults::feed_file(),
        }
    }
}

mod defaults {
    // Normalize defaults
    pub fn aws_department() -> Option<String> {
        Some("95".into())
    }

    // Dedup defaults
    pub fn similarity_threshold() -> f64 {
        0.85
    }
    pub fn title_stop_words() -> Vec<String> {
        [
            "a", "au", "aux", "d", "de", "des", "du", "en", "et", "l", "la", "le", "les", "pour",
            "sur", "un", "une",
        ]
        .iter()
        .map(|w| w.to_string())
        .collect()
    }

    // Filter defaults
    pub fn enabled() -> bool {
        true
    }
    pub fn target_departments() -> Vec<String> {
        vec!["78".into(), "92".into(), "95".into()]
    }
    pub fn max_age_days() -> i64 {
        120
    }

    // Path defaults
    pub fn raw_dir() -> String {
        "raw".into()
    }
    pub fn processed_dir() -> String {
        "processed".into()
    }
    pub fn feed_file() -> String {
        "web/feed.json".into()
    }
}
