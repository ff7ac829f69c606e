//! Storage abstractions for batch and feed persistence.
//!
//! ## Directory Structure
//!
//! ```text
//! data/
//! ├── raw/                          # Per-source batches from the fetchers
//! │   ├── boamp/boamp_YYYYMMDD.json
//! │   ├── aws/aws_YYYYMMDD.json
//! │   └── maximilien/maximilien_YYYYMMDD.json
//! ├── processed/
//! │   ├── normalized_YYYYMMDD.json  # All sources, one schema
//! │   └── deduped_YYYYMMDD.json     # After duplicate merging
//! └── web/feed.json                 # Published feed
//! ```

pub mod local;

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{Feed, Notice, SourceBatches};

// Re-export for convenience
pub use local::LocalStorage;

/// Kind of processed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessedKind {
    /// Normalized notices from every source
    Normalized,
    /// Normalized notices after duplicate merging
    Deduped,
}

impl ProcessedKind {
    /// File name prefix of the batch.
    pub fn prefix(&self) -> &'static str {
        match self {
            ProcessedKind::Normalized => "normalized",
            ProcessedKind::Deduped => "deduped",
        }
    }
}

impl fmt::Display for ProcessedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Trait for feed storage backends.
#[async_trait]
pub trait NoticeStorage: Send + Sync {
    /// Load the raw batches of one day. Missing sources yield empty batches.
    async fn load_batches(&self, day: NaiveDate) -> Result<SourceBatches>;

    /// Save raw batches for one day, one file per source.
    async fn save_batches(&self, day: NaiveDate, batches: &SourceBatches) -> Result<()>;

    /// Save a processed batch. Returns the key written.
    async fn save_processed(
        &self,
        kind: ProcessedKind,
        day: NaiveDate,
        notices: &[Notice],
    ) -> Result<String>;

    /// Load a processed batch, `None` if it does not exist.
    async fn load_processed(&self, kind: ProcessedKind, day: NaiveDate)
    -> Result<Option<Vec<Notice>>>;

    /// Days for which a processed batch exists, oldest first.
    async fn processed_days(&self, kind: ProcessedKind) -> Result<Vec<NaiveDate>>;

    /// Most recent deduplicated batch with its key.
    async fn load_latest_deduped(&self) -> Result<Option<(String, Vec<Notice>)>>;

    /// Write the published feed. Returns the key written.
    async fn write_feed(&self, feed: &Feed) -> Result<String>;

    /// Load the published feed, `None` if never published.
    async fn load_feed(&self) -> Result<Option<Feed>>;
}
