// src/pipeline/normalize.rs

//! Normalization and deduplication of one day's raw batches.

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{Config, SourceBatches};
use crate::observer::Observer;
use crate::services::{Deduplicator, filter, normalize_all};
use crate::storage::{NoticeStorage, ProcessedKind};

/// Outcome of a normalize run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeSummary {
    pub day: NaiveDate,
    /// Records read, before the BOAMP filters
    pub raw_count: usize,
    pub normalized_count: usize,
    pub deduped_count: usize,
    pub normalized_key: String,
    pub deduped_key: String,
}

/// Load the raw batches of `day`, normalize, deduplicate and save both results.
pub async fn run_normalize(
    config: &Config,
    storage: &dyn NoticeStorage,
    day: NaiveDate,
    observer: &dyn Observer,
) -> Result<NormalizeSummary> {
    let batches = storage.load_batches(day).await?;
    let raw_count = batches.len();
    log::info!(
        "Loaded {} BOAMP, {} AWS, {} Maximilien records for {day}",
        batches.boamp.len(),
        batches.aws.len(),
        batches.maximilien.len()
    );

    let batches = SourceBatches {
        boamp: filter::select_boamp(batches.boamp, &config.filter, day, observer),
        ..batches
    };

    let normalized = normalize_all(
        &batches,
        config.normalize.aws_department.as_deref(),
        observer,
    );
    let normalized_key = storage
        .save_processed(ProcessedKind::Normalized, day, &normalized)
        .await?;
    let normalized_count = normalized.len();

    let deduped = Deduplicator::new(config.dedup.clone()).deduplicate(normalized, observer);
    let deduped_key = storage
        .save_processed(ProcessedKind::Deduped, day, &deduped)
        .await?;

    Ok(NormalizeSummary {
        day,
        raw_count,
        normalized_count,
        deduped_count: deduped.len(),
        normalized_key,
        deduped_key,
    })
}
