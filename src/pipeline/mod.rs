//! Pipeline entry points for feed operations.
//!
//! - `run_normalize`: Normalize and deduplicate one day's raw batches
//! - `run_publish`: Publish the latest deduplicated batch as the feed
//! - `run_pipeline`: Both, in order, stopping at the first failure
//! - `run_validate`: Check the configuration

pub mod normalize;
pub mod publish;
pub mod validate;

pub use normalize::{NormalizeSummary, run_normalize};
pub use publish::{PublishSummary, run_publish};
pub use validate::run_validate;

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::Config;
use crate::observer::Observer;
use crate::storage::NoticeStorage;

/// Run the full pipeline: normalize then publish.
pub async fn run_pipeline(
    config: &Config,
    storage: &dyn NoticeStorage,
    day: NaiveDate,
    observer: &dyn Observer,
) -> Result<(NormalizeSummary, PublishSummary)> {
    log::info!("Step 1/2: Normalizing and deduplicating {day}...");
    let normalized = run_normalize(config, storage, day, observer)
        .await
        .inspect_err(|e| log::error!("Normalize step failed: {e}. Stopping pipeline."))?;

    log::info!("Step 2/2: Publishing feed...");
    let published = run_publish(storage)
        .await
        .inspect_err(|e| log::error!("Publish step failed: {e}. Stopping pipeline."))?;
    if published.source_key != normalized.deduped_key {
        log::warn!(
            "Feed built from {}, which is newer than the {} batch just written to {}",
            published.source_key,
            day,
            normalized.deduped_key
        );
    }

    log::info!(
        "Pipeline complete: {} raw -> {} normalized -> {} published",
        normalized.raw_count,
        normalized.normalized_count,
        published.notice_count
    );
    Ok((normalized, published))
}
