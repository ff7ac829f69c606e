// src/pipeline/publish.rs

//! Feed publication.

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::Feed;
use crate::storage::{NoticeStorage, ProcessedKind};

/// Outcome of a publish run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSummary {
    /// Deduplicated batch the feed was built from
    pub source_key: String,
    pub feed_key: String,
    pub notice_count: usize,
    pub generated_at: DateTime<Utc>,
}

/// Wrap the most recent deduplicated batch into the published feed.
pub async fn run_publish(storage: &dyn NoticeStorage) -> Result<PublishSummary> {
    let Some((source_key, notices)) = storage.load_latest_deduped().await? else {
        log::error!("No {} batch found, run normalize first", ProcessedKind::Deduped);
        return Err(AppError::missing_batch(
            ProcessedKind::Deduped.prefix(),
            "no processed batch",
        ));
    };
    log::info!("Publishing {} notices from {source_key}", notices.len());

    let feed = Feed::new(notices);
    let feed_key = storage.write_feed(&feed).await?;
    log::info!("Feed written to {feed_key} (generated_at = {})", feed.generated_at);

    Ok(PublishSummary {
        source_key,
        feed_key,
        notice_count: feed.notices.len(),
        generated_at: feed.generated_at,
    })
}
