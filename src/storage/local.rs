//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── config.toml
//! ├── {raw_dir}/{source}/{source}_YYYYMMDD.json
//! ├── {processed_dir}/{kind}_YYYYMMDD.json
//! └── {feed_file}
//! ```
//!
//! Directory names come from [`PathsConfig`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{Feed, Notice, PathsConfig, Source, SourceBatches, SourceRecord};
use crate::storage::{NoticeStorage, ProcessedKind};
use crate::utils::{day_suffix, parse_day_suffix};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    paths: PathsConfig,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>, paths: PathsConfig) -> Self {
        Self {
            root_dir: root_dir.into(),
            paths,
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Key of a raw batch.
    fn batch_key(&self, source: Source, day: NaiveDate) -> String {
        format!(
            "{}/{source}/{source}_{}.json",
            self.paths.raw_dir,
            day_suffix(day)
        )
    }

    /// Key of a processed batch.
    fn processed_key(&self, kind: ProcessedKind, day: NaiveDate) -> String {
        format!("{}/{kind}_{}.json", self.paths.processed_dir, day_suffix(day))
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl NoticeStorage for LocalStorage {
    async fn load_batches(&self, day: NaiveDate) -> Result<SourceBatches> {
        let mut batches = SourceBatches::default();

        for source in Source::ALL {
            let key = self.batch_key(source, day);
            let Some(items) = self.read_json::<Vec<Value>>(&key).await? else {
                log::warn!("No {source} batch at {key}, continuing with an empty batch");
                continue;
            };

            log::debug!("Loaded {} {source} records from {key}", items.len());
            for (position, item) in items.into_iter().enumerate() {
                match SourceRecord::from_batch_item(source, item) {
                    Ok(record) => batches.push(record),
                    Err(AppError::Json(e)) => {
                        log::warn!("Skipping unreadable {source} record #{position} in {key}: {e}");
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(batches)
    }

    async fn save_batches(&self, day: NaiveDate, batches: &SourceBatches) -> Result<()> {
        self.write_json(&self.batch_key(Source::Boamp, day), &batches.boamp)
            .await?;
        self.write_json(&self.batch_key(Source::Aws, day), &batches.aws)
            .await?;
        self.write_json(&self.batch_key(Source::Maximilien, day), &batches.maximilien)
            .await?;
        Ok(())
    }

    async fn save_processed(
        &self,
        kind: ProcessedKind,
        day: NaiveDate,
        notices: &[Notice],
    ) -> Result<String> {
        let key = self.processed_key(kind, day);
        self.write_json(&key, notices).await?;
        log::info!("{} notices written to {key}", notices.len());
        Ok(key)
    }

    async fn load_processed(
        &self,
        kind: ProcessedKind,
        day: NaiveDate,
    ) -> Result<Option<Vec<Notice>>> {
        self.read_json(&self.processed_key(kind, day)).await
    }

    async fn processed_days(&self, kind: ProcessedKind) -> Result<Vec<NaiveDate>> {
        let dir = self.path(&self.paths.processed_dir);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let prefix = format!("{kind}_");
        let mut days = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let day = name
                .to_str()
                .and_then(|n| n.strip_prefix(prefix.as_str()))
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(parse_day_suffix);
            if let Some(day) = day {
                days.push(day);
            }
        }

        days.sort();
        Ok(days)
    }

    async fn load_latest_deduped(&self) -> Result<Option<(String, Vec<Notice>)>> {
        let Some(day) = self.processed_days(ProcessedKind::Deduped).await?.pop() else {
            return Ok(None);
        };

        let key = self.processed_key(ProcessedKind::Deduped, day);
        let notices = self
            .read_json(&key)
            .await?
            .ok_or_else(|| AppError::missing_batch(ProcessedKind::Deduped.prefix(), &key))?;
        Ok(Some((key, notices)))
    }

    async fn write_feed(&self, feed: &Feed) -> Result<String> {
        let key = self.paths.feed_file.clone();
        self.write_json(&key, feed).await?;
        Ok(key)
    }

    async fn load_feed(&self) -> Result<Option<Feed>> {
        self.read_json(&self.paths.feed_file).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AwsRecord, BoampRecord, MaximilienRecord};
    use tempfile::TempDir;

    fn storage(tmp: &TempDir) -> LocalStorage {
        LocalStorage::new(tmp.path(), PathsConfig::default())
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, d).unwrap()
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp);

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!tmp.path().join("test.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp);

        let data = storage.read_bytes("nope.txt").await.unwrap();
        assert!(data.is_none());
    }

    #[tokio::test]
    async fn test_batch_layout_and_round_trip() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp);

        let batches = SourceBatches {
            boamp: vec![BoampRecord {
                record_id: "r1".to_string(),
                reference: Some("25-1".to_string()),
                ..BoampRecord::default()
            }],
            aws: vec![AwsRecord {
                reference: Some("AO-1".to_string()),
                ..AwsRecord::default()
            }],
            maximilien: vec![MaximilienRecord {
                source_id: Some("874".to_string()),
                ..MaximilienRecord::default()
            }],
        };
        storage.save_batches(day(1), &batches).await.unwrap();

        assert!(tmp.path().join("raw/boamp/boamp_20251201.json").exists());
        assert!(tmp.path().join("raw/aws/aws_20251201.json").exists());
        assert!(
            tmp.path()
                .join("raw/maximilien/maximilien_20251201.json")
                .exists()
        );

        let loaded = storage.load_batches(day(1)).await.unwrap();
        assert_eq!(loaded, batches);
    }

    #[tokio::test]
    async fn test_missing_batches_are_empty() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp);

        storage
            .write_bytes("raw/aws/aws_20251201.json", br#"[{"reference": "AO-1"}]"#)
            .await
            .unwrap();

        let loaded = storage.load_batches(day(1)).await.unwrap();
        assert_eq!(loaded.count(Source::Aws), 1);
        assert_eq!(loaded.count(Source::Boamp), 0);
        assert_eq!(loaded.count(Source::Maximilien), 0);
    }

    #[tokio::test]
    async fn test_malformed_batch_fails() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp);

        storage
            .write_bytes("raw/boamp/boamp_20251201.json", b"{not json")
            .await
            .unwrap();
        let err = storage.load_batches(day(1)).await.unwrap_err();
        assert!(matches!(err, AppError::Json(_)));

        storage
            .write_bytes("raw/boamp/boamp_20251201.json", br#"[{"source": "aws"}]"#)
            .await
            .unwrap();
        let err = storage.load_batches(day(1)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRecord(_)));
    }

    #[tokio::test]
    async fn test_unreadable_record_skipped() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp);

        storage
            .write_bytes(
                "raw/aws/aws_20251201.json",
                br#"[{"reference": "AO-1"}, {"reference": 12345, "estimated_budget": "9000"}]"#,
            )
            .await
            .unwrap();
        storage
            .write_bytes(
                "raw/boamp/boamp_20251201.json",
                br#"[{"record_id": "r1", "raw_fields": "oops"}, {"record_id": "r2"}]"#,
            )
            .await
            .unwrap();

        let loaded = storage.load_batches(day(1)).await.unwrap();
        assert_eq!(loaded.count(Source::Aws), 2);
        assert_eq!(loaded.aws[1].reference.as_deref(), Some("12345"));
        assert_eq!(loaded.aws[1].estimated_budget, Some(9000.0));
        assert_eq!(loaded.count(Source::Boamp), 1);
        assert_eq!(loaded.boamp[0].record_id, "r2");
    }

    #[tokio::test]
    async fn test_latest_deduped() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp);
        assert!(storage.load_latest_deduped().await.unwrap().is_none());

        let older = vec![Notice::new(Source::Aws, "old")];
        let newer = vec![Notice::new(Source::Boamp, "new")];
        storage
            .save_processed(ProcessedKind::Deduped, day(2), &newer)
            .await
            .unwrap();
        storage
            .save_processed(ProcessedKind::Deduped, day(1), &older)
            .await
            .unwrap();
        storage
            .save_processed(ProcessedKind::Normalized, day(3), &older)
            .await
            .unwrap();
        storage
            .write_bytes("processed/deduped_latest.json", b"[]")
            .await
            .unwrap();

        let (key, notices) = storage.load_latest_deduped().await.unwrap().unwrap();
        assert_eq!(key, "processed/deduped_20251202.json");
        assert_eq!(notices, newer);

        assert_eq!(
            storage.processed_days(ProcessedKind::Deduped).await.unwrap(),
            vec![day(1), day(2)]
        );
    }

    #[tokio::test]
    async fn test_feed_round_trip() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp);
        assert!(storage.load_feed().await.unwrap().is_none());

        let feed = Feed::new(vec![Notice::new(Source::Maximilien, "874")]);
        let key = storage.write_feed(&feed).await.unwrap();
        assert_eq!(key, "web/feed.json");

        let loaded = storage.load_feed().await.unwrap().unwrap();
        assert_eq!(loaded, feed);
    }

    #[tokio::test]
    async fn test_custom_paths() {
        let tmp = TempDir::new().unwrap();
        let paths = PathsConfig {
            processed_dir: "out".to_string(),
            ..PathsConfig::default()
        };
        let storage = LocalStorage::new(tmp.path(), paths);

        let key = storage
            .save_processed(ProcessedKind::Normalized, day(5), &[])
            .await
            .unwrap();
        assert_eq!(key, "out/normalized_20251205.json");
        assert_eq!(
            storage
                .load_processed(ProcessedKind::Normalized, day(5))
                .await
                .unwrap(),
            Some(Vec::new())
        );
    }
}
