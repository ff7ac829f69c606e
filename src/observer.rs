// src/observer.rs

//! Pluggable sink for events raised by normalization and deduplication.
//!
//! The core never logs directly; callers pass an [`Observer`]. The CLI uses
//! [`LogObserver`], tests use [`RecordingObserver`].

use std::fmt;
use std::sync::Mutex;

use crate::models::Source;

/// Why a candidate duplicate group was passed through unmerged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnmergedReason {
    /// Every member comes from the same source
    SingleSource,
    /// Several sources, but one of them appears twice
    RepeatedSource,
    /// Deadlines further apart than the configured tolerance
    DeadlineSpread,
    /// A title fell below the similarity threshold
    TitleMismatch,
}

impl fmt::Display for UnmergedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnmergedReason::SingleSource => "single source",
            UnmergedReason::RepeatedSource => "repeated source",
            UnmergedReason::DeadlineSpread => "deadline spread",
            UnmergedReason::TitleMismatch => "title mismatch",
        };
        f.write_str(text)
    }
}

/// Something worth reporting during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// A sub-field could not be parsed and was dropped
    FieldDegraded {
        source: Source,
        notice_id: String,
        field: &'static str,
        raw: String,
    },
    /// BOAMP records kept by one filter step
    Filtered {
        step: &'static str,
        before: usize,
        after: usize,
    },
    /// Source records mapped to notices
    Normalized {
        boamp: usize,
        aws: usize,
        maximilien: usize,
        total: usize,
    },
    /// Exact `(source, id)` duplicates removed
    StrictCollapse { before: usize, after: usize },
    /// A candidate group was passed through
    GroupLeftUnmerged { reason: UnmergedReason, size: usize },
    /// A candidate group was merged into one notice
    GroupMerged { size: usize, sources: Vec<Source> },
    /// Deduplication finished
    Deduplicated {
        before: usize,
        after: usize,
        merged_groups: usize,
        unmerged_groups: usize,
    },
}

/// Receiver of pipeline events.
pub trait Observer: Send + Sync {
    fn observe(&self, event: PipelineEvent);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn observe(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::FieldDegraded {
                source,
                notice_id,
                field,
                raw,
            } => {
                log::warn!("[{source}] {notice_id}: unparsable {field} {raw:?}, field dropped");
            }
            PipelineEvent::Filtered {
                step,
                before,
                after,
            } => {
                log::info!("Filter {step}: {before} -> {after}");
            }
            PipelineEvent::Normalized {
                boamp,
                aws,
                maximilien,
                total,
            } => {
                log::info!(
                    "Normalized {boamp} BOAMP + {aws} AWS + {maximilien} Maximilien -> {total} notices"
                );
            }
            PipelineEvent::StrictCollapse { before, after } => {
                log::info!("Strict dedup: {before} -> {after}");
            }
            PipelineEvent::GroupLeftUnmerged { reason, size } => {
                log::debug!("Candidate group of {size} left unmerged ({reason})");
            }
            PipelineEvent::GroupMerged { size, sources } => {
                let names: Vec<&str> = sources.iter().map(Source::as_str).collect();
                log::debug!("Merged {size} notices from {}", names.join(", "));
            }
            PipelineEvent::Deduplicated {
                before,
                after,
                merged_groups,
                unmerged_groups,
            } => {
                log::info!(
                    "Soft dedup: {before} -> {after} ({merged_groups} merged, {unmerged_groups} passed through)"
                );
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn observe(&self, _event: PipelineEvent) {}
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far.
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Fields reported as degraded, as `(notice_id, field)` pairs.
    pub fn degraded_fields(&self) -> Vec<(String, &'static str)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PipelineEvent::FieldDegraded {
                    notice_id, field, ..
                } => Some((notice_id, field)),
                _ => None,
            })
            .collect()
    }
}

impl Observer for RecordingObserver {
    fn observe(&self, event: PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
