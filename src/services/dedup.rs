// src/services/dedup.rs

//! Cross-source duplicate merging service.
//!
//! Three stages: exact `(source, id)` collapse, soft grouping on a textual
//! signature, then a conservative resolution of each candidate group. When
//! the evidence is inconclusive the group is passed through unmerged.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use serde_json::Value;

use crate::models::{DedupConfig, Notice, Source};
use crate::observer::{Observer, PipelineEvent, UnmergedReason};
use crate::utils::text::{jaccard, normalize_opt, normalize_text, word_set};

/// Grouping key of a notice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey {
    Signature {
        title: String,
        buyer: String,
        deadline: Option<NaiveDate>,
        department: String,
    },
    /// Not enough signal to group; the index keeps the key distinct
    Unique(usize),
}

/// Merges likely duplicates across sources.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    config: DedupConfig,
    stop_words: HashSet<String>,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DedupConfig::default())
    }
}

impl Deduplicator {
    /// Create a new deduplicator.
    pub fn new(config: DedupConfig) -> Self {
        let stop_words = config
            .title_stop_words
            .iter()
            .map(|w| normalize_text(w))
            .filter(|w| !w.is_empty())
            .collect();
        Self { config, stop_words }
    }

    /// Reduce `notices`, merging cross-source duplicates.
    pub fn deduplicate(&self, notices: Vec<Notice>, observer: &dyn Observer) -> Vec<Notice> {
        let before = notices.len();
        let notices = strict_collapse(notices);
        observer.observe(PipelineEvent::StrictCollapse {
            before,
            after: notices.len(),
        });

        let groups = self.group(notices);

        let mut output = Vec::with_capacity(groups.len());
        let mut merged_groups = 0;
        let mut unmerged_groups = 0;

        for group in groups {
            if group.len() == 1 {
                output.extend(group);
                continue;
            }

            match self.unmerged_reason(&group) {
                Some(reason) => {
                    observer.observe(PipelineEvent::GroupLeftUnmerged {
                        reason,
                        size: group.len(),
                    });
                    unmerged_groups += 1;
                    output.extend(group);
                }
                None => {
                    if let Some(merged) = merge_group(&group) {
                        observer.observe(PipelineEvent::GroupMerged {
                            size: group.len(),
                            sources: group.iter().map(|n| n.source).collect(),
                        });
                        merged_groups += 1;
                        output.push(merged);
                    }
                }
            }
        }

        observer.observe(PipelineEvent::Deduplicated {
            before,
            after: output.len(),
            merged_groups,
            unmerged_groups,
        });
        output
    }

    /// Why a candidate group must stay unmerged, or `None` when it can merge.
    ///
    /// Groups of one are reported as [`UnmergedReason::SingleSource`].
    pub fn unmerged_reason(&self, group: &[Notice]) -> Option<UnmergedReason> {
        let (first, rest) = group.split_first()?;

        let sources: HashSet<Source> = group.iter().map(|n| n.source).collect();
        if sources.len() == 1 {
            return Some(UnmergedReason::SingleSource);
        }
        if sources.len() < group.len() {
            return Some(UnmergedReason::RepeatedSource);
        }

        if let Some(days) = self.config.deadline_tolerance_days {
            let within = |other: &Notice| match (first.deadline_date, other.deadline_date) {
                (None, None) => true,
                (Some(a), Some(b)) => (a - b).num_days().unsigned_abs() <= u64::from(days),
                _ => false,
            };
            if !rest.iter().all(within) {
                return Some(UnmergedReason::DeadlineSpread);
            }
        }

        let first_tokens = self.title_tokens(first.title.as_deref());
        let similar = rest.iter().all(|other| {
            let tokens = self.title_tokens(other.title.as_deref());
            jaccard(&first_tokens, &tokens) >= self.config.similarity_threshold
        });
        if !similar {
            return Some(UnmergedReason::TitleMismatch);
        }

        None
    }

    /// Bucket notices by key, keeping first-seen order of buckets and members.
    fn group(&self, notices: Vec<Notice>) -> Vec<Vec<Notice>> {
        let mut buckets: Vec<Vec<Notice>> = Vec::new();
        let mut index: HashMap<GroupKey, usize> = HashMap::new();

        for (position, notice) in notices.into_iter().enumerate() {
            let key = self.group_key(&notice, position);
            match index.get(&key) {
                Some(&bucket) => buckets[bucket].push(notice),
                None => {
                    index.insert(key, buckets.len());
                    buckets.push(vec![notice]);
                }
            }
        }
        buckets
    }

    fn group_key(&self, notice: &Notice, position: usize) -> GroupKey {
        let title = self.title_signature(notice.title.as_deref());
        let buyer = normalize_opt(notice.buyer_name.as_deref());
        if title.is_empty() || buyer.is_empty() {
            return GroupKey::Unique(position);
        }

        let deadline = match self.config.deadline_tolerance_days {
            Some(_) => None,
            None => notice.deadline_date,
        };

        GroupKey::Signature {
            title,
            buyer,
            deadline,
            department: notice
                .department
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
        }
    }

    /// Normalized title words without stop words.
    fn title_tokens(&self, title: Option<&str>) -> HashSet<String> {
        let mut tokens = title.map(word_set).unwrap_or_default();
        tokens.retain(|t| !self.stop_words.contains(t));
        tokens
    }

    /// Normalized title without stop words, word order and repeats kept.
    fn title_signature(&self, title: Option<&str>) -> String {
        let normalized = title.map(normalize_text).unwrap_or_default();
        normalized
            .split_whitespace()
            .filter(|w| !self.stop_words.contains(*w))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Deduplicate with the default heuristics.
pub fn deduplicate(notices: Vec<Notice>, observer: &dyn Observer) -> Vec<Notice> {
    Deduplicator::default().deduplicate(notices, observer)
}

/// Keep the first notice of each `(source, source_notice_id)`.
fn strict_collapse(notices: Vec<Notice>) -> Vec<Notice> {
    let mut seen: HashSet<(Source, String)> = HashSet::new();
    notices
        .into_iter()
        .filter(|n| seen.insert((n.source, n.source_notice_id.clone())))
        .collect()
}

/// Merge a group into a copy of its best member annotated with provenance.
///
/// The best member has the highest source priority, then the latest
/// publication date; on a tie the earlier member wins. Its `extra` gains
/// `merged_sources`, `other_urls`, `other_refs` and `merged_ids`. Returns
/// `None` for an empty group.
pub fn merge_group(group: &[Notice]) -> Option<Notice> {
    let rank = |n: &Notice| (n.source.priority(), n.publication_date);

    let mut best_index = 0;
    for (i, notice) in group.iter().enumerate().skip(1) {
        if rank(notice) > rank(&group[best_index]) {
            best_index = i;
        }
    }
    let best = group.get(best_index)?;
    let others = || {
        group
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != best_index)
            .map(|(_, n)| n)
    };

    let merged_sources: BTreeSet<&str> = group.iter().map(|n| n.source.as_str()).collect();
    let other_urls: BTreeSet<&str> = others()
        .filter_map(|n| n.url.as_deref())
        .filter(|url| Some(*url) != best.url.as_deref())
        .collect();
    let other_refs: BTreeSet<&str> = others()
        .filter_map(|n| n.reference.as_deref())
        .filter(|r| Some(*r) != best.reference.as_deref())
        .collect();
    let merged_ids: BTreeSet<String> = others().map(Notice::provenance_id).collect();

    let mut merged = best.clone();
    merged.extra.insert("merged_sources", string_array(merged_sources));
    merged.extra.insert("other_urls", string_array(other_urls));
    merged.extra.insert("other_refs", string_array(other_refs));
    merged.extra.insert("merged_ids", string_array(merged_ids));
    Some(merged)
}

fn string_array<S: ToString>(items: impl IntoIterator<Item = S>) -> Value {
    Value::Array(
        items
            .into_iter()
            .map(|s| Value::String(s.to_string()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::RecordingObserver;

    fn notice(source: Source, id: &str, title: &str) -> Notice {
        let mut n = Notice::new(source, id);
        n.title = Some(title.to_string());
        n.buyer_name = Some("Ville de Versailles".to_string());
        n.deadline_date = NaiveDate::from_ymd_opt(2025, 12, 15);
        n.department = Some("78".to_string());
        n
    }

    fn ids(notices: &[Notice]) -> Vec<String> {
        notices.iter().map(Notice::provenance_id).collect()
    }

    #[test]
    fn test_same_source_never_merged() {
        let input = vec![
            notice(Source::Aws, "A1", "Levé topographique"),
            notice(Source::Aws, "A2", "Levé topographique"),
        ];
        let observer = RecordingObserver::new();
        let output = deduplicate(input, &observer);

        assert_eq!(ids(&output), vec!["aws:A1", "aws:A2"]);
        assert!(observer.events().contains(&PipelineEvent::GroupLeftUnmerged {
            reason: UnmergedReason::SingleSource,
            size: 2,
        }));
    }

    #[test]
    fn test_cross_source_titles_merge() {
        let mut boamp = notice(Source::Boamp, "25-1", "Mission de géomètre-expert — bornage terrain");
        boamp.url = Some("https://boamp.fr/25-1".to_string());
        boamp.reference = Some("25-1".to_string());
        let mut aws = notice(Source::Aws, "AO-7", "Mission géomètre expert bornage terrain");
        aws.url = Some("https://marches-publics.info/AO-7".to_string());
        aws.reference = Some("AO-7".to_string());

        let output = deduplicate(vec![aws, boamp], &RecordingObserver::new());

        assert_eq!(output.len(), 1);
        let merged = &output[0];
        assert_eq!(merged.source, Source::Boamp);
        assert_eq!(merged.extra.strings("merged_sources"), vec!["aws", "boamp"]);
        assert_eq!(
            merged.extra.strings("other_urls"),
            vec!["https://marches-publics.info/AO-7"]
        );
        assert_eq!(merged.extra.strings("other_refs"), vec!["AO-7"]);
        assert_eq!(merged.extra.strings("merged_ids"), vec!["aws:AO-7"]);
    }

    #[test]
    fn test_different_titles_stay_apart() {
        let input = vec![
            notice(Source::Boamp, "25-1", "Levé topographique du parc municipal"),
            notice(Source::Maximilien, "874", "Levé topographique parc"),
        ];
        let output = deduplicate(input, &RecordingObserver::new());
        assert_eq!(output.len(), 2);
    }

    #[test]
    fn test_title_gate_rejects_low_similarity() {
        let dedup = Deduplicator::default();
        // 3 shared tokens out of 5
        let group = vec![
            notice(Source::Boamp, "25-1", "bornage terrain communal nord"),
            notice(Source::Aws, "AO-1", "bornage terrain communal sud"),
        ];
        assert_eq!(
            dedup.unmerged_reason(&group),
            Some(UnmergedReason::TitleMismatch)
        );

        let group = vec![
            notice(Source::Boamp, "25-1", "bornage terrain"),
            notice(Source::Aws, "AO-1", "Bornage du terrain"),
        ];
        assert_eq!(dedup.unmerged_reason(&group), None);
    }

    #[test]
    fn test_reordered_titles_stay_apart() {
        let input = vec![
            notice(Source::Boamp, "25-1", "Bornage terrain"),
            notice(Source::Aws, "AO-1", "Terrain bornage"),
            notice(Source::Maximilien, "874", "Bornage bornage terrain"),
        ];
        let output = deduplicate(input, &RecordingObserver::new());
        assert_eq!(ids(&output), vec!["boamp:25-1", "aws:AO-1", "maximilien:874"]);
    }

    #[test]
    fn test_empty_title_is_singleton() {
        let mut untitled = notice(Source::Boamp, "25-1", "");
        untitled.title = None;
        let mut blank = notice(Source::Aws, "AO-1", " — ");
        blank.title = Some(" — ".to_string());
        let input = vec![untitled, blank, notice(Source::Maximilien, "874", "Bornage")];

        let observer = RecordingObserver::new();
        let output = deduplicate(input, &observer);

        assert_eq!(output.len(), 3);
        assert!(
            !observer
                .events()
                .iter()
                .any(|e| matches!(e, PipelineEvent::GroupLeftUnmerged { .. }))
        );
    }

    #[test]
    fn test_only_stop_words_is_singleton() {
        let input = vec![
            notice(Source::Boamp, "25-1", "De la"),
            notice(Source::Aws, "AO-1", "de la"),
        ];
        assert_eq!(deduplicate(input, &RecordingObserver::new()).len(), 2);
    }

    #[test]
    fn test_missing_buyer_is_singleton() {
        let mut a = notice(Source::Boamp, "25-1", "Bornage");
        a.buyer_name = None;
        let mut b = notice(Source::Aws, "AO-1", "Bornage");
        b.buyer_name = None;
        assert_eq!(deduplicate(vec![a, b], &RecordingObserver::new()).len(), 2);
    }

    #[test]
    fn test_strict_collapse_keeps_first() {
        let mut first = notice(Source::Aws, "A1", "Bornage");
        first.url = Some("first".to_string());
        let mut second = notice(Source::Aws, "A1", "Autre titre");
        second.url = Some("second".to_string());

        let observer = RecordingObserver::new();
        let output = deduplicate(vec![first, second], &observer);

        assert_eq!(output.len(), 1);
        assert_eq!(output[0].url.as_deref(), Some("first"));
        assert!(observer.events().contains(&PipelineEvent::StrictCollapse {
            before: 2,
            after: 1
        }));
    }

    #[test]
    fn test_repeated_source_group_unmerged() {
        let input = vec![
            notice(Source::Boamp, "25-1", "Bornage"),
            notice(Source::Aws, "AO-1", "Bornage"),
            notice(Source::Aws, "AO-2", "Bornage"),
        ];
        let observer = RecordingObserver::new();
        let output = deduplicate(input, &observer);

        assert_eq!(ids(&output), vec!["boamp:25-1", "aws:AO-1", "aws:AO-2"]);
        assert!(observer.events().contains(&PipelineEvent::GroupLeftUnmerged {
            reason: UnmergedReason::RepeatedSource,
            size: 3,
        }));
    }

    #[test]
    fn test_exact_deadline_required_by_default() {
        let a = notice(Source::Boamp, "25-1", "Bornage");
        let mut b = notice(Source::Aws, "AO-1", "Bornage");
        b.deadline_date = NaiveDate::from_ymd_opt(2025, 12, 16);
        assert_eq!(deduplicate(vec![a, b], &RecordingObserver::new()).len(), 2);
    }

    #[test]
    fn test_deadline_tolerance() {
        let dedup = Deduplicator::new(DedupConfig {
            deadline_tolerance_days: Some(3),
            ..DedupConfig::default()
        });

        let a = notice(Source::Boamp, "25-1", "Bornage");
        let mut b = notice(Source::Aws, "AO-1", "Bornage");
        b.deadline_date = NaiveDate::from_ymd_opt(2025, 12, 18);
        let output = dedup.deduplicate(vec![a.clone(), b], &RecordingObserver::new());
        assert_eq!(output.len(), 1);

        let mut far = notice(Source::Aws, "AO-2", "Bornage");
        far.deadline_date = NaiveDate::from_ymd_opt(2025, 12, 19);
        let observer = RecordingObserver::new();
        let output = dedup.deduplicate(vec![a.clone(), far], &observer);
        assert_eq!(output.len(), 2);
        assert!(observer.events().contains(&PipelineEvent::GroupLeftUnmerged {
            reason: UnmergedReason::DeadlineSpread,
            size: 2,
        }));

        let mut missing = notice(Source::Aws, "AO-3", "Bornage");
        missing.deadline_date = None;
        assert_eq!(
            dedup.unmerged_reason(&[a, missing]),
            Some(UnmergedReason::DeadlineSpread)
        );
    }

    #[test]
    fn test_merge_group_best_selection() {
        let mut aws = notice(Source::Aws, "AO-1", "Bornage");
        aws.publication_date = NaiveDate::from_ymd_opt(2025, 12, 1);
        let mut max_old = notice(Source::Maximilien, "1", "Bornage");
        max_old.publication_date = NaiveDate::from_ymd_opt(2025, 11, 1);
        let mut max_new = notice(Source::Maximilien, "2", "Bornage");
        max_new.publication_date = NaiveDate::from_ymd_opt(2025, 11, 20);
        let max_undated = notice(Source::Maximilien, "3", "Bornage");

        let merged = merge_group(&[aws.clone(), max_old, max_new, max_undated]).unwrap();
        assert_eq!(merged.provenance_id(), "maximilien:2");
        assert_eq!(
            merged.extra.strings("merged_ids"),
            vec!["aws:AO-1", "maximilien:1", "maximilien:3"]
        );

        let tie_a = notice(Source::Maximilien, "first", "Bornage");
        let tie_b = notice(Source::Maximilien, "second", "Bornage");
        let merged = merge_group(&[aws, tie_a, tie_b]).unwrap();
        assert_eq!(merged.source_notice_id, "first");
    }

    #[test]
    fn test_merge_group_excludes_best_url_and_missing_values() {
        let mut best = notice(Source::Boamp, "25-1", "Bornage");
        best.url = Some("same".to_string());
        let mut other = notice(Source::Aws, "AO-1", "Bornage");
        other.url = Some("same".to_string());
        let third = notice(Source::Maximilien, "874", "Bornage");

        let merged = merge_group(&[other, third, best.clone()]).unwrap();
        assert_eq!(merged.source, Source::Boamp);
        assert!(merged.extra.strings("other_urls").is_empty());
        assert!(merged.extra.strings("other_refs").is_empty());
        assert_eq!(merged.title, best.title);
        assert_eq!(merged.url, best.url);
    }

    #[test]
    fn test_merge_group_empty() {
        assert_eq!(merge_group(&[]), None);
    }

    #[test]
    fn test_empty_input() {
        let observer = RecordingObserver::new();
        assert!(deduplicate(Vec::new(), &observer).is_empty());
        assert!(observer.events().contains(&PipelineEvent::Deduplicated {
            before: 0,
            after: 0,
            merged_groups: 0,
            unmerged_groups: 0,
        }));
    }

    #[test]
    fn test_stop_words_are_normalized() {
        let dedup = Deduplicator::new(DedupConfig {
            title_stop_words: vec!["Étude".to_string()],
            ..DedupConfig::default()
        });
        let input = vec![
            notice(Source::Boamp, "25-1", "Étude bornage"),
            notice(Source::Aws, "AO-1", "bornage"),
        ];
        assert_eq!(dedup.deduplicate(input, &RecordingObserver::new()).len(), 1);
    }
}
