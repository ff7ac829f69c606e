//! Service layer for the tender feed.
//!
//! This module contains the business logic for:
//! - Source record normalization (`normalize`)
//! - Cross-source duplicate merging (`Deduplicator`)
//! - BOAMP pre-selection (`filter`)

mod dedup;
pub mod filter;
pub mod normalize;

pub use dedup::{Deduplicator, deduplicate, merge_group};
pub use normalize::{
    normalize_all, normalize_aws, normalize_boamp, normalize_maximilien, normalize_record,
};
