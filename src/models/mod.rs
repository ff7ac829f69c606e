// src/models/mod.rs

//! Domain models for the tender feed.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod notice;
mod record;

// Re-export all public types
pub use config::{Config, DedupConfig, FilterConfig, NormalizeConfig, PathsConfig};
pub use notice::{Extra, Feed, Notice, RESERVED_FIELDS, Source};
pub use record::{AwsRecord, BoampRecord, DateValue, MaximilienRecord, SourceBatches, SourceRecord};
