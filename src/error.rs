// src/error.rs

//! Unified error handling for the tender feed.

use std::fmt;

use thiserror::Error;

/// Result type alias for feed operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A source record is structurally unusable (e.g. missing discriminant)
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A stage needed a batch that does not exist
    #[error("Missing batch {kind}: {location}")]
    MissingBatch { kind: String, location: String },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an invalid record error.
    pub fn invalid_record(message: impl fmt::Display) -> Self {
        Self::InvalidRecord(message.to_string())
    }

    /// Create a missing batch error.
    pub fn missing_batch(kind: impl Into<String>, location: impl fmt::Display) -> Self {
        Self::MissingBatch {
            kind: kind.into(),
            location: location.to_string(),
        }
    }
}
