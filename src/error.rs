// src/error.rs

//! Unified error handling for the pull pipeline.

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Login rejected; aborts the whole run
    #[error("Authentication failed with status {status}: {body}")]
    Authentication { status: u16, body: String },

    /// Rate limit, timeout or network failure; retried with backoff
    #[error("Transient fetch error: {0}")]
    TransientFetch(String),

    /// Any other HTTP status; the page is skipped without retry
    #[error("Fetch rejected with status {status}: {message}")]
    PermanentFetch { status: u16, message: String },

    /// Writing a YAML or CSV file failed
    #[error("Persistence error for {path}: {message}")]
    Persistence { path: String, message: String },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// CSV encoding failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create an authentication error.
    pub fn authentication(status: u16, body: impl Into<String>) -> Self {
        Self::Authentication {
            status,
            body: body.into(),
        }
    }

    /// Create a transient fetch error.
    pub fn transient(message: impl fmt::Display) -> Self {
        Self::TransientFetch(message.to_string())
    }

    /// Create a permanent fetch error.
    pub fn permanent(status: u16, message: impl fmt::Display) -> Self {
        Self::PermanentFetch {
            status,
            message: message.to_string(),
        }
    }

    /// Create a persistence error for a path.
    pub fn persistence(path: impl AsRef<Path>, message: impl fmt::Display) -> Self {
        Self::Persistence {
            path: path.as_ref().display().to_string(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether the fetcher should retry after this error.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::TransientFetch(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            _ => false,
        }
    }
}
