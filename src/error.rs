// src/error.rs

//! Unified error handling for the catalog pipeline.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built or used
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Request exceeded the per-call timeout
    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    /// Catalog answered with a non-success status
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// Connection-level failure (DNS, reset, TLS, body read)
    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    /// Page structure was not recognized
    #[error("Malformed page for {context}: {message}")]
    MalformedPage { context: String, message: String },

    /// Two records share an identity key and the tie-break policy rejects them
    #[error("Unresolved conflict for {key}: {message}")]
    ConflictUnresolved { key: String, message: String },

    /// Every unit of the run failed
    #[error("No work unit succeeded ({attempted} attempted)")]
    NoSuccessfulUnits { attempted: usize },

    /// Another run holds the local store lock
    #[error("Another run holds the store lock at {}", path.display())]
    RunInProgress { path: PathBuf },

    /// Local canonical store does not exist
    #[error("Local store not found at {}", path.display())]
    StoreMissing { path: PathBuf },

    /// Local canonical store holds nothing to deploy
    #[error("No eligible data files in {}", path.display())]
    NoEligibleFiles { path: PathBuf },

    /// A term's record count dropped past the tolerated threshold
    #[error(
        "Record count for {term} dropped {previous_count} → {current_count} ({drop_percent:.1}% > {threshold_percent}%)"
    )]
    DriftDetected {
        term: String,
        current_count: usize,
        previous_count: usize,
        drop_percent: f64,
        threshold_percent: u8,
    },

    /// A new dataset would replace a non-empty one with nothing
    #[error("Empty dataset for {term} would replace {previous_count} records")]
    EmptyDataset { term: String, previous_count: usize },

    /// A worker task panicked or was aborted
    #[error("Worker task failed: {0}")]
    Worker(String),

    /// Fetching or parsing one unit panicked
    #[error("Scrape of {unit} panicked: {message}")]
    UnitPanicked { unit: String, message: String },

    /// One or more deployment targets diverged after sync
    #[error("Partial sync, failed targets: {}", targets_failed.join(", "))]
    PartialSync { targets_failed: Vec<String> },
}

/// Coarse failure taxonomy used for retry decisions and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Timeout, network, 5xx: retried with backoff
    Transient,
    /// 4xx, malformed page: recorded, never retried
    TerminalPerUnit,
    /// Aborts the whole run
    RunLevel,
    /// Sync failure: reported, completed work is kept
    Distribution,
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
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

    /// Create a malformed page error with context.
    pub fn malformed(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::MalformedPage {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a run lock error.
    pub fn run_in_progress(path: &Path) -> Self {
        Self::RunInProgress {
            path: path.to_path_buf(),
        }
    }

    /// Map a reqwest failure for `url` onto the fetch taxonomy.
    pub fn from_request(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = err.status() {
            Self::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            }
        } else {
            Self::Network {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Classify this error.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Timeout { .. } | Self::Network { .. } => FailureClass::Transient,
            Self::HttpStatus { status, .. } if *status >= 500 => FailureClass::Transient,
            Self::HttpStatus { .. } | Self::MalformedPage { .. } | Self::UnitPanicked { .. } => {
                FailureClass::TerminalPerUnit
            }
            Self::PartialSync { .. } => FailureClass::Distribution,
            _ => FailureClass::RunLevel,
        }
    }

    /// Whether the orchestrator should re-enqueue the unit.
    pub fn is_retryable(&self) -> bool {
        self.class() == FailureClass::Transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> AppError {
        AppError::HttpStatus {
            status: code,
            url: "https://catalog.test/search".into(),
        }
    }

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(AppError::Timeout { url: "u".into() }.is_retryable());
        assert!(
            AppError::Network {
                url: "u".into(),
                message: "reset".into()
            }
            .is_retryable()
        );
        assert!(status(503).is_retryable());
    }

    #[test]
    fn test_terminal_errors_are_not_retryable() {
        assert!(!status(404).is_retryable());
        assert_eq!(status(400).class(), FailureClass::TerminalPerUnit);
        assert_eq!(
            AppError::malformed("2024F/CSI", "no results table").class(),
            FailureClass::TerminalPerUnit
        );
        let panicked = AppError::UnitPanicked {
            unit: "2024F/PHI".into(),
            message: "parser bug".into(),
        };
        assert!(!panicked.is_retryable());
        assert_eq!(panicked.class(), FailureClass::TerminalPerUnit);
    }

    #[test]
    fn test_run_level_and_distribution_classes() {
        assert_eq!(
            AppError::NoSuccessfulUnits { attempted: 3 }.class(),
            FailureClass::RunLevel
        );
        assert_eq!(
            AppError::PartialSync {
                targets_failed: vec!["static".into()]
            }
            .class(),
            FailureClass::Distribution
        );
    }

    #[test]
    fn test_partial_sync_message_lists_targets() {
        let err = AppError::PartialSync {
            targets_failed: vec!["api".into(), "static".into()],
        };
        assert_eq!(err.to_string(), "Partial sync, failed targets: api, static");
    }
}
