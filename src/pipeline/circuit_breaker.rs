//! Circuit breaker for term data files.
//!
//! Holds back a term's new dataset when its record count drops sharply
//! compared to the file already in the store.

use crate::error::{AppError, Result};
use crate::models::StorageConfig;

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Maximum allowed drop percentage (0-100). Default: 20%
    pub max_drop_percent: u8,
    /// Previous count below which the drop check is skipped
    pub min_baseline: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_drop_percent: 20,
            min_baseline: 10,
        }
    }
}

impl From<&StorageConfig> for CircuitBreakerConfig {
    fn from(storage: &StorageConfig) -> Self {
        Self {
            max_drop_percent: storage.max_drop_percent,
            min_baseline: storage.min_baseline,
        }
    }
}

/// Result of a circuit breaker check.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitBreakerResult {
    /// Safe to overwrite
    Safe {
        current_count: usize,
        previous_count: usize,
    },
    /// No previous file, or previous count below baseline
    ColdStart { current_count: usize },
    /// Drop exceeds the threshold
    Triggered {
        current_count: usize,
        previous_count: usize,
        drop_percent: f64,
    },
    /// Empty dataset replacing a non-empty file
    EmptyResult { previous_count: usize },
}

/// Record-count circuit breaker.
#[derive(Debug, Clone, Default)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self { config }
    }

    /// Compare the new record count of a term with the stored one.
    ///
    /// `previous` is `None` when the term has no file yet.
    pub fn check(&self, current_count: usize, previous: Option<usize>) -> CircuitBreakerResult {
        let previous_count = previous.unwrap_or(0);

        if current_count == 0 {
            return if previous_count == 0 {
                CircuitBreakerResult::ColdStart { current_count }
            } else {
                CircuitBreakerResult::EmptyResult { previous_count }
            };
        }

        if previous_count < self.config.min_baseline {
            return CircuitBreakerResult::ColdStart { current_count };
        }

        if current_count < previous_count {
            let drop = previous_count - current_count;
            let drop_percent = (drop as f64 / previous_count as f64) * 100.0;

            if drop_percent > self.config.max_drop_percent as f64 {
                return CircuitBreakerResult::Triggered {
                    current_count,
                    previous_count,
                    drop_percent,
                };
            }
        }

        CircuitBreakerResult::Safe {
            current_count,
            previous_count,
        }
    }

    /// Return Ok if the term may be written, the reason otherwise.
    pub fn validate(&self, term: &str, current_count: usize, previous: Option<usize>) -> Result<()> {
        match self.check(current_count, previous) {
            CircuitBreakerResult::Safe {
                current_count,
                previous_count,
            } => {
                log::debug!(
                    "Circuit breaker {}: SAFE ({} records, was {})",
                    term,
                    current_count,
                    previous_count
                );
                Ok(())
            }
            CircuitBreakerResult::ColdStart { current_count } => {
                log::debug!(
                    "Circuit breaker {}: COLD START ({} records, no baseline)",
                    term,
                    current_count
                );
                Ok(())
            }
            CircuitBreakerResult::Triggered {
                current_count,
                previous_count,
                drop_percent,
            } => {
                log::error!(
                    "Circuit breaker {}: TRIGGERED! {} → {} records ({:.1}% drop > {}% threshold)",
                    term,
                    previous_count,
                    current_count,
                    drop_percent,
                    self.config.max_drop_percent
                );
                Err(AppError::DriftDetected {
                    term: term.to_string(),
                    current_count,
                    previous_count,
                    drop_percent,
                    threshold_percent: self.config.max_drop_percent,
                })
            }
            CircuitBreakerResult::EmptyResult { previous_count } => {
                log::error!(
                    "Circuit breaker {}: EMPTY RESULT replacing {} records",
                    term,
                    previous_count
                );
                Err(AppError::EmptyDataset {
                    term: term.to_string(),
                    previous_count,
                })
            }
        }
    }
}
