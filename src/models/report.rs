// src/models/report.rs

//! Terminal artifacts of a pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, FailureClass, Result};
use crate::models::WorkUnit;

/// A work unit that ended in a terminal failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitFailure {
    pub unit: WorkUnit,
    pub class: FailureClass,
    pub message: String,
    /// Attempts made, including the first
    pub attempts: u32,
}

/// A deployment target that diverged from the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetFailure {
    pub name: String,
    pub reason: String,
}

/// Per-term change counts against the previous canonical file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermChange {
    pub term: String,
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub carried_forward: usize,
}

/// A term whose new dataset was not written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeldBackTerm {
    pub term: String,
    pub reason: String,
}

/// Outcome of copying the local store to every target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Eligible file names found in the local store
    pub files: Vec<String>,
    pub targets_synced: Vec<String>,
    pub targets_failed: Vec<TargetFailure>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.targets_failed.is_empty()
    }

    /// Fail with `PartialSync` unless every target matched.
    pub fn ensure_complete(&self) -> Result<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(AppError::PartialSync {
                targets_failed: self.targets_failed.iter().map(|t| t.name.clone()).collect(),
            })
        }
    }
}

/// Summary of one full run, built once the run reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub success: bool,
    pub cancelled: bool,
    pub units_attempted: usize,
    pub units_succeeded: usize,
    pub units_failed: Vec<UnitFailure>,
    pub records_written: usize,
    pub terms_written: Vec<String>,
    pub terms_held_back: Vec<HeldBackTerm>,
    pub changes: Vec<TermChange>,
    pub sync_skipped: bool,
    pub targets_synced: Vec<String>,
    pub targets_failed: Vec<TargetFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Units never brought to a terminal state (cancellation).
    pub fn units_unattempted(&self) -> usize {
        self.units_attempted
            .saturating_sub(self.units_succeeded + self.units_failed.len())
    }

    /// Scraping produced data, regardless of the sync outcome.
    pub fn scrape_succeeded(&self) -> bool {
        self.units_succeeded > 0 && !self.cancelled
    }

    pub fn sync_succeeded(&self) -> bool {
        !self.sync_skipped && self.targets_failed.is_empty()
    }

    /// Fail with `PartialSync` when any target diverged.
    pub fn ensure_synced(&self) -> Result<()> {
        if self.targets_failed.is_empty() {
            Ok(())
        } else {
            Err(AppError::PartialSync {
                targets_failed: self.targets_failed.iter().map(|t| t.name.clone()).collect(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(name: &str) -> TargetFailure {
        TargetFailure {
            name: name.into(),
            reason: "read-only".into(),
        }
    }

    #[test]
    fn test_sync_report_complete() {
        let report = SyncReport {
            files: vec!["all_courses_2024f.json".into()],
            targets_synced: vec!["api".into()],
            targets_failed: vec![],
        };
        assert!(report.ensure_complete().is_ok());
    }

    #[test]
    fn test_sync_report_partial() {
        let report = SyncReport {
            files: vec![],
            targets_synced: vec!["api".into()],
            targets_failed: vec![failure("static")],
        };
        match report.ensure_complete() {
            Err(AppError::PartialSync { targets_failed }) => {
                assert_eq!(targets_failed, vec!["static".to_string()])
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let now = Utc::now();
        let report = RunReport {
            success: true,
            cancelled: false,
            units_attempted: 2,
            units_succeeded: 2,
            units_failed: vec![],
            records_written: 5,
            terms_written: vec!["2024F".into()],
            terms_held_back: vec![],
            changes: vec![],
            sync_skipped: true,
            targets_synced: vec![],
            targets_failed: vec![],
            started_at: now,
            finished_at: now,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["unitsAttempted"], 2);
        assert_eq!(json["recordsWritten"], 5);
        assert_eq!(report.units_unattempted(), 0);
        assert!(report.ensure_synced().is_ok());
        assert!(!report.sync_succeeded());
    }
}
