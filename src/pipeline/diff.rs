//! Change detection between two versions of a term dataset.
//!
//! Computes which identity keys were added, updated, or removed so the
//! run report can say what a scrape changed.

use std::collections::BTreeMap;

use crate::models::{CourseRecord, RecordKey, TermChange, TermDataset};

/// Keys that changed between two datasets, in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    pub added: Vec<RecordKey>,
    /// Same key, different `raw_source_hash`
    pub updated: Vec<RecordKey>,
    pub removed: Vec<RecordKey>,
}

impl DiffResult {
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.updated.is_empty() || !self.removed.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }

    /// Counts for the run report.
    pub fn to_change(&self, term: &str, carried_forward: usize) -> TermChange {
        TermChange {
            term: term.to_string(),
            added: self.added.len(),
            updated: self.updated.len(),
            removed: self.removed.len(),
            carried_forward,
        }
    }
}

/// Diff two record maps by identity key.
pub fn diff_records(
    previous: &BTreeMap<RecordKey, CourseRecord>,
    current: &BTreeMap<RecordKey, CourseRecord>,
) -> DiffResult {
    let mut result = DiffResult::default();

    for (key, record) in current {
        match previous.get(key) {
            None => result.added.push(key.clone()),
            Some(prev) if prev.raw_source_hash != record.raw_source_hash => {
                result.updated.push(key.clone())
            }
            Some(_) => {}
        }
    }

    result.removed = previous
        .keys()
        .filter(|key| !current.contains_key(*key))
        .cloned()
        .collect();

    result
}

/// Diff a new dataset against the stored one, if any.
pub fn calculate_diff(previous: Option<&TermDataset>, current: &TermDataset) -> DiffResult {
    match previous {
        Some(prev) => diff_records(&prev.records, &current.records),
        None => diff_records(&BTreeMap::new(), &current.records),
    }
}
