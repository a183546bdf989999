// src/models/work.rs

//! Work units and the raw pages fetched for them.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Academic term identifier (e.g. "2024F", "Winter 2026").
pub type TermId = String;

/// Course subject code (e.g. "CSI").
pub type SubjectCode = String;

/// One (term, subject) scrape task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkUnit {
    pub term: TermId,
    pub subject: SubjectCode,
}

impl WorkUnit {
    pub fn new(term: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            subject: subject.into(),
        }
    }

    /// Cross product of terms and subjects, in configuration order.
    ///
    /// Repeated terms or subjects are collapsed so a run never holds two
    /// identical units.
    pub fn matrix(terms: &[TermId], subjects: &[SubjectCode]) -> Vec<WorkUnit> {
        let mut seen = HashSet::new();
        let mut units = Vec::with_capacity(terms.len() * subjects.len());

        for term in terms {
            for subject in subjects {
                let unit = WorkUnit::new(term.trim(), subject.trim());
                if seen.insert(unit.clone()) {
                    units.push(unit);
                }
            }
        }
        units
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.term, self.subject)
    }
}

/// Lifecycle of a work unit inside one orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

/// One fetched page of catalog results.
#[derive(Debug, Clone)]
pub struct PageFragment {
    pub url: String,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

/// Every page fetched for a work unit, in pagination order.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub unit: WorkUnit,
    pub fragments: Vec<PageFragment>,
}

impl RawPage {
    pub fn new(unit: WorkUnit) -> Self {
        Self {
            unit,
            fragments: Vec::new(),
        }
    }

    pub fn push(&mut self, url: impl Into<String>, body: impl Into<String>) {
        self.fragments.push(PageFragment {
            url: url.into(),
            body: body.into(),
            fetched_at: Utc::now(),
        });
    }

    pub fn page_count(&self) -> usize {
        self.fragments.len()
    }
}
