//! Storage for canonical term datasets.
//!
//! The local store holds one JSON file per term; deployment targets mirror
//! the same files under the same names.
//!
//! ## Directory Structure
//!
//! ```text
//! {local_dir}/
//! ├── all_courses_fall_2025.json     # one file per term (eligible)
//! ├── all_courses_winter_2026.json
//! ├── run_report.json                # last run summary (not synced)
//! └── .catalog-sync.lock             # present while a run holds the store
//! ```

pub mod local;
pub mod lock;
pub mod sync;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{CourseRecord, RunReport, TermDataset};
use crate::utils::term_slug;

pub use local::LocalStore;
pub use lock::RunLock;
pub use sync::Distributor;

/// Prefix shared by every synchronized data file.
pub const TERM_FILE_PREFIX: &str = "all_courses_";

/// File name holding a term's dataset.
pub fn term_file_name(term: &str) -> String {
    format!("{TERM_FILE_PREFIX}{}.json", term_slug(term))
}

/// Whether a file name belongs to the synchronized set.
pub fn is_eligible_file_name(name: &str) -> bool {
    name.len() > TERM_FILE_PREFIX.len() + ".json".len()
        && name.starts_with(TERM_FILE_PREFIX)
        && name.ends_with(".json")
}

/// On-disk form of a term dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermFile {
    pub term: String,
    pub count: usize,
    /// Sorted by identity key
    pub records: Vec<CourseRecord>,
}

impl From<&TermDataset> for TermFile {
    fn from(dataset: &TermDataset) -> Self {
        Self {
            term: dataset.term.clone(),
            count: dataset.len(),
            records: dataset.iter().cloned().collect(),
        }
    }
}

impl From<TermFile> for TermDataset {
    fn from(file: TermFile) -> Self {
        let mut dataset = TermDataset::new(file.term);
        for record in file.records {
            dataset.records.insert(record.key(), record);
        }
        dataset
    }
}

/// Where `persist` left the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStorePaths {
    pub root: PathBuf,
    /// Files written by this call, in term order
    pub written: Vec<PathBuf>,
}

/// Backend for canonical datasets.
#[async_trait]
pub trait DatasetStorage: Send + Sync {
    /// Write one file per dataset atomically.
    async fn persist(&self, datasets: &[&TermDataset]) -> Result<LocalStorePaths>;

    /// Load the stored dataset of a term, if any.
    async fn load_term(&self, term: &str) -> Result<Option<TermDataset>>;

    /// Store the last run report next to the data.
    async fn write_report(&self, report: &RunReport) -> Result<()>;
}
