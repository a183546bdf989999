//! Deduplication of scraped records into one canonical dataset per term.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{CourseRecord, TermDataset, TermId};

/// How to settle two records with the same key and the same `fetched_at`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Keep the record with the greater `raw_source_hash`
    #[default]
    HighestHash,
    /// Fail with `ConflictUnresolved`
    Reject,
}

/// Folds records into per-term datasets, last fetch wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct Canonicalizer {
    tie_break: TieBreak,
}

impl Canonicalizer {
    pub fn new(tie_break: TieBreak) -> Self {
        Self { tie_break }
    }

    /// Group records by term and collapse identity-key collisions.
    ///
    /// The outcome does not depend on input order.
    pub fn canonicalize(
        &self,
        records: impl IntoIterator<Item = CourseRecord>,
    ) -> Result<BTreeMap<TermId, TermDataset>> {
        let mut datasets: BTreeMap<TermId, TermDataset> = BTreeMap::new();

        for record in records {
            let dataset = datasets
                .entry(record.term.clone())
                .or_insert_with(|| TermDataset::new(record.term.clone()));
            self.insert(dataset, record)?;
        }

        Ok(datasets)
    }

    /// Merge one record into a dataset.
    pub fn insert(&self, dataset: &mut TermDataset, record: CourseRecord) -> Result<()> {
        match dataset.records.entry(record.key()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                if self.replaces(&record, slot.get())? {
                    slot.insert(record);
                }
            }
        }
        Ok(())
    }

    fn replaces(&self, candidate: &CourseRecord, existing: &CourseRecord) -> Result<bool> {
        match candidate.fetched_at.cmp(&existing.fetched_at) {
            Ordering::Greater => Ok(true),
            Ordering::Less => Ok(false),
            Ordering::Equal => {
                if candidate.raw_source_hash == existing.raw_source_hash {
                    return Ok(false);
                }
                match self.tie_break {
                    TieBreak::HighestHash => {
                        Ok(candidate.raw_source_hash > existing.raw_source_hash)
                    }
                    TieBreak::Reject => Err(AppError::ConflictUnresolved {
                        key: existing.key().to_string(),
                        message: format!(
                            "two versions fetched at {} ({} vs {})",
                            existing.fetched_at,
                            short_hash(&existing.raw_source_hash),
                            short_hash(&candidate.raw_source_hash)
                        ),
                    }),
                }
            }
        }
    }
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
