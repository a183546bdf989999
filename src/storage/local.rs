//! Local filesystem store.
//!
//! Writes go to a temp file first and are renamed into place, so readers
//! never see a half-written term file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{RunReport, StorageConfig, TermDataset};
use crate::storage::lock::DEFAULT_STALE_AFTER;
use crate::storage::{
    DatasetStorage, LocalStorePaths, RunLock, TermFile, is_eligible_file_name, term_file_name,
};

/// Name of the run summary written next to the data files.
pub const REPORT_FILE_NAME: &str = "run_report.json";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root_dir: PathBuf,
    lock_stale_after: Option<Duration>,
}

impl LocalStore {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            lock_stale_after: Some(DEFAULT_STALE_AFTER),
        }
    }

    /// Store at `storage.local_dir` with its lock takeover age.
    pub fn from_config(storage: &StorageConfig) -> Self {
        Self {
            root_dir: storage.local_dir.clone(),
            lock_stale_after: storage.lock_stale_after(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Create the store directory if needed and take the run lock.
    pub async fn lock(&self) -> Result<RunLock> {
        tokio::fs::create_dir_all(&self.root_dir).await?;
        RunLock::acquire_with(&self.root_dir, self.lock_stale_after)
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<PathBuf> {
        let path = self.path(key);
        let mut bytes = serde_json::to_vec_pretty(value)?;
        bytes.push(b'\n');
        write_atomic(&path, &bytes).await?;
        Ok(path)
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Eligible data files currently in the store.
    pub async fn eligible_files(&self) -> Result<Vec<String>> {
        list_eligible(&self.root_dir).await
    }

    /// The stored run report, if any.
    pub async fn load_report(&self) -> Result<Option<RunReport>> {
        self.read_json(REPORT_FILE_NAME).await
    }
}

#[async_trait]
impl DatasetStorage for LocalStore {
    async fn persist(&self, datasets: &[&TermDataset]) -> Result<LocalStorePaths> {
        tokio::fs::create_dir_all(&self.root_dir).await?;

        let mut written = Vec::with_capacity(datasets.len());
        for dataset in datasets {
            let file = TermFile::from(*dataset);
            let path = self.write_json(&term_file_name(&dataset.term), &file).await?;
            log::info!("{}: {} records → {}", dataset.term, file.count, path.display());
            written.push(path);
        }

        Ok(LocalStorePaths {
            root: self.root_dir.clone(),
            written,
        })
    }

    async fn load_term(&self, term: &str) -> Result<Option<TermDataset>> {
        let file: Option<TermFile> = self.read_json(&term_file_name(term)).await?;
        Ok(file.map(TermDataset::from))
    }

    async fn write_report(&self, report: &RunReport) -> Result<()> {
        tokio::fs::create_dir_all(&self.root_dir).await?;
        self.write_json(REPORT_FILE_NAME, report).await?;
        Ok(())
    }
}

/// Write bytes atomically (write to temp, then rename).
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Sorted names of eligible regular files in `dir`.
pub async fn list_eligible(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if is_eligible_file_name(&name) && entry.file_type().await?.is_file() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
