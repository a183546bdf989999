//! Run lock on the local store.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};

/// Lock file name inside the local store.
pub const LOCK_FILE_NAME: &str = ".catalog-sync.lock";

/// Age after which a lock left by a killed run is taken over.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(6 * 60 * 60);

/// Time since the holder wrote `started ...`; `None` when unreadable.
fn lock_age(path: &Path) -> Option<Duration> {
    let content = fs::read_to_string(path).ok()?;
    let started = content
        .lines()
        .find_map(|line| line.strip_prefix("started "))
        .and_then(|ts| DateTime::parse_from_rfc3339(ts.trim()).ok())?;
    Utc::now()
        .signed_duration_since(started.with_timezone(&Utc))
        .to_std()
        .ok()
}

/// Exclusive claim on a store directory, released on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Take the lock in `dir`, failing with `RunInProgress` if it is held.
    ///
    /// A lock older than [`DEFAULT_STALE_AFTER`] is treated as abandoned.
    pub fn acquire(dir: &Path) -> Result<Self> {
        Self::acquire_with(dir, Some(DEFAULT_STALE_AFTER))
    }

    /// Like [`RunLock::acquire`]; `None` never takes over an existing lock.
    pub fn acquire_with(dir: &Path, stale_after: Option<Duration>) -> Result<Self> {
        let path = dir.join(LOCK_FILE_NAME);
        match Self::create(path.clone()) {
            Err(AppError::RunInProgress { .. })
                if stale_after.is_some_and(|max| lock_age(&path).is_some_and(|age| age > max)) =>
            {
                log::warn!("Taking over stale run lock {}", path.display());
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                Self::create(path)
            }
            other => other,
        }
    }

    /// Remove the lock in `dir` regardless of its holder.
    ///
    /// Returns whether a lock file was present.
    pub fn break_lock(dir: &Path) -> Result<bool> {
        match fs::remove_file(dir.join(LOCK_FILE_NAME)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn create(path: PathBuf) -> Result<Self> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(AppError::run_in_progress(&path));
            }
            Err(e) => return Err(e.into()),
        };

        let lock = Self { path };
        writeln!(file, "pid {}", std::process::id())?;
        writeln!(file, "started {}", Utc::now().to_rfc3339())?;
        log::debug!("Acquired run lock {}", lock.path.display());
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Failed to release run lock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let dir = TempDir::new().unwrap();
        let lock = RunLock::acquire(dir.path()).unwrap();
        assert!(lock.path().exists());

        let err = RunLock::acquire(dir.path()).unwrap_err();
        assert!(matches!(err, AppError::RunInProgress { .. }));

        drop(lock);
        assert!(!dir.path().join(LOCK_FILE_NAME).exists());
        assert!(RunLock::acquire(dir.path()).is_ok());
    }

    fn write_lock(dir: &Path, started: &str) {
        fs::write(dir.join(LOCK_FILE_NAME), format!("pid 4242\nstarted {started}\n")).unwrap();
    }

    #[test]
    fn test_stale_lock_is_taken_over() {
        let dir = TempDir::new().unwrap();
        write_lock(dir.path(), "2020-01-01T00:00:00+00:00");

        let lock = RunLock::acquire(dir.path()).unwrap();
        let content = fs::read_to_string(lock.path()).unwrap();
        assert!(content.starts_with(&format!("pid {}", std::process::id())));
    }

    #[test]
    fn test_recent_or_unreadable_lock_is_kept() {
        let dir = TempDir::new().unwrap();
        write_lock(dir.path(), &Utc::now().to_rfc3339());
        assert!(matches!(
            RunLock::acquire(dir.path()),
            Err(AppError::RunInProgress { .. })
        ));

        fs::write(dir.path().join(LOCK_FILE_NAME), "").unwrap();
        assert!(matches!(
            RunLock::acquire(dir.path()),
            Err(AppError::RunInProgress { .. })
        ));
    }

    #[test]
    fn test_takeover_disabled() {
        let dir = TempDir::new().unwrap();
        write_lock(dir.path(), "2020-01-01T00:00:00+00:00");
        assert!(RunLock::acquire_with(dir.path(), None).is_err());
        assert!(RunLock::acquire_with(dir.path(), Some(Duration::from_secs(60))).is_ok());
    }

    #[test]
    fn test_break_lock() {
        let dir = TempDir::new().unwrap();
        assert!(!RunLock::break_lock(dir.path()).unwrap());
        write_lock(dir.path(), &Utc::now().to_rfc3339());
        assert!(RunLock::break_lock(dir.path()).unwrap());
        assert!(RunLock::acquire(dir.path()).is_ok());
    }

    #[test]
    fn test_lock_records_pid() {
        let dir = TempDir::new().unwrap();
        let lock = RunLock::acquire(dir.path()).unwrap();
        let content = fs::read_to_string(lock.path()).unwrap();
        assert!(content.starts_with(&format!("pid {}", std::process::id())));
    }
}
