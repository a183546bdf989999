//! Synchronization of the local store to deployment targets.
//!
//! Each target is brought in line independently: files are copied in
//! (temp + rename), stale data files are removed, then the target's data
//! file set is compared byte for byte with the store. Targets that already
//! synced are never rolled back when a sibling fails.

use std::collections::BTreeSet;
use std::path::Path;

use futures::future::join_all;

use crate::error::{AppError, Result};
use crate::models::{DeploymentTarget, SyncReport, TargetFailure};
use crate::storage::LocalStorePaths;
use crate::storage::local::{list_eligible, write_atomic};

/// One eligible file loaded from the local store.
#[derive(Debug, Clone)]
struct SourceFile {
    name: String,
    bytes: Vec<u8>,
}

/// Copies the local store into every configured target.
#[derive(Debug, Clone)]
pub struct Distributor {
    targets: Vec<DeploymentTarget>,
}

impl Distributor {
    pub fn new(targets: Vec<DeploymentTarget>) -> Self {
        Self { targets }
    }

    /// Sync every target with the store at `paths.root`.
    ///
    /// Fails only when the store itself is unusable; per-target failures are
    /// listed in the report (see [`SyncReport::ensure_complete`]).
    pub async fn sync(&self, paths: &LocalStorePaths) -> Result<SyncReport> {
        let files = read_source(&paths.root).await?;
        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        log::info!(
            "Syncing {} files to {} targets",
            files.len(),
            self.targets.len()
        );

        let files = files.as_slice();
        let results = join_all(
            self.targets
                .iter()
                .map(|target| async move { (target, sync_target(target, files).await) }),
        )
        .await;

        let mut report = SyncReport {
            files: names,
            ..Default::default()
        };
        for (target, result) in results {
            match result {
                Ok(()) => {
                    log::info!("✓ {} ({})", target.name, target.root_path.display());
                    report.targets_synced.push(target.name.clone());
                }
                Err(e) => {
                    log::error!("✗ {} ({}): {}", target.name, target.root_path.display(), e);
                    report.targets_failed.push(TargetFailure {
                        name: target.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }
}

async fn read_source(root: &Path) -> Result<Vec<SourceFile>> {
    if !tokio::fs::try_exists(root).await? {
        return Err(AppError::StoreMissing {
            path: root.to_path_buf(),
        });
    }

    let names = list_eligible(root).await?;
    if names.is_empty() {
        return Err(AppError::NoEligibleFiles {
            path: root.to_path_buf(),
        });
    }

    let mut files = Vec::with_capacity(names.len());
    for name in names {
        let bytes = tokio::fs::read(root.join(&name)).await?;
        files.push(SourceFile { name, bytes });
    }
    Ok(files)
}

async fn sync_target(target: &DeploymentTarget, files: &[SourceFile]) -> Result<()> {
    let root = &target.root_path;
    tokio::fs::create_dir_all(root).await?;

    for file in files {
        write_atomic(&root.join(&file.name), &file.bytes).await?;
        log::debug!("{}: copied {}", target.name, file.name);
    }

    let wanted: BTreeSet<&str> = files.iter().map(|f| f.name.as_str()).collect();
    for stale in list_eligible(root).await? {
        if !wanted.contains(stale.as_str()) {
            tokio::fs::remove_file(root.join(&stale)).await?;
            log::info!("{}: removed stale {}", target.name, stale);
        }
    }

    verify_target(root, files).await
}

/// Check that `root` holds exactly the source data files, byte for byte.
async fn verify_target(root: &Path, files: &[SourceFile]) -> Result<()> {
    let present = list_eligible(root).await?;
    if present.len() != files.len() {
        return Err(AppError::validation(format!(
            "expected {} data files, found {}",
            files.len(),
            present.len()
        )));
    }

    for (name, file) in present.iter().zip(files) {
        if *name != file.name {
            return Err(AppError::validation(format!(
                "file set differs: found {name}, expected {}",
                file.name
            )));
        }
        let bytes = tokio::fs::read(root.join(name)).await?;
        if bytes != file.bytes {
            return Err(AppError::validation(format!("{name} differs from the store")));
        }
    }
    Ok(())
}
