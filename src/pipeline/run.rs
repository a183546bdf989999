// src/pipeline/run.rs

//! Pipeline entry points.
//!
//! - `run_scrape_all`: scrape the matrix, publish term files, optionally sync
//! - `run_single`: scrape one (term, subject) pair without touching the store
//! - `run_deploy`: sync an existing store to the configured targets

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{
    Config, CourseRecord, HeldBackTerm, RunReport, SyncReport, TargetFailure, TermDataset,
    TermId, WorkUnit,
};
use crate::pipeline::{
    CancelSignal, Canonicalizer, CircuitBreaker, CircuitBreakerConfig, Orchestrator,
    ScrapeOutcome, calculate_diff,
};
use crate::storage::{DatasetStorage, Distributor, LocalStore, LocalStorePaths};
use crate::utils::console;

/// Per-invocation switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Run the sync phase after publishing
    pub sync: bool,
    /// Write terms even when the circuit breaker trips
    pub force: bool,
}

/// Scrape every configured unit, publish term files and optionally sync.
///
/// Returns `Err` only for run-level failures (lock held, no unit succeeded,
/// store write failure). A failed target is reported in the returned report,
/// whose `success` is then false.
pub async fn run_scrape_all(
    config: &Config,
    orchestrator: &Orchestrator,
    store: &LocalStore,
    options: RunOptions,
    cancel: &CancelSignal,
) -> Result<RunReport> {
    let started_at = Utc::now();
    console::header("Catalog scrape");
    let _lock = store.lock().await?;

    console::step(1, 4, "Scraping catalog");
    let outcome = orchestrator
        .run(&config.scrape.terms, &config.scrape.subjects, cancel)
        .await?;
    outcome.ensure_any_succeeded()?;

    let mut report = RunReport {
        success: false,
        cancelled: outcome.cancelled,
        units_attempted: outcome.units_attempted,
        units_succeeded: outcome.succeeded.len(),
        units_failed: outcome.failed.clone(),
        records_written: 0,
        terms_written: Vec::new(),
        terms_held_back: Vec::new(),
        changes: Vec::new(),
        sync_skipped: true,
        targets_synced: Vec::new(),
        targets_failed: Vec::new(),
        started_at,
        finished_at: started_at,
    };

    if outcome.cancelled {
        log::warn!(
            "Run cancelled: {} succeeded, {} failed, {} unattempted; term files left untouched",
            outcome.succeeded.len(),
            outcome.failed.len(),
            outcome.units_unattempted()
        );
        for unit in outcome.unfinished_units() {
            console::sub_item(&format!("unfinished: {}", unit));
        }
        return finish(store, report).await;
    }

    console::step(2, 4, "Canonicalizing records");
    let datasets = canonicalize(config, &outcome)?;

    console::step(3, 4, "Publishing term files");
    let paths = publish(config, store, &outcome, datasets, options.force, &mut report).await?;

    if options.sync {
        console::step(4, 4, "Syncing deployment targets");
        sync_into_report(config, &paths, &mut report).await;
    } else {
        console::step(4, 4, "Sync disabled, skipping");
    }

    report.success = report.targets_failed.is_empty();
    finish(store, report).await
}

async fn finish(store: &LocalStore, mut report: RunReport) -> Result<RunReport> {
    report.finished_at = Utc::now();
    store.write_report(&report).await?;

    console::summary(
        "Run",
        &[
            ("Units attempted", report.units_attempted.to_string()),
            ("Units succeeded", report.units_succeeded.to_string()),
            ("Units failed", report.units_failed.len().to_string()),
            ("Records written", report.records_written.to_string()),
            ("Terms held back", report.terms_held_back.len().to_string()),
            ("Targets synced", report.targets_synced.len().to_string()),
            ("Targets failed", report.targets_failed.len().to_string()),
        ],
    );
    Ok(report)
}

/// One dataset per term with a succeeded unit; such terms get a dataset
/// even when it holds no records.
fn canonicalize(config: &Config, outcome: &ScrapeOutcome) -> Result<BTreeMap<TermId, TermDataset>> {
    let records = outcome.records.values().flatten().cloned();
    let mut datasets = Canonicalizer::new(config.merge.tie_break).canonicalize(records)?;

    for term in outcome.succeeded_terms() {
        datasets
            .entry(term.clone())
            .or_insert_with(|| TermDataset::new(term));
    }

    for dataset in datasets.values() {
        console::sub_item(&format!("{}: {} records", dataset.term, dataset.len()));
    }
    Ok(datasets)
}

async fn publish(
    config: &Config,
    store: &LocalStore,
    outcome: &ScrapeOutcome,
    datasets: BTreeMap<TermId, TermDataset>,
    force: bool,
    report: &mut RunReport,
) -> Result<LocalStorePaths> {
    let breaker = CircuitBreaker::with_config(CircuitBreakerConfig::from(&config.storage));
    let succeeded: HashSet<&WorkUnit> = outcome.succeeded.iter().collect();
    let subjects: Vec<String> = config
        .scrape
        .subjects
        .iter()
        .map(|s| s.trim().to_string())
        .collect();

    let mut ready = Vec::new();
    for (term, mut dataset) in datasets {
        // An unreadable previous file only loses the baseline; I/O errors stay fatal
        let previous = match store.load_term(&term).await {
            Ok(previous) => previous,
            Err(AppError::Json(e)) if force => {
                log::warn!("{}: previous data file unreadable, replacing it (forced): {}", term, e);
                None
            }
            Err(AppError::Json(e)) => {
                log::warn!("{}: previous data file unreadable: {}", term, e);
                report.terms_held_back.push(HeldBackTerm {
                    term: term.clone(),
                    reason: format!("previous data file unreadable: {e}"),
                });
                continue;
            }
            Err(e) => return Err(e),
        };

        let carried = match (&previous, config.storage.carry_forward) {
            (Some(previous), true) => {
                let missing: HashSet<&str> = subjects
                    .iter()
                    .filter(|s| !succeeded.contains(&&WorkUnit::new(term.as_str(), s.as_str())))
                    .map(String::as_str)
                    .collect();
                carry_forward(&mut dataset, previous, &missing)
            }
            _ => 0,
        };
        if carried > 0 {
            log::info!("{}: carried forward {} records of failed subjects", term, carried);
        }

        let previous_count = previous.as_ref().map(TermDataset::len);
        if let Err(e) = breaker.validate(&term, dataset.len(), previous_count) {
            if force {
                log::warn!("{}: {} (forced)", term, e);
            } else {
                report.terms_held_back.push(HeldBackTerm {
                    term: term.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        }

        let diff = calculate_diff(previous.as_ref(), &dataset);
        let change = diff.to_change(&term, carried);
        log::info!(
            "{}: +{} ~{} -{}",
            term,
            change.added,
            change.updated,
            change.removed
        );
        report.changes.push(change);
        ready.push(dataset);
    }

    let refs: Vec<&TermDataset> = ready.iter().collect();
    let paths = store.persist(&refs).await?;

    report.records_written = ready.iter().map(TermDataset::len).sum();
    report.terms_written = ready.iter().map(|ds| ds.term.clone()).collect();
    console::success(&format!(
        "{} records in {} term files",
        report.records_written,
        report.terms_written.len()
    ));
    Ok(paths)
}

/// Copy records of `subjects` from `previous` where the key is absent.
pub fn carry_forward(
    dataset: &mut TermDataset,
    previous: &TermDataset,
    subjects: &HashSet<&str>,
) -> usize {
    let mut carried = 0;
    for (key, record) in &previous.records {
        if subjects.contains(key.subject.as_str()) && !dataset.contains_key(key) {
            dataset.records.insert(key.clone(), record.clone());
            carried += 1;
        }
    }
    carried
}

async fn sync_into_report(config: &Config, paths: &LocalStorePaths, report: &mut RunReport) {
    if config.deploy.targets.is_empty() {
        log::warn!("Sync enabled but no deployment targets configured");
        return;
    }

    report.sync_skipped = false;
    match Distributor::new(config.deploy.targets.clone()).sync(paths).await {
        Ok(sync) => {
            report.targets_synced = sync.targets_synced;
            report.targets_failed = sync.targets_failed;
        }
        Err(e) => {
            log::error!("Sync aborted: {}", e);
            report.targets_failed = config
                .deploy
                .targets
                .iter()
                .map(|t| TargetFailure {
                    name: t.name.clone(),
                    reason: e.to_string(),
                })
                .collect();
        }
    }
}

/// Scrape one unit and return its deduplicated records in key order.
pub async fn run_single(
    config: &Config,
    orchestrator: &Orchestrator,
    unit: &WorkUnit,
) -> Result<Vec<CourseRecord>> {
    log::info!("Scraping {}", unit);
    let records = orchestrator.scrape_unit(unit).await?;
    let datasets = Canonicalizer::new(config.merge.tie_break).canonicalize(records)?;
    Ok(datasets
        .into_values()
        .flat_map(|ds| ds.records.into_values())
        .collect())
}

/// Sync an existing local store to every configured target.
///
/// Fails when the store is absent or holds no eligible file; target
/// failures are left in the report for the caller to judge.
pub async fn run_deploy(config: &Config, store: &LocalStore) -> Result<SyncReport> {
    console::header("Catalog deploy");
    let root = store.root();
    if !tokio::fs::try_exists(root).await? {
        return Err(AppError::StoreMissing {
            path: root.to_path_buf(),
        });
    }
    if config.deploy.targets.is_empty() {
        return Err(AppError::config("No deployment targets configured"));
    }
    let _lock = store.lock().await?;

    let paths = LocalStorePaths {
        root: root.to_path_buf(),
        written: Vec::new(),
    };
    let report = Distributor::new(config.deploy.targets.clone())
        .sync(&paths)
        .await?;

    for name in &report.files {
        console::sub_item(name);
    }
    console::summary(
        "Deploy",
        &[
            ("Files", report.files.len().to_string()),
            ("Targets synced", report.targets_synced.join(", ")),
            (
                "Targets failed",
                report
                    .targets_failed
                    .iter()
                    .map(|t| format!("{} ({})", t.name, t.reason))
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        ],
    );
    Ok(report)
}
