// src/pipeline/orchestrator.rs

//! Scrape orchestrator.
//!
//! Crosses terms and subjects into work units and drains them with a fixed
//! pool of tokio workers sharing one queue. Transient failures go back on
//! the queue with exponential backoff; terminal ones are recorded and the
//! remaining units carry on.

use std::any::Any;
use std::collections::{BTreeMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::{AppError, Result};
use crate::models::{
    CatalogConfig, Config, CourseRecord, SubjectCode, TermId, UnitFailure, UnitState, WorkUnit,
};
use crate::pipeline::CancelSignal;
use crate::services::{CatalogFetcher, HttpCatalogClient, RecordParser};

/// Pool and retry settings.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub concurrency: usize,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl OrchestratorOptions {
    pub fn from_config(config: &CatalogConfig) -> Self {
        Self {
            concurrency: config.max_concurrent.max(1),
            max_retries: config.max_retries,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.backoff_base
            .checked_mul(factor)
            .unwrap_or(self.backoff_max)
            .min(self.backoff_max)
    }
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::from_config(&CatalogConfig::default())
    }
}

/// Everything a run produced, including the per-unit accounting.
#[derive(Debug, Default)]
pub struct ScrapeOutcome {
    /// Parsed records keyed by term, not yet deduplicated
    pub records: BTreeMap<TermId, Vec<CourseRecord>>,
    pub succeeded: Vec<WorkUnit>,
    pub failed: Vec<UnitFailure>,
    /// Size of the unit matrix
    pub units_attempted: usize,
    pub cancelled: bool,
    /// Last state of every unit of the matrix
    pub states: BTreeMap<WorkUnit, UnitState>,
}

impl ScrapeOutcome {
    pub fn record_count(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    /// Units that never reached a terminal state.
    pub fn units_unattempted(&self) -> usize {
        self.units_attempted
            .saturating_sub(self.succeeded.len() + self.failed.len())
    }

    /// Units left pending or in flight, in key order.
    pub fn unfinished_units(&self) -> Vec<&WorkUnit> {
        self.states
            .iter()
            .filter(|(_, s)| matches!(s, UnitState::Pending | UnitState::InFlight))
            .map(|(unit, _)| unit)
            .collect()
    }

    /// Terms with at least one succeeded unit.
    pub fn succeeded_terms(&self) -> Vec<TermId> {
        let mut terms: Vec<TermId> = self.succeeded.iter().map(|u| u.term.clone()).collect();
        terms.sort();
        terms.dedup();
        terms
    }

    /// Fail when nothing succeeded and the run was not cancelled.
    pub fn ensure_any_succeeded(&self) -> Result<()> {
        if self.succeeded.is_empty() && !self.cancelled {
            Err(AppError::NoSuccessfulUnits {
                attempted: self.units_attempted,
            })
        } else {
            Ok(())
        }
    }
}

#[derive(Debug)]
struct Job {
    unit: WorkUnit,
    retries: u32,
    not_before: Option<Instant>,
}

#[derive(Debug)]
struct QueueState {
    pending: VecDeque<Job>,
    /// Units not yet succeeded or terminally failed
    outstanding: usize,
}

/// Shared job queue; workers exit once nothing is outstanding.
#[derive(Debug)]
struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl WorkQueue {
    fn new(units: Vec<WorkUnit>) -> Self {
        let pending: VecDeque<Job> = units
            .into_iter()
            .map(|unit| Job {
                unit,
                retries: 0,
                not_before: None,
            })
            .collect();
        Self {
            state: Mutex::new(QueueState {
                outstanding: pending.len(),
                pending,
            }),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Next job, or `None` when the run is drained or cancelled.
    async fn next(&self, cancel: &CancelSignal) -> Option<Job> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if cancel.is_cancelled() {
                return None;
            }
            {
                let mut state = self.lock();
                if let Some(job) = state.pending.pop_front() {
                    return Some(job);
                }
                if state.outstanding == 0 {
                    return None;
                }
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = cancel.cancelled() => return None,
            }
        }
    }

    /// Put a job back as pending.
    fn requeue(&self, job: Job) {
        self.lock().pending.push_back(job);
        self.notify.notify_one();
    }

    /// Mark one unit terminal.
    fn finish(&self) {
        let drained = {
            let mut state = self.lock();
            state.outstanding = state.outstanding.saturating_sub(1);
            state.outstanding == 0
        };
        if drained {
            self.notify.notify_waiters();
        }
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    records: BTreeMap<TermId, Vec<CourseRecord>>,
    succeeded: Vec<WorkUnit>,
    failed: Vec<UnitFailure>,
    states: BTreeMap<WorkUnit, UnitState>,
}

impl Accumulator {
    fn set_state(&mut self, unit: &WorkUnit, state: UnitState) {
        self.states.insert(unit.clone(), state);
    }
}

/// Fetch-and-parse scheduler over a [`CatalogFetcher`].
#[derive(Clone)]
pub struct Orchestrator {
    fetcher: Arc<dyn CatalogFetcher>,
    parser: Arc<RecordParser>,
    options: OrchestratorOptions,
}

impl Orchestrator {
    pub fn new(
        fetcher: Arc<dyn CatalogFetcher>,
        parser: RecordParser,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            fetcher,
            parser: Arc::new(parser),
            options,
        }
    }

    /// Orchestrator over the HTTP catalog client described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = HttpCatalogClient::new(config)?;
        let parser = RecordParser::new(&config.parser, &config.cleaning)?;
        Ok(Self::new(
            Arc::new(fetcher),
            parser,
            OrchestratorOptions::from_config(&config.catalog),
        ))
    }

    /// Scrape the full term × subject matrix.
    pub async fn run(
        &self,
        terms: &[TermId],
        subjects: &[SubjectCode],
        cancel: &CancelSignal,
    ) -> Result<ScrapeOutcome> {
        self.run_units(WorkUnit::matrix(terms, subjects), cancel)
            .await
    }

    /// Scrape an explicit list of units.
    pub async fn run_units(&self, units: Vec<WorkUnit>, cancel: &CancelSignal) -> Result<ScrapeOutcome> {
        let units_attempted = units.len();
        let queue = Arc::new(WorkQueue::new(units.clone()));
        let acc = Arc::new(Mutex::new(Accumulator::default()));
        {
            let mut acc = lock(&acc);
            for unit in &units {
                acc.set_state(unit, UnitState::Pending);
            }
        }

        let workers = self.options.concurrency.min(units_attempted).max(1);
        log::info!(
            "Scraping {} units with {} workers (max {} retries)",
            units_attempted,
            workers,
            self.options.max_retries
        );

        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let this = self.clone();
                let queue = Arc::clone(&queue);
                let acc = Arc::clone(&acc);
                let cancel = cancel.clone();
                tokio::spawn(async move { this.worker(id, queue, acc, cancel).await })
            })
            .collect();

        for joined in join_all(handles).await {
            joined.map_err(|e| AppError::Worker(e.to_string()))?;
        }

        let mut acc = lock(&acc);
        let cancelled = cancel.is_cancelled();

        let mut succeeded = std::mem::take(&mut acc.succeeded);
        succeeded.sort();
        let mut failed = std::mem::take(&mut acc.failed);
        failed.sort_by(|a, b| a.unit.cmp(&b.unit));

        Ok(ScrapeOutcome {
            records: std::mem::take(&mut acc.records),
            succeeded,
            failed,
            units_attempted,
            cancelled,
            states: std::mem::take(&mut acc.states),
        })
    }

    async fn worker(
        &self,
        id: usize,
        queue: Arc<WorkQueue>,
        acc: Arc<Mutex<Accumulator>>,
        cancel: CancelSignal,
    ) {
        while let Some(mut job) = queue.next(&cancel).await {
            if let Some(at) = job.not_before {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep_until(at) => {}
                }
            }

            lock(&acc).set_state(&job.unit, UnitState::InFlight);
            log::debug!("worker {}: {} (attempt {})", id, job.unit, job.retries + 1);

            // Dropping the attempt future aborts the in-flight request
            let attempt = AssertUnwindSafe(self.attempt(&job.unit)).catch_unwind();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = attempt => result.unwrap_or_else(|panic| {
                    Err(AppError::UnitPanicked {
                        unit: job.unit.to_string(),
                        message: panic_message(&*panic),
                    })
                }),
            };

            match result {
                Ok(records) => {
                    log::info!("✓ {}: {} records", job.unit, records.len());
                    let mut acc = lock(&acc);
                    acc.set_state(&job.unit, UnitState::Succeeded);
                    acc.records
                        .entry(job.unit.term.clone())
                        .or_default()
                        .extend(records);
                    acc.succeeded.push(job.unit);
                    drop(acc);
                    queue.finish();
                }
                Err(e) if e.is_retryable() && job.retries < self.options.max_retries => {
                    job.retries += 1;
                    let delay = self.options.backoff(job.retries);
                    log::warn!(
                        "{}: {} (retry {}/{} in {:?})",
                        job.unit,
                        e,
                        job.retries,
                        self.options.max_retries,
                        delay
                    );
                    lock(&acc).set_state(&job.unit, UnitState::Pending);
                    job.not_before = Some(Instant::now() + delay);
                    queue.requeue(job);
                }
                Err(e) => {
                    log::error!("✗ {}: {}", job.unit, e);
                    let mut acc = lock(&acc);
                    acc.set_state(&job.unit, UnitState::Failed);
                    acc.failed.push(UnitFailure {
                        class: e.class(),
                        message: e.to_string(),
                        attempts: job.retries + 1,
                        unit: job.unit,
                    });
                    drop(acc);
                    queue.finish();
                }
            }
        }
    }

    /// One fetch plus parse, no retry.
    pub async fn attempt(&self, unit: &WorkUnit) -> Result<Vec<CourseRecord>> {
        let raw = self.fetcher.fetch(unit).await?;
        self.parser.parse(&raw, unit)
    }

    /// Scrape a single unit with the same retry policy as a full run.
    ///
    /// Returns the last error when the unit does not succeed.
    pub async fn scrape_unit(&self, unit: &WorkUnit) -> Result<Vec<CourseRecord>> {
        let mut retries = 0;
        loop {
            match self.attempt(unit).await {
                Err(e) if e.is_retryable() && retries < self.options.max_retries => {
                    retries += 1;
                    let delay = self.options.backoff(retries);
                    log::warn!("{}: {} (retry {} in {:?})", unit, e, retries, delay);
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn lock(acc: &Mutex<Accumulator>) -> MutexGuard<'_, Accumulator> {
    acc.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let options = OrchestratorOptions {
            concurrency: 1,
            max_retries: 5,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_millis(3_000),
        };
        assert_eq!(options.backoff(1), Duration::from_millis(500));
        assert_eq!(options.backoff(2), Duration::from_millis(1_000));
        assert_eq!(options.backoff(3), Duration::from_millis(2_000));
        assert_eq!(options.backoff(4), Duration::from_millis(3_000));
        assert_eq!(options.backoff(40), Duration::from_millis(3_000));
    }

    #[test]
    fn test_outcome_accounting() {
        let outcome = ScrapeOutcome {
            succeeded: vec![WorkUnit::new("2024F", "CSI")],
            units_attempted: 4,
            ..Default::default()
        };
        assert_eq!(outcome.units_unattempted(), 3);
        assert!(outcome.ensure_any_succeeded().is_ok());
        assert_eq!(outcome.succeeded_terms(), vec!["2024F".to_string()]);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("parser bug");
        assert_eq!(panic_message(&*boxed), "parser bug");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("index out of range"));
        assert_eq!(panic_message(&*boxed), "index out of range");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*boxed), "unknown panic");
    }

    #[test]
    fn test_zero_success_fails_unless_cancelled() {
        let mut outcome = ScrapeOutcome {
            units_attempted: 2,
            ..Default::default()
        };
        assert!(matches!(
            outcome.ensure_any_succeeded(),
            Err(AppError::NoSuccessfulUnits { attempted: 2 })
        ));
        outcome.cancelled = true;
        assert!(outcome.ensure_any_succeeded().is_ok());
    }

    #[tokio::test]
    async fn test_queue_drains() {
        let queue = WorkQueue::new(vec![WorkUnit::new("2024F", "CSI")]);
        let cancel = CancelSignal::never();

        let job = queue.next(&cancel).await.unwrap();
        assert_eq!(job.unit.subject, "CSI");
        queue.finish();
        assert!(queue.next(&cancel).await.is_none());
    }

    #[tokio::test]
    async fn test_queue_requeue_wakes_waiter() {
        let queue = Arc::new(WorkQueue::new(vec![WorkUnit::new("2024F", "MAT")]));
        let cancel = CancelSignal::never();
        let job = queue.next(&cancel).await.unwrap();

        let waiter = tokio::spawn({
            let queue = Arc::clone(&queue);
            let cancel = cancel.clone();
            async move { queue.next(&cancel).await.map(|j| j.unit) }
        });
        tokio::task::yield_now().await;
        queue.requeue(job);

        let unit = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unit, Some(WorkUnit::new("2024F", "MAT")));
    }
}
