//! Shared fixtures: a scripted catalog and config builders.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use catalog_sync::error::{AppError, Result};
use catalog_sync::models::{Config, PageFragment, RawPage, WorkUnit};
use catalog_sync::pipeline::{Orchestrator, OrchestratorOptions};
use catalog_sync::services::{CatalogFetcher, RecordParser};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// What the fake catalog does on one fetch of a unit.
#[derive(Debug, Clone)]
pub enum Step {
    /// Result pages, fetched one second apart
    Pages(Vec<String>),
    Timeout,
    Status(u16),
    /// Never answers
    Hang,
    /// Panics inside the fetch
    Panic,
    /// Waits, then serves the pages
    Delayed(u64, Vec<String>),
}

/// In-memory catalog replaying a script per unit; the last step repeats.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<WorkUnit, VecDeque<Step>>>,
    calls: Mutex<HashMap<WorkUnit, u32>>,
    base: Mutex<Option<DateTime<Utc>>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, term: &str, subject: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(WorkUnit::new(term, subject), steps.into());
        self
    }

    /// Timestamp of the first page served; later pages are one second apart.
    pub fn fetched_from(self, base: DateTime<Utc>) -> Self {
        *self.base.lock().unwrap() = Some(base);
        self
    }

    pub fn calls(&self, term: &str, subject: &str) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(&WorkUnit::new(term, subject))
            .copied()
            .unwrap_or(0)
    }

    fn next_step(&self, unit: &WorkUnit) -> Step {
        *self.calls.lock().unwrap().entry(unit.clone()).or_default() += 1;
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(unit) {
            Some(steps) if steps.len() > 1 => steps.pop_front().unwrap(),
            Some(steps) => steps.front().cloned().unwrap_or(Step::Status(404)),
            None => Step::Status(404),
        }
    }
}

#[async_trait]
impl CatalogFetcher for ScriptedFetcher {
    async fn fetch(&self, unit: &WorkUnit) -> Result<RawPage> {
        let url = format!(
            "https://catalog.test/search?term={}&subject={}",
            unit.term, unit.subject
        );
        let step = match self.next_step(unit) {
            Step::Delayed(ms, bodies) => {
                tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
                Step::Pages(bodies)
            }
            other => other,
        };
        match step {
            Step::Pages(bodies) => {
                let base = self
                    .base
                    .lock()
                    .unwrap()
                    .unwrap_or_else(|| Utc.with_ymd_and_hms(2024, 8, 1, 12, 0, 0).unwrap());
                let mut page = RawPage::new(unit.clone());
                for (i, body) in bodies.into_iter().enumerate() {
                    page.fragments.push(PageFragment {
                        url: format!("{url}&page={}", i + 1),
                        body,
                        fetched_at: base + Duration::seconds(i as i64),
                    });
                }
                Ok(page)
            }
            Step::Timeout => Err(AppError::Timeout { url }),
            Step::Status(status) => Err(AppError::HttpStatus { status, url }),
            Step::Hang => std::future::pending().await,
            Step::Panic => panic!("scripted panic for {unit}"),
            Step::Delayed(..) => unreachable!("resolved above"),
        }
    }
}

/// A results page holding `(course_code, section, title)` rows.
pub fn results_page(rows: &[(&str, &str, &str)]) -> String {
    let rows: String = rows
        .iter()
        .map(|(code, section, title)| {
            format!(
                r#"<tr class="section-row">
                    <td class="course-code">{code}</td>
                    <td class="course-title">{title}</td>
                    <td class="section">{section}</td>
                    <td class="schedule"><span class="slot">Mo 08:30 - 10:00</span></td>
                    <td class="instructor">Staff</td>
                    <td class="capacity">0 / 120</td>
                    <td class="status">Open</td>
                </tr>"#
            )
        })
        .collect();
    format!(r#"<html><body><table class="course-results">{rows}</table></body></html>"#)
}

/// The catalog's "no offerings" page.
pub fn empty_page() -> String {
    r#"<html><body><div class="no-results">No classes found</div></body></html>"#.to_string()
}

/// `n` distinct sections of one subject.
pub fn many_rows(subject: &str, n: usize) -> String {
    let codes: Vec<String> = (0..n).map(|i| format!("{subject}{}", 1000 + i)).collect();
    let rows: Vec<(&str, &str, &str)> = codes.iter().map(|c| (c.as_str(), "A00", "Course")).collect();
    results_page(&rows)
}

/// Config scraping `terms × subjects` into `store`, with fast retries.
pub fn test_config(store: &Path, terms: &[&str], subjects: &[&str]) -> Config {
    let mut config = Config::default();
    config.scrape.terms = terms.iter().map(|s| s.to_string()).collect();
    config.scrape.subjects = subjects.iter().map(|s| s.to_string()).collect();
    config.storage.local_dir = store.to_path_buf();
    config.catalog.max_concurrent = 2;
    config.catalog.max_retries = 3;
    config.catalog.backoff_base_ms = 1;
    config.catalog.backoff_max_ms = 5;
    config.cleaning.professor_placeholders = vec!["Staff".into()];
    config
}

pub fn orchestrator(config: &Config, fetcher: Arc<ScriptedFetcher>) -> Orchestrator {
    let parser = RecordParser::new(&config.parser, &config.cleaning).unwrap();
    Orchestrator::new(fetcher, parser, OrchestratorOptions::from_config(&config.catalog))
}
