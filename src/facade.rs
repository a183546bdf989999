// src/facade.rs

//! HTTP trigger contract.
//!
//! Maps `GET /scrape` and `GET /scrape-all` onto the pipeline and renders
//! JSON bodies with status codes. Transport-agnostic: the Lambda binary
//! adapts function-URL events onto [`Facade::handle`].

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use serde_json::{Value, json};

use crate::error::Result;
use crate::models::{Config, RunReport, WorkUnit};
use crate::pipeline::{CancelSignal, Orchestrator, RunOptions, run_scrape_all, run_single};
use crate::storage::LocalStore;

/// Status code plus JSON body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerResponse {
    pub status: u16,
    pub body: Value,
}

impl TriggerResponse {
    fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    fn error(status: u16, error: &str, details: impl ToString) -> Self {
        Self::new(
            status,
            json!({ "error": error, "details": details.to_string() }),
        )
    }
}

/// Pipeline entry points behind the HTTP contract.
pub struct Facade {
    config: Config,
    orchestrator: Orchestrator,
    store: LocalStore,
}

impl Facade {
    pub fn new(config: Config, orchestrator: Orchestrator) -> Self {
        let store = LocalStore::from_config(&config.storage);
        Self {
            config,
            orchestrator,
            store,
        }
    }

    /// Facade over the HTTP catalog client.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let orchestrator = Orchestrator::from_config(&config)?;
        Ok(Self::new(config, orchestrator))
    }

    /// Load `path` (defaults when absent), apply environment overrides.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Config::load_or_default(path);
        config.apply_env();
        Self::from_config(config)
    }

    /// Route a request by path.
    pub async fn handle(&self, path: &str, query: &HashMap<String, String>) -> TriggerResponse {
        match path.trim_end_matches('/') {
            "/scrape" => {
                self.scrape(
                    query.get("term").map(String::as_str),
                    query.get("subject").map(String::as_str),
                )
                .await
            }
            "/scrape-all" => self.scrape_all().await,
            other => TriggerResponse::new(
                404,
                json!({ "error": format!("Not found: {}", if other.is_empty() { "/" } else { other }) }),
            ),
        }
    }

    /// `GET /scrape?term=..&subject=..`
    pub async fn scrape(&self, term: Option<&str>, subject: Option<&str>) -> TriggerResponse {
        let term = term.map(str::trim).filter(|t| !t.is_empty());
        let subject = subject.map(str::trim).filter(|s| !s.is_empty());
        let (Some(term), Some(subject)) = (term, subject) else {
            return TriggerResponse::error(
                400,
                "Missing parameter",
                "both 'term' and 'subject' are required",
            );
        };

        let unit = WorkUnit::new(term, subject);
        match run_single(&self.config, &self.orchestrator, &unit).await {
            Ok(records) => TriggerResponse::new(
                200,
                json!({
                    "source": self.config.catalog.source_name,
                    "count": records.len(),
                    "data": records,
                }),
            ),
            Err(e) => {
                log::error!("Scrape of {} failed: {}", unit, e);
                TriggerResponse::error(500, "Scrape failed", e)
            }
        }
    }

    /// `GET /scrape-all`; sync runs unless disabled by configuration.
    pub async fn scrape_all(&self) -> TriggerResponse {
        let options = RunOptions {
            sync: self.config.sync_enabled(true),
            force: false,
        };
        let result = run_scrape_all(
            &self.config,
            &self.orchestrator,
            &self.store,
            options,
            &CancelSignal::never(),
        )
        .await;

        match result {
            Ok(report) if report.success => TriggerResponse::new(
                200,
                json!({
                    "success": true,
                    "message": summary_message(&report),
                    "timestamp": report.finished_at.to_rfc3339(),
                    "report": report,
                }),
            ),
            Ok(report) if report.scrape_succeeded() && self.config.deploy.allow_partial => {
                log::warn!("Partial sync accepted: {}", summary_message(&report));
                TriggerResponse::new(
                    200,
                    json!({
                        "success": false,
                        "message": summary_message(&report),
                        "timestamp": report.finished_at.to_rfc3339(),
                        "report": report,
                    }),
                )
            }
            Ok(report) => {
                let details = match report.ensure_synced() {
                    Err(e) => e.to_string(),
                    Ok(()) => "run did not complete".to_string(),
                };
                TriggerResponse::new(
                    500,
                    json!({
                        "error": "Sync failed",
                        "details": details,
                        "scrapeSucceeded": report.scrape_succeeded(),
                        "report": report,
                    }),
                )
            }
            Err(e) => {
                log::error!("Scrape-all failed: {}", e);
                TriggerResponse::new(
                    500,
                    json!({
                        "error": "Scrape failed",
                        "details": e.to_string(),
                        "scrapeSucceeded": false,
                    }),
                )
            }
        }
    }
}

fn summary_message(report: &RunReport) -> String {
    let mut message = format!(
        "Scraped {}/{} units, wrote {} records in {} terms",
        report.units_succeeded,
        report.units_attempted,
        report.records_written,
        report.terms_written.len()
    );
    if report.sync_skipped {
        message.push_str("; sync skipped");
    } else {
        message.push_str(&format!("; synced {} targets", report.targets_synced.len()));
    }
    message
}
