//! Application configuration structures.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::CatalogSelectors;
use crate::pipeline::TieBreak;
use crate::services::RecordParser;
use crate::services::parser::compile_optional;
use crate::utils::term_slug;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Catalog source and HTTP behavior
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// The term × subject matrix to scrape
    #[serde(default)]
    pub scrape: ScrapeConfig,

    /// Result page selectors
    #[serde(default)]
    pub parser: CatalogSelectors,

    /// Text preprocessing settings
    #[serde(default)]
    pub cleaning: CleaningConfig,

    /// Duplicate resolution
    #[serde(default)]
    pub merge: MergeConfig,

    /// Local canonical store
    #[serde(default)]
    pub storage: StorageConfig,

    /// Deployment targets
    #[serde(default)]
    pub deploy: DeployConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("CATALOG_SYNC_ENABLED") {
            match parse_flag(&value) {
                Some(flag) => self.deploy.enabled = Some(flag),
                None => log::warn!("Ignoring CATALOG_SYNC_ENABLED={value:?}: not a boolean"),
            }
        }
        if let Some(url) = lookup("CATALOG_SEARCH_URL") {
            self.catalog.search_url = url;
        }
        if let Some(dir) = lookup("CATALOG_STORE_DIR") {
            self.storage.local_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("CATALOG_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.catalog.timeout_secs = secs;
        }
        if let Some(n) = lookup("CATALOG_MAX_CONCURRENT").and_then(|v| v.parse().ok()) {
            self.catalog.max_concurrent = n;
        }
        if let Some(ms) = lookup("CATALOG_REQUEST_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.catalog.request_delay_ms = ms;
        }
        if let Some(n) = lookup("CATALOG_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            self.catalog.max_retries = n;
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.catalog.search_url).map_err(|e| {
            AppError::validation(format!(
                "catalog.search_url '{}' is not a URL: {e}",
                self.catalog.search_url
            ))
        })?;
        if self.catalog.user_agent.trim().is_empty() {
            return Err(AppError::validation("catalog.user_agent is empty"));
        }
        if self.catalog.timeout_secs == 0 {
            return Err(AppError::validation("catalog.timeout_secs must be > 0"));
        }
        if self.catalog.max_concurrent == 0 {
            return Err(AppError::validation("catalog.max_concurrent must be > 0"));
        }
        if self.catalog.max_pages == 0 {
            return Err(AppError::validation("catalog.max_pages must be > 0"));
        }
        if self.storage.max_drop_percent > 100 {
            return Err(AppError::validation(
                "storage.max_drop_percent must be within 0-100",
            ));
        }
        self.scrape.validate()?;
        self.deploy.validate(&self.storage.local_dir)?;

        // Compiles every selector; optional ones may be left empty
        RecordParser::new(&self.parser, &self.cleaning)?;
        if let Some(next) = self.parser.next_page_selector.as_deref() {
            compile_optional(next)?;
        }
        Ok(())
    }

    /// Whether the sync phase runs, given the caller's default.
    pub fn sync_enabled(&self, default: bool) -> bool {
        self.deploy.enabled.unwrap_or(default)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Catalog endpoint and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Label reported as `source` by the single-unit trigger
    #[serde(default = "defaults::source_name")]
    pub source_name: String,

    /// Search endpoint; term and subject are appended as query parameters
    #[serde(default = "defaults::search_url")]
    pub search_url: String,

    #[serde(default = "defaults::term_param")]
    pub term_param: String,

    #[serde(default = "defaults::subject_param")]
    pub subject_param: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Minimum spacing between request starts across all workers
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Worker pool size
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Retries per unit for transient failures
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    #[serde(default = "defaults::backoff_base")]
    pub backoff_base_ms: u64,

    #[serde(default = "defaults::backoff_max")]
    pub backoff_max_ms: u64,

    /// Upper bound on result pages followed for one unit
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            source_name: defaults::source_name(),
            search_url: defaults::search_url(),
            term_param: defaults::term_param(),
            subject_param: defaults::subject_param(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
            max_retries: defaults::max_retries(),
            backoff_base_ms: defaults::backoff_base(),
            backoff_max_ms: defaults::backoff_max(),
            max_pages: defaults::max_pages(),
        }
    }
}

/// Terms and subjects to cross.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "defaults::terms")]
    pub terms: Vec<String>,

    #[serde(default = "defaults::subjects")]
    pub subjects: Vec<String>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            terms: defaults::terms(),
            subjects: defaults::subjects(),
        }
    }
}

impl ScrapeConfig {
    fn validate(&self) -> Result<()> {
        if self.terms.is_empty() {
            return Err(AppError::validation("No terms defined"));
        }
        if self.subjects.is_empty() {
            return Err(AppError::validation("No subjects defined"));
        }
        if self.terms.iter().chain(&self.subjects).any(|s| s.trim().is_empty()) {
            return Err(AppError::validation("Blank term or subject entry"));
        }

        // Distinct terms must not share a data file
        let mut slugs: HashMap<String, &str> = HashMap::new();
        for term in &self.terms {
            let term = term.trim();
            if let Some(other) = slugs.insert(term_slug(term), term) {
                if other != term {
                    return Err(AppError::validation(format!(
                        "Terms '{other}' and '{term}' map to the same data file"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Text cleaning/preprocessing settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CleaningConfig {
    /// Patterns to remove from titles
    #[serde(default)]
    pub title_remove_patterns: Vec<String>,

    /// Professor placeholders treated as absent (e.g. "Staff")
    #[serde(default)]
    pub professor_placeholders: Vec<String>,
}

impl CleaningConfig {
    /// Collapse runs of whitespace and trim.
    pub fn normalize_whitespace(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Clean a title string.
    pub fn clean_title(&self, text: &str) -> String {
        let mut result = Self::normalize_whitespace(text);
        for pattern in &self.title_remove_patterns {
            result = result.replace(pattern, "");
        }
        result.trim().to_string()
    }

    /// Clean a professor cell; `None` when empty or a configured placeholder.
    pub fn clean_professor(&self, text: &str) -> Option<String> {
        let name = Self::normalize_whitespace(text);
        if name.is_empty()
            || self
                .professor_placeholders
                .iter()
                .any(|p| p.eq_ignore_ascii_case(&name))
        {
            None
        } else {
            Some(name)
        }
    }
}

/// Duplicate resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MergeConfig {
    #[serde(default)]
    pub tie_break: TieBreak,
}

/// Local canonical store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one data file per term
    #[serde(default = "defaults::local_dir")]
    pub local_dir: PathBuf,

    /// Largest tolerated drop in a term's record count, in percent
    #[serde(default = "defaults::max_drop_percent")]
    pub max_drop_percent: u8,

    /// Previous record count below which the drop check is skipped
    #[serde(default = "defaults::min_baseline")]
    pub min_baseline: usize,

    /// Keep previous records of subjects whose unit did not succeed
    #[serde(default = "defaults::carry_forward")]
    pub carry_forward: bool,

    /// Age in seconds after which a leftover run lock is taken over; 0 never
    #[serde(default = "defaults::lock_stale_secs")]
    pub lock_stale_secs: u64,
}

impl StorageConfig {
    pub fn lock_stale_after(&self) -> Option<Duration> {
        (self.lock_stale_secs > 0).then(|| Duration::from_secs(self.lock_stale_secs))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            local_dir: defaults::local_dir(),
            max_drop_percent: defaults::max_drop_percent(),
            min_baseline: defaults::min_baseline(),
            carry_forward: defaults::carry_forward(),
            lock_stale_secs: defaults::lock_stale_secs(),
        }
    }
}

/// A directory that must mirror the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentTarget {
    pub name: String,
    pub root_path: PathBuf,
}

impl DeploymentTarget {
    pub fn new(name: impl Into<String>, root_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root_path: root_path.into(),
        }
    }
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeployConfig {
    /// Sync toggle; unset lets each entry point pick its default
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Report failed targets without failing the run
    #[serde(default)]
    pub allow_partial: bool,

    #[serde(default)]
    pub targets: Vec<DeploymentTarget>,
}

impl DeployConfig {
    fn validate(&self, local_dir: &Path) -> Result<()> {
        let mut names = HashSet::new();
        for target in &self.targets {
            if target.name.trim().is_empty() {
                return Err(AppError::validation("Deployment target with empty name"));
            }
            if !names.insert(target.name.as_str()) {
                return Err(AppError::validation(format!(
                    "Duplicate deployment target '{}'",
                    target.name
                )));
            }
            if target.root_path == local_dir {
                return Err(AppError::validation(format!(
                    "Deployment target '{}' points at the local store",
                    target.name
                )));
            }
        }
        Ok(())
    }
}

mod defaults {
    use std::path::PathBuf;

    // Catalog defaults
    pub fn source_name() -> String {
        "catalog".into()
    }
    pub fn search_url() -> String {
        "https://catalog.example.edu/course-search".into()
    }
    pub fn term_param() -> String {
        "term".into()
    }
    pub fn subject_param() -> String {
        "subject".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; catalog-sync/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        250
    }
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn backoff_base() -> u64 {
        500
    }
    pub fn backoff_max() -> u64 {
        8_000
    }
    pub fn max_pages() -> usize {
        50
    }

    // Matrix defaults
    pub fn terms() -> Vec<String> {
        vec!["Fall 2025".into(), "Winter 2026".into()]
    }
    pub fn subjects() -> Vec<String> {
        ["CSI", "SEG", "CEG", "ELG", "MAT", "PHY", "PHI"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    // Storage defaults
    pub fn local_dir() -> PathBuf {
        PathBuf::from("data")
    }
    pub fn max_drop_percent() -> u8 {
        20
    }
    pub fn min_baseline() -> usize {
        10
    }
    pub fn carry_forward() -> bool {
        true
    }
    pub fn lock_stale_secs() -> u64 {
        6 * 60 * 60
    }
}
