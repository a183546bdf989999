// src/services/fetch.rs

//! Catalog fetch client.
//!
//! Issues the search request for one work unit and follows "next page"
//! links, returning every page as one [`RawPage`].

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Config, RawPage, WorkUnit};
use crate::services::Throttle;
use crate::services::parser::compile_optional;
use crate::utils::http::create_async_client;
use crate::utils::resolve_url;

/// Source of raw catalog pages.
///
/// Implementations do not retry; retry policy belongs to the orchestrator.
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    async fn fetch(&self, unit: &WorkUnit) -> Result<RawPage>;
}

/// reqwest-backed catalog client.
pub struct HttpCatalogClient {
    client: Client,
    search_url: Url,
    term_param: String,
    subject_param: String,
    next_page: Option<Selector>,
    next_page_attr: String,
    max_pages: usize,
    throttle: Arc<Throttle>,
}

impl HttpCatalogClient {
    /// Create a client with its own throttle.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_throttle(config, Arc::new(Throttle::from_config(&config.catalog)))
    }

    /// Create a client sharing an existing throttle.
    pub fn with_throttle(config: &Config, throttle: Arc<Throttle>) -> Result<Self> {
        let next_page = match config.parser.next_page_selector.as_deref() {
            Some(s) => compile_optional(s)?,
            None => None,
        };

        Ok(Self {
            client: create_async_client(&config.catalog)?,
            search_url: Url::parse(&config.catalog.search_url)?,
            term_param: config.catalog.term_param.clone(),
            subject_param: config.catalog.subject_param.clone(),
            next_page,
            next_page_attr: config.parser.next_page_attr.clone(),
            max_pages: config.catalog.max_pages.max(1),
            throttle,
        })
    }

    /// First results page URL for a unit.
    pub fn unit_url(&self, unit: &WorkUnit) -> Url {
        let mut url = self.search_url.clone();
        url.query_pairs_mut()
            .append_pair(&self.term_param, &unit.term)
            .append_pair(&self.subject_param, &unit.subject);
        url
    }

    /// Link to the following results page, if the page advertises one.
    pub fn next_page_url(&self, body: &str, current: &Url) -> Option<Url> {
        let selector = self.next_page.as_ref()?;
        let document = Html::parse_document(body);
        let href = document
            .select(selector)
            .find_map(|el| el.value().attr(&self.next_page_attr))?;
        resolve_url(current, href)
    }

    async fn fetch_text(&self, url: &Url) -> Result<String> {
        self.throttle.acquire().await;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AppError::from_request(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| AppError::from_request(url.as_str(), e))
    }
}

#[async_trait]
impl CatalogFetcher for HttpCatalogClient {
    async fn fetch(&self, unit: &WorkUnit) -> Result<RawPage> {
        let mut page = RawPage::new(unit.clone());
        let mut url = self.unit_url(unit);
        let mut seen = HashSet::from([url.to_string()]);

        loop {
            let body = self.fetch_text(&url).await?;
            let next = self.next_page_url(&body, &url);
            page.push(url.as_str(), body);

            let Some(next) = next else { break };
            if page.page_count() >= self.max_pages {
                log::warn!(
                    "{}: stopping after {} pages, more were advertised",
                    unit,
                    self.max_pages
                );
                break;
            }
            if !seen.insert(next.to_string()) {
                log::debug!("{}: next page {} already fetched", unit, next);
                break;
            }
            url = next;
        }

        log::debug!("{}: fetched {} page(s)", unit, page.page_count());
        Ok(page)
    }
}
