// src/models/selectors.rs

//! CSS selectors describing the catalog's search results markup.

use serde::{Deserialize, Serialize};

/// CSS selectors for scraping catalog result pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSelectors {
    /// Selector for the results container; its presence marks a recognized page
    #[serde(default = "defaults::container")]
    pub container_selector: String,

    /// Selector for the "no offerings" marker shown on empty result pages
    #[serde(default = "defaults::empty")]
    pub empty_selector: String,

    /// Selector for each section row inside the container
    #[serde(default = "defaults::row")]
    pub row_selector: String,

    #[serde(default = "defaults::code")]
    pub code_selector: String,

    #[serde(default = "defaults::title")]
    pub title_selector: String,

    #[serde(default = "defaults::section")]
    pub section_selector: String,

    /// Selector for individual meeting slots within a row
    #[serde(default = "defaults::slot")]
    pub slot_selector: String,

    #[serde(default = "defaults::professor")]
    pub professor_selector: Option<String>,

    #[serde(default = "defaults::capacity")]
    pub capacity_selector: Option<String>,

    #[serde(default = "defaults::location")]
    pub location_selector: Option<String>,

    #[serde(default = "defaults::status")]
    pub status_selector: Option<String>,

    /// Selector for the link to the next results page
    #[serde(default = "defaults::next_page")]
    pub next_page_selector: Option<String>,

    /// HTML attribute holding the next page URL (usually "href")
    #[serde(default = "defaults::next_page_attr")]
    pub next_page_attr: String,
}

impl Default for CatalogSelectors {
    fn default() -> Self {
        Self {
            container_selector: defaults::container(),
            empty_selector: defaults::empty(),
            row_selector: defaults::row(),
            code_selector: defaults::code(),
            title_selector: defaults::title(),
            section_selector: defaults::section(),
            slot_selector: defaults::slot(),
            professor_selector: defaults::professor(),
            capacity_selector: defaults::capacity(),
            location_selector: defaults::location(),
            status_selector: defaults::status(),
            next_page_selector: defaults::next_page(),
            next_page_attr: defaults::next_page_attr(),
        }
    }
}

mod defaults {
    pub fn container() -> String {
        "table.course-results".into()
    }
    pub fn empty() -> String {
        ".no-results".into()
    }
    pub fn row() -> String {
        "tr.section-row".into()
    }
    pub fn code() -> String {
        "td.course-code".into()
    }
    pub fn title() -> String {
        "td.course-title".into()
    }
    pub fn section() -> String {
        "td.section".into()
    }
    pub fn slot() -> String {
        "td.schedule .slot".into()
    }
    pub fn professor() -> Option<String> {
        Some("td.instructor".into())
    }
    pub fn capacity() -> Option<String> {
        Some("td.capacity".into())
    }
    pub fn location() -> Option<String> {
        Some("td.location".into())
    }
    pub fn status() -> Option<String> {
        Some("td.status".into())
    }
    pub fn next_page() -> Option<String> {
        Some("a.next-page".into())
    }
    pub fn next_page_attr() -> String {
        "href".into()
    }
}
