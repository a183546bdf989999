// src/services/parser.rs

//! Catalog result page parser.
//!
//! Turns the fragments of a [`RawPage`] into [`CourseRecord`]s using the
//! configured CSS selectors.

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{
    CatalogSelectors, CleaningConfig, CourseRecord, EnrollmentStatus, PageFragment, RawPage,
    ScheduleSlot, SectionKind, WorkUnit,
};
use crate::utils::{normalize_code, source_hash};

/// Compile a CSS selector.
pub fn compile(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Compile an optional selector; an empty string disables it.
pub fn compile_optional(s: &str) -> Result<Option<Selector>> {
    if s.trim().is_empty() {
        Ok(None)
    } else {
        compile(s).map(Some)
    }
}

fn compile_field(s: Option<&String>) -> Result<Option<Selector>> {
    match s {
        Some(s) => compile_optional(s),
        None => Ok(None),
    }
}

/// Record parser with precompiled selectors.
#[derive(Debug, Clone)]
pub struct RecordParser {
    container: Selector,
    empty: Option<Selector>,
    row: Selector,
    code: Selector,
    title: Selector,
    section: Selector,
    slot: Selector,
    professor: Option<Selector>,
    capacity: Option<Selector>,
    location: Option<Selector>,
    status: Option<Selector>,
    cleaning: CleaningConfig,
}

impl RecordParser {
    pub fn new(selectors: &CatalogSelectors, cleaning: &CleaningConfig) -> Result<Self> {
        Ok(Self {
            container: compile(&selectors.container_selector)?,
            empty: compile_optional(&selectors.empty_selector)?,
            row: compile(&selectors.row_selector)?,
            code: compile(&selectors.code_selector)?,
            title: compile(&selectors.title_selector)?,
            section: compile(&selectors.section_selector)?,
            slot: compile(&selectors.slot_selector)?,
            professor: compile_field(selectors.professor_selector.as_ref())?,
            capacity: compile_field(selectors.capacity_selector.as_ref())?,
            location: compile_field(selectors.location_selector.as_ref())?,
            status: compile_field(selectors.status_selector.as_ref())?,
            cleaning: cleaning.clone(),
        })
    }

    /// Parse every fragment of a raw page.
    ///
    /// Fails with `MalformedPage` when any fragment is neither a results page
    /// nor a "no results" page.
    pub fn parse(&self, raw: &RawPage, unit: &WorkUnit) -> Result<Vec<CourseRecord>> {
        let mut records = Vec::new();
        for fragment in &raw.fragments {
            records.extend(self.parse_fragment(fragment, unit)?);
        }
        Ok(records)
    }

    fn parse_fragment(&self, fragment: &PageFragment, unit: &WorkUnit) -> Result<Vec<CourseRecord>> {
        let document = Html::parse_document(&fragment.body);

        let Some(container) = document.select(&self.container).next() else {
            let is_empty_page = self
                .empty
                .as_ref()
                .is_some_and(|sel| document.select(sel).next().is_some());
            if is_empty_page {
                log::debug!("{}: no offerings at {}", unit, fragment.url);
                return Ok(Vec::new());
            }
            return Err(AppError::malformed(
                unit.to_string(),
                format!("no results container at {}", fragment.url),
            ));
        };

        let records = container
            .select(&self.row)
            .filter_map(|row| self.parse_row(&row, unit, fragment))
            .collect();
        Ok(records)
    }

    fn parse_row(
        &self,
        row: &ElementRef,
        unit: &WorkUnit,
        fragment: &PageFragment,
    ) -> Option<CourseRecord> {
        let course_code = normalize_code(&cell_text(row, &self.code)?);
        let section_id = CleaningConfig::normalize_whitespace(&cell_text(row, &self.section)?);
        if course_code.is_empty() || section_id.is_empty() {
            log::debug!("{}: skipping row without course code or section", unit);
            return None;
        }

        let title = cell_text(row, &self.title)
            .map(|t| self.cleaning.clean_title(&t))
            .unwrap_or_default();

        let schedule_slots = row
            .select(&self.slot)
            .flat_map(|slot| ScheduleSlot::parse(&slot.text().collect::<String>()))
            .collect();

        let professor = self
            .optional_text(row, self.professor.as_ref())
            .and_then(|t| self.cleaning.clean_professor(&t));
        let capacity = self
            .optional_text(row, self.capacity.as_ref())
            .and_then(|t| parse_capacity(&t));
        let location = self
            .optional_text(row, self.location.as_ref())
            .map(|t| CleaningConfig::normalize_whitespace(&t))
            .filter(|t| !t.is_empty());
        let status = self
            .optional_text(row, self.status.as_ref())
            .and_then(|t| EnrollmentStatus::from_text(&t));

        Some(CourseRecord {
            section_kind: SectionKind::from_section_id(&section_id),
            course_code,
            title,
            section_id,
            term: unit.term.clone(),
            subject: unit.subject.clone(),
            schedule_slots,
            professor,
            capacity,
            location,
            status,
            raw_source_hash: source_hash(&row.html()),
            fetched_at: fragment.fetched_at,
        })
    }

    fn optional_text(&self, row: &ElementRef, selector: Option<&Selector>) -> Option<String> {
        cell_text(row, selector?)
    }
}

fn cell_text(row: &ElementRef, selector: &Selector) -> Option<String> {
    row.select(selector)
        .next()
        .map(|el| el.text().collect::<String>())
}

/// Capacity cells read "40", "12 / 40" or "Cap: 40"; the last number wins.
fn parse_capacity(text: &str) -> Option<u32> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .last()
        .and_then(|s| s.parse().ok())
}
