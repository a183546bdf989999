// src/models/course.rs

//! Course records and per-term canonical datasets.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{SubjectCode, TermId};

/// Identity of a course section within the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordKey {
    pub term: TermId,
    pub subject: SubjectCode,
    pub course_code: String,
    pub section_id: String,
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.term, self.subject, self.course_code, self.section_id
        )
    }
}

/// A single course section scraped from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRecord {
    pub course_code: String,
    pub title: String,
    pub section_id: String,
    pub term: TermId,
    pub subject: SubjectCode,
    pub section_kind: SectionKind,
    pub schedule_slots: Vec<ScheduleSlot>,
    pub professor: Option<String>,
    pub capacity: Option<u32>,
    pub location: Option<String>,
    pub status: Option<EnrollmentStatus>,
    /// SHA-256 of the markup this record was parsed from
    pub raw_source_hash: String,
    /// When the page holding that markup was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CourseRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            term: self.term.clone(),
            subject: self.subject.clone(),
            course_code: self.course_code.clone(),
            section_id: self.section_id.clone(),
        }
    }
}

/// Section type, derived from the section identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SectionKind {
    Lec,
    Lab,
    Dgd,
    Tut,
    Sem,
    Wrk,
    Stu,
}

impl SectionKind {
    /// Infer the section type from identifiers such as `A01-LAB`.
    ///
    /// Identifiers without a type marker (`A00`, `B02`) are lectures.
    pub fn from_section_id(section_id: &str) -> Self {
        let upper = section_id.to_uppercase();
        if upper.contains("LAB") {
            SectionKind::Lab
        } else if upper.contains("DGD") {
            SectionKind::Dgd
        } else if upper.contains("TUT") {
            SectionKind::Tut
        } else if upper.contains("SEM") {
            SectionKind::Sem
        } else if upper.contains("WRK") || upper.contains("WORKSHOP") {
            SectionKind::Wrk
        } else if upper.contains("STU") || upper.contains("STUDIO") {
            SectionKind::Stu
        } else {
            SectionKind::Lec
        }
    }
}

/// Enrollment availability as shown by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Open,
    Closed,
    Waitlist,
}

impl EnrollmentStatus {
    /// Read a status cell. Returns `None` for text that names no status.
    pub fn from_text(text: &str) -> Option<Self> {
        let lower = text.trim().to_lowercase();
        if lower.contains("waitlist") {
            Some(EnrollmentStatus::Waitlist)
        } else if lower.contains("closed") || lower.contains("full") {
            Some(EnrollmentStatus::Closed)
        } else if ["open", "available", "spaces", "spots"]
            .iter()
            .any(|tok| lower.contains(tok))
        {
            Some(EnrollmentStatus::Open)
        } else {
            None
        }
    }
}

/// One weekly meeting of a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSlot {
    pub day: Option<Weekday>,
    /// Start time as `HH:MM`
    pub start: Option<String>,
    /// End time as `HH:MM`
    pub end: Option<String>,
    /// Slot text as scraped
    pub raw: String,
}

static TIME_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})[:hH](\d{2})\s*-\s*(\d{1,2})[:hH](\d{2})").expect("valid time pattern")
});

impl ScheduleSlot {
    /// Parse slot text such as `Mo 08:30 - 10:00`, `TR 14h30 - 16h00` or
    /// `Monday, Wednesday 10:00 - 11:30`.
    ///
    /// Produces one slot per day. Text that yields neither days nor times is
    /// kept as a single raw slot.
    pub fn parse(text: &str) -> Vec<ScheduleSlot> {
        let raw = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if raw.is_empty() {
            return Vec::new();
        }

        let (day_text, times) = match TIME_RANGE.captures(&raw) {
            Some(caps) => {
                let start = format_time(&caps[1], &caps[2]);
                let end = format_time(&caps[3], &caps[4]);
                let prefix_end = caps.get(0).map_or(0, |m| m.start());
                (&raw[..prefix_end], start.zip(end))
            }
            None => (raw.as_str(), None),
        };

        let days = parse_days(day_text);
        let (start, end) = match times {
            Some((s, e)) => (Some(s), Some(e)),
            None => (None, None),
        };

        if days.is_empty() {
            return vec![ScheduleSlot {
                day: None,
                start,
                end,
                raw,
            }];
        }

        days.into_iter()
            .map(|day| ScheduleSlot {
                day: Some(day),
                start: start.clone(),
                end: end.clone(),
                raw: raw.clone(),
            })
            .collect()
    }
}

fn format_time(hour: &str, minute: &str) -> Option<String> {
    let h: u32 = hour.parse().ok()?;
    let m: u32 = minute.parse().ok()?;
    NaiveTime::from_hms_opt(h, m, 0).map(|t| t.format("%H:%M").to_string())
}

fn full_day(token: &str) -> Option<Weekday> {
    match token.to_lowercase().as_str() {
        "monday" | "lundi" => Some(Weekday::Mon),
        "tuesday" | "mardi" => Some(Weekday::Tue),
        "wednesday" | "mercredi" => Some(Weekday::Wed),
        "thursday" | "jeudi" => Some(Weekday::Thu),
        "friday" | "vendredi" => Some(Weekday::Fri),
        "saturday" | "samedi" => Some(Weekday::Sat),
        "sunday" | "dimanche" => Some(Weekday::Sun),
        _ => None,
    }
}

fn two_letter_day(chunk: &str) -> Option<Weekday> {
    match chunk {
        "Mo" => Some(Weekday::Mon),
        "Tu" => Some(Weekday::Tue),
        "We" => Some(Weekday::Wed),
        "Th" => Some(Weekday::Thu),
        "Fr" => Some(Weekday::Fri),
        "Sa" => Some(Weekday::Sat),
        "Su" => Some(Weekday::Sun),
        _ => None,
    }
}

fn letter_day(c: char) -> Option<Weekday> {
    match c {
        'M' => Some(Weekday::Mon),
        'T' => Some(Weekday::Tue),
        'W' => Some(Weekday::Wed),
        'R' => Some(Weekday::Thu),
        'F' => Some(Weekday::Fri),
        'S' => Some(Weekday::Sat),
        'U' => Some(Weekday::Sun),
        _ => None,
    }
}

fn parse_days(text: &str) -> Vec<Weekday> {
    let mut days = Vec::new();

    for token in text
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        if let Some(day) = full_day(token) {
            days.push(day);
            continue;
        }

        // "MoWe" style runs of two-letter abbreviations
        if token.is_ascii() && token.len() % 2 == 0 {
            let chunks: Option<Vec<Weekday>> = (0..token.len())
                .step_by(2)
                .map(|i| two_letter_day(&token[i..i + 2]))
                .collect();
            if let Some(chunks) = chunks {
                days.extend(chunks);
                continue;
            }
        }

        // "MWF" style single letters
        let letters: Option<Vec<Weekday>> = token.chars().map(letter_day).collect();
        if let Some(letters) = letters {
            days.extend(letters);
        }
    }

    days
}

/// Canonical, deduplicated records of one term keyed by identity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TermDataset {
    pub term: TermId,
    pub records: BTreeMap<RecordKey, CourseRecord>,
}

impl TermDataset {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            records: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains_key(&self, key: &RecordKey) -> bool {
        self.records.contains_key(key)
    }

    /// Records in identity-key order.
    pub fn iter(&self) -> impl Iterator<Item = &CourseRecord> {
        self.records.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_kind_from_id() {
        assert_eq!(SectionKind::from_section_id("A00"), SectionKind::Lec);
        assert_eq!(SectionKind::from_section_id("a01-lab"), SectionKind::Lab);
        assert_eq!(SectionKind::from_section_id("B02-DGD"), SectionKind::Dgd);
        assert_eq!(SectionKind::from_section_id("C03-TUT"), SectionKind::Tut);
        assert_eq!(SectionKind::from_section_id("X-WORKSHOP"), SectionKind::Wrk);
    }

    #[test]
    fn test_enrollment_status_tokens() {
        assert_eq!(EnrollmentStatus::from_text("Open"), Some(EnrollmentStatus::Open));
        assert_eq!(
            EnrollmentStatus::from_text("3 spaces left"),
            Some(EnrollmentStatus::Open)
        );
        assert_eq!(EnrollmentStatus::from_text("FULL"), Some(EnrollmentStatus::Closed));
        assert_eq!(
            EnrollmentStatus::from_text("Waitlist (4)"),
            Some(EnrollmentStatus::Waitlist)
        );
        assert_eq!(EnrollmentStatus::from_text("-"), None);
    }

    #[test]
    fn test_slot_two_letter_day() {
        let slots = ScheduleSlot::parse("Mo 08:30 - 10:00");
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].day, Some(Weekday::Mon));
        assert_eq!(slots[0].start.as_deref(), Some("08:30"));
        assert_eq!(slots[0].end.as_deref(), Some("10:00"));
    }

    #[test]
    fn test_slot_french_times_and_letters() {
        let slots = ScheduleSlot::parse("TR 14h30 - 16h00");
        let days: Vec<_> = slots.iter().map(|s| s.day).collect();
        assert_eq!(days, vec![Some(Weekday::Tue), Some(Weekday::Thu)]);
        assert!(slots.iter().all(|s| s.start.as_deref() == Some("14:30")));
    }

    #[test]
    fn test_slot_full_names() {
        let slots = ScheduleSlot::parse("Monday, Wednesday 10:00 - 11:30");
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].day, Some(Weekday::Wed));
    }

    #[test]
    fn test_slot_run_of_abbreviations() {
        let slots = ScheduleSlot::parse("MoWeFr 9:00 - 9:50");
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].start.as_deref(), Some("09:00"));
    }

    #[test]
    fn test_slot_unparseable_keeps_raw() {
        let slots = ScheduleSlot::parse("  TBA ");
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].day, None);
        assert_eq!(slots[0].start, None);
        assert_eq!(slots[0].raw, "TBA");
    }

    #[test]
    fn test_slot_empty_text() {
        assert!(ScheduleSlot::parse("   ").is_empty());
    }

    #[test]
    fn test_record_key_display() {
        let key = RecordKey {
            term: "2024F".into(),
            subject: "CSI".into(),
            course_code: "CSI2110".into(),
            section_id: "A00".into(),
        };
        assert_eq!(key.to_string(), "2024F/CSI/CSI2110/A00");
    }
}
