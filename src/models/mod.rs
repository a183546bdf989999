// src/models/mod.rs

//! Domain models for the catalog pipeline.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod course;
mod report;
mod selectors;
mod work;

// Re-export all public types
pub use config::{
    CatalogConfig, CleaningConfig, Config, DeployConfig, DeploymentTarget, MergeConfig,
    ScrapeConfig, StorageConfig,
};
pub use course::{
    CourseRecord, EnrollmentStatus, RecordKey, ScheduleSlot, SectionKind, TermDataset,
};
pub use report::{HeldBackTerm, RunReport, SyncReport, TargetFailure, TermChange, UnitFailure};
pub use selectors::CatalogSelectors;
pub use work::{PageFragment, RawPage, SubjectCode, TermId, UnitState, WorkUnit};
