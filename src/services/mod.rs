//! Service layer for the catalog pipeline.
//!
//! This module contains the business logic for:
//! - Fetching result pages (`CatalogFetcher`, `HttpCatalogClient`)
//! - Parsing them into records (`RecordParser`)
//! - Spacing requests (`Throttle`)

mod fetch;
pub mod parser;
mod throttle;

pub use fetch::{CatalogFetcher, HttpCatalogClient};
pub use parser::RecordParser;
pub use throttle::Throttle;
