//! Pipeline stages and entry points.
//!
//! - `orchestrator`: fetch and parse the term × subject matrix
//! - `canonical`: collapse records into per-term datasets
//! - `circuit_breaker` / `diff`: guard and describe term file changes
//! - `run`: `run_scrape_all`, `run_single`, `run_deploy`

pub mod cancel;
pub mod canonical;
pub mod circuit_breaker;
pub mod diff;
pub mod orchestrator;
pub mod run;

pub use cancel::{CancelHandle, CancelSignal, cancel_pair};
pub use canonical::{Canonicalizer, TieBreak};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerResult};
pub use diff::{DiffResult, calculate_diff};
pub use orchestrator::{Orchestrator, OrchestratorOptions, ScrapeOutcome};
pub use run::{RunOptions, run_deploy, run_scrape_all, run_single};
