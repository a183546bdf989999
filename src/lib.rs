// src/lib.rs

//! catalog-sync library
//!
//! Scrapes a course catalog across a term × subject matrix, folds the
//! records into one canonical file per term and mirrors those files into
//! deployment targets.

pub mod error;
pub mod facade;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
