//! tubegrab library crate.
//!
//! Pollable audio extraction: single jobs, batches and cross-platform
//! descriptor resolution over a client-identity fallback strategy.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod extractor;
pub mod jobs;
pub mod logging;
pub mod preflight;
pub mod utils;

pub use error::{Error, Result};
