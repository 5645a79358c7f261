//! # cistat-core
//!
//! Core types for cistat, a poller that turns TeamCity build queue and
//! build history data into Graphite metrics.
//!
//! This crate provides:
//! - Settings and the config file loader
//! - Build records and the poll watermark
//! - Metric path derivation
//! - The build configuration exclusion filter

pub mod config;
mod error;
mod filter;
mod types;

pub use config::Settings;
pub use error::{CistatError, ErrorKind, Result};
pub use filter::ExclusionFilter;
pub use types::*;
