//! # cistat-teamcity
//!
//! CI server collaborator for cistat.
//!
//! This crate provides:
//! - The `CiServer` query abstraction
//! - A TeamCity REST client
//! - A scripted mock server for tests

mod client;
mod server;
pub mod types;

pub use client::{finished_builds_locator, TeamCityClient};
pub use server::{CiServer, FinishedQuery, MockCiServer};
