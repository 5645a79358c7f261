//! Core types: build records, the poll watermark and metric naming

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Build status as reported by the CI server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    #[default]
    Success,
    Failure,
    Error,
    Unknown,
}

impl BuildStatus {
    /// Value used in a build locator query
    pub fn locator_value(&self) -> &'static str {
        match self {
            BuildStatus::Success => "SUCCESS",
            BuildStatus::Failure => "FAILURE",
            BuildStatus::Error => "ERROR",
            BuildStatus::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.locator_value())
    }
}

/// A build currently waiting in the CI server queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedBuild {
    pub id: i64,
    pub config_id: String,
}

impl std::fmt::Display for QueuedBuild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Build{{id={}, buildTypeId={}}}", self.id, self.config_id)
    }
}

/// A finished build fetched from the CI server
///
/// Records are fetched fresh on every poll and dropped at the end of the
/// iteration; only their finish time may outlive it, via the watermark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub id: i64,
    /// Build configuration identifier (TeamCity `buildTypeId`)
    pub config_id: String,
    pub status: BuildStatus,
    pub queued_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BuildRecord {
    /// Seconds spent running, truncated
    pub fn build_time_secs(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }

    /// Seconds spent waiting in the queue, truncated
    pub fn queue_time_secs(&self) -> i64 {
        (self.started_at - self.queued_at).num_seconds()
    }
}

impl std::fmt::Display for BuildRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Build{{id={}, buildTypeId={}, status={}}}",
            self.id, self.config_id, self.status
        )
    }
}

/// Latest build finish time already processed
///
/// Never moves backwards. It is the lower bound of the next finished-builds
/// query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Watermark(DateTime<Utc>);

impl Watermark {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Watermark starting at the current time
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.0
    }

    /// Move the watermark to `finished_at` if it is strictly later.
    ///
    /// Returns true when the watermark moved.
    pub fn advance(&mut self, finished_at: DateTime<Utc>) -> bool {
        if finished_at > self.0 {
            self.0 = finished_at;
            true
        } else {
            false
        }
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// Derives metric paths from the configured prefix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricNames {
    prefix: Option<String>,
}

impl MetricNames {
    /// An empty prefix is treated as no prefix.
    pub fn new(prefix: Option<String>) -> Self {
        Self {
            prefix: prefix.filter(|p| !p.is_empty()),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// `<prefix>.queuesize`
    pub fn queue_size(&self) -> String {
        self.qualify("queuesize")
    }

    /// `<prefix>.build.<config>.buildtime`
    pub fn build_time(&self, config_id: &str) -> String {
        self.qualify(&format!("build.{}.buildtime", config_id))
    }

    /// `<prefix>.build.<config>.queuetime`
    pub fn queue_time(&self, config_id: &str) -> String {
        self.qualify(&format!("build.{}.queuetime", config_id))
    }

    fn qualify(&self, suffix: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}.{}", prefix, suffix),
            None => suffix.to_string(),
        }
    }
}
