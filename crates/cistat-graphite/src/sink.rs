//! Metric sink abstraction

use async_trait::async_trait;
use chrono::Utc;
use cistat_core::Result;
use std::sync::{Arc, Mutex};
use tracing::error;

/// A single metric sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    pub path: String,
    pub value: i64,
    /// Unix seconds
    pub timestamp: i64,
}

impl Metric {
    /// Sample stamped with the current time
    pub fn now(path: impl Into<String>, value: i64) -> Self {
        Self {
            path: path.into(),
            value,
            timestamp: epoch_secs(),
        }
    }

    /// Plaintext protocol line: `<path> <value> <timestamp>\n`
    pub fn to_line(&self) -> String {
        format_metric(&self.path, self.value, self.timestamp)
    }
}

/// Format one plaintext protocol line
pub fn format_metric(path: &str, value: i64, timestamp: i64) -> String {
    format!("{} {} {}\n", path, value, timestamp)
}

/// Current Unix time in seconds, rounded to the nearest second
pub fn epoch_secs() -> i64 {
    let millis = Utc::now().timestamp_millis();
    (millis + 500).div_euclid(1000)
}

/// Trait for delivering metrics (allows recording in tests)
#[async_trait]
pub trait MetricSink: Send + Sync {
    /// Deliver one metric
    async fn send(&self, metric: &Metric) -> Result<()>;
}

/// Send a metric, logging and swallowing any failure
///
/// A collector outage never reaches the caller. Returns true when the
/// metric was handed to the sink.
pub async fn send_stat<S: MetricSink + ?Sized>(sink: &S, path: &str, value: i64) -> bool {
    let metric = Metric::now(path, value);
    match sink.send(&metric).await {
        Ok(()) => true,
        Err(e) => {
            error!(path = %metric.path, "Error writing to graphite: {}", e);
            false
        }
    }
}

/// In-memory sink that records every metric it receives
#[derive(Clone, Default)]
pub struct RecordingSink {
    sent: Arc<Mutex<Vec<Metric>>>,
    fail_paths: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject metrics with this exact path
    pub fn with_failing_path(self, path: &str) -> Self {
        self.fail_paths
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(path.to_string());
        self
    }

    /// Metrics received so far
    pub fn metrics(&self) -> Vec<Metric> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Paths received so far, in order
    pub fn paths(&self) -> Vec<String> {
        self.metrics().into_iter().map(|m| m.path).collect()
    }

    /// Latest value sent under `path`
    pub fn value_of(&self, path: &str) -> Option<i64> {
        self.metrics()
            .into_iter()
            .rev()
            .find(|m| m.path == path)
            .map(|m| m.value)
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[async_trait]
impl MetricSink for RecordingSink {
    async fn send(&self, metric: &Metric) -> Result<()> {
        let rejected = self
            .fail_paths
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|p| p == &metric.path);
        if rejected {
            return Err(cistat_core::CistatError::Collector(format!(
                "rejected {}",
                metric.path
            )));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(metric.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_metric() {
        assert_eq!(
            format_metric("ci.queuesize", 3, 1_700_000_000),
            "ci.queuesize 3 1700000000\n"
        );
    }

    #[test]
    fn test_metric_now_uses_current_time() {
        let before = Utc::now().timestamp();
        let metric = Metric::now("ci.queuesize", 7);
        let after = Utc::now().timestamp() + 1;
        assert!(metric.timestamp >= before && metric.timestamp <= after);
        assert_eq!(
            metric.to_line(),
            format!("ci.queuesize 7 {}\n", metric.timestamp)
        );
    }

    #[tokio::test]
    async fn test_send_stat_records() {
        let sink = RecordingSink::new();
        assert!(send_stat(&sink, "ci.queuesize", 4).await);
        assert_eq!(sink.value_of("ci.queuesize"), Some(4));
    }

    #[tokio::test]
    async fn test_send_stat_swallows_failure() {
        let sink = RecordingSink::new().with_failing_path("ci.queuesize");
        assert!(!send_stat(&sink, "ci.queuesize", 4).await);
        assert!(sink.metrics().is_empty());

        assert!(send_stat(&sink, "ci.build.a.buildtime", 40).await);
        assert_eq!(sink.paths(), vec!["ci.build.a.buildtime".to_string()]);
    }
}
