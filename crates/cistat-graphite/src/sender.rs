//! TCP sender for the Graphite plaintext protocol
//!
//! One short-lived connection per metric: connect, write one line, flush,
//! close. No pooling, batching or retries; delivery is not confirmed.

use async_trait::async_trait;
use cistat_core::{CistatError, Result, Settings};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, instrument};

use crate::sink::{Metric, MetricSink};

/// Sends metrics to a Graphite collector
#[derive(Debug, Clone)]
pub struct GraphiteSender {
    addr: String,
    timeout: Duration,
}

impl GraphiteSender {
    /// Create a sender for `addr` (`host:port`)
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.graphite_addr(), settings.timeout)
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn write_line(&self, line: &str) -> Result<()> {
        let mut stream = TcpStream::connect(&self.addr).await.map_err(|e| {
            CistatError::Collector(format!("Failed to connect to {}: {}", self.addr, e))
        })?;
        let write = async {
            stream.write_all(line.as_bytes()).await?;
            stream.flush().await?;
            stream.shutdown().await
        };
        write.await.map_err(|e| {
            CistatError::Collector(format!("Error writing to graphite at {}: {}", self.addr, e))
        })
    }
}

#[async_trait]
impl MetricSink for GraphiteSender {
    #[instrument(skip(self, metric), fields(addr = %self.addr, path = %metric.path))]
    async fn send(&self, metric: &Metric) -> Result<()> {
        let line = metric.to_line();
        debug!("Sending {}", line.trim_end());

        tokio::time::timeout(self.timeout, self.write_line(&line))
            .await
            .map_err(|_| {
                CistatError::Collector(format!(
                    "Timed out after {:?} writing to {}",
                    self.timeout, self.addr
                ))
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::send_stat;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_sends_one_line_per_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let mut lines = Vec::new();
            for _ in 0..2 {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = String::new();
                socket.read_to_string(&mut buf).await.unwrap();
                lines.push(buf);
            }
            lines
        });

        let sender = GraphiteSender::new(addr, Duration::from_secs(2));
        assert!(send_stat(&sender, "ci.queuesize", 3).await);
        assert!(send_stat(&sender, "ci.build.build1.buildtime", 40).await);

        let lines = server.await.unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ci.queuesize 3 "));
        assert!(lines[0].ends_with('\n'));
        assert!(lines[1].starts_with("ci.build.build1.buildtime 40 "));
    }

    #[tokio::test]
    async fn test_connection_refused_is_collector_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let sender = GraphiteSender::new(addr, Duration::from_secs(2));
        let err = sender.send(&Metric::now("ci.queuesize", 1)).await.unwrap_err();
        assert_eq!(err.kind(), cistat_core::ErrorKind::Collector);

        assert!(!send_stat(&sender, "ci.queuesize", 1).await);
    }
}
