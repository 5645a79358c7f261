//! The poll loop
//!
//! Each iteration:
//! 1. emits the current queue size
//! 2. fetches successful builds finished since the watermark
//! 3. advances the watermark over the whole, unfiltered result
//! 4. drops excluded build configurations
//! 5. emits build and queue times for the rest
//!
//! CI server failures end the iteration early. The driver logs them and
//! tries again on the next tick; it never stops on its own.

use cistat_core::{
    BuildRecord, BuildStatus, ExclusionFilter, MetricNames, Result, Settings, Watermark,
};
use cistat_graphite::{send_stat, MetricSink};
use cistat_teamcity::CiServer;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::state::{Iteration, IterationReport, PollState};

/// Drives CI server polling and metric emission
pub struct Poller<C, S> {
    ci: C,
    sink: S,
    names: MetricNames,
    exclude: ExclusionFilter,
    max_builds: usize,
    poll_interval: Duration,
}

#[derive(Default)]
struct Emitted {
    sent: usize,
    dropped: usize,
}

impl<C: CiServer, S: MetricSink> Poller<C, S> {
    pub fn new(settings: &Settings, ci: C, sink: S) -> Self {
        Self {
            ci,
            sink,
            names: settings.metric_names(),
            exclude: settings.exclude.clone(),
            max_builds: settings.max_builds,
            poll_interval: settings.poll_interval,
        }
    }

    /// Override the sleep between iterations
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Run a single iteration, returning the next state
    pub async fn poll_once(&self, mut state: PollState) -> Iteration {
        state.iterations += 1;
        let outcome = self.poll_body(&mut state.watermark).await;
        if outcome.is_err() {
            state.failures += 1;
        }
        Iteration { state, outcome }
    }

    /// Run `count` iterations, sleeping between them
    pub async fn run_iterations(&self, mut state: PollState, count: usize) -> PollState {
        for i in 0..count {
            if i > 0 {
                tokio::time::sleep(self.poll_interval).await;
            }
            state = self.tick(state).await;
        }
        state
    }

    /// Poll forever
    pub async fn run(&self, mut state: PollState) {
        info!(
            "Polling every {:?} starting from {}",
            self.poll_interval, state.watermark
        );
        loop {
            state = self.tick(state).await;
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn tick(&self, state: PollState) -> PollState {
        let Iteration { state, outcome } = self.poll_once(state).await;
        match outcome {
            Ok(report) => debug!(
                queue_size = report.queue_size,
                builds = report.builds_seen,
                excluded = report.builds_excluded,
                sent = report.metrics_sent,
                dropped = report.metrics_dropped,
                watermark = %report.watermark,
                "Iteration {} complete",
                state.iterations
            ),
            Err(e) => error!(
                kind = ?e.kind(),
                "Error reading from Teamcity: {} ({} of {} iterations failed)",
                e,
                state.failures,
                state.iterations
            ),
        }
        state
    }

    async fn poll_body(&self, watermark: &mut Watermark) -> Result<IterationReport> {
        let mut emitted = Emitted::default();

        let queued = self.ci.queued_builds().await?;
        debug!("Queue length: {}", queued.len());
        self.emit(&self.names.queue_size(), queued.len() as i64, &mut emitted)
            .await;
        for build in &queued {
            debug!("{}", build);
        }

        let builds = self
            .ci
            .finished_builds(BuildStatus::Success, watermark.at(), self.max_builds)
            .await?;
        debug!("Successful Build count: {}", builds.len());

        for build in &builds {
            watermark.advance(build.finished_at);
        }

        let mut excluded = 0;
        for build in &builds {
            if let Some(index) = self.exclude.first_match(&build.config_id) {
                debug!("{} excluded by pattern #{}", build, index);
                excluded += 1;
                continue;
            }
            self.emit_build(build, &mut emitted).await;
        }

        Ok(IterationReport {
            queue_size: queued.len(),
            builds_seen: builds.len(),
            builds_excluded: excluded,
            metrics_sent: emitted.sent,
            metrics_dropped: emitted.dropped,
            watermark: *watermark,
        })
    }

    async fn emit_build(&self, build: &BuildRecord, emitted: &mut Emitted) {
        let build_time = build.build_time_secs();
        let queue_time = build.queue_time_secs();
        debug!("{} {} {}", build, build_time, queue_time);

        self.emit(&self.names.build_time(&build.config_id), build_time, emitted)
            .await;
        self.emit(&self.names.queue_time(&build.config_id), queue_time, emitted)
            .await;
    }

    async fn emit(&self, path: &str, value: i64, emitted: &mut Emitted) {
        if send_stat(&self.sink, path, value).await {
            emitted.sent += 1;
        } else {
            emitted.dropped += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use cistat_core::QueuedBuild;
    use cistat_graphite::RecordingSink;
    use cistat_teamcity::MockCiServer;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn settings(extra: &str) -> Settings {
        Settings::from_yaml_str(&format!(
            "graphite: g\nteamcity: http://tc\nprefix: ci\n{}",
            extra
        ))
        .unwrap()
    }

    fn build(id: i64, config: &str, queued: i64, started: i64, finished: i64) -> BuildRecord {
        BuildRecord {
            id,
            config_id: config.to_string(),
            status: BuildStatus::Success,
            queued_at: ts(queued),
            started_at: ts(started),
            finished_at: ts(finished),
        }
    }

    #[tokio::test]
    async fn test_queue_size_metric() {
        let queued = (0..3)
            .map(|id| QueuedBuild {
                id,
                config_id: "a".to_string(),
            })
            .collect();
        let ci = MockCiServer::new().with_queue(queued);
        let sink = RecordingSink::new();
        let poller = Poller::new(&settings(""), ci, sink.clone());

        let iteration = poller.poll_once(PollState::starting_at(ts(0))).await;
        let report = iteration.outcome.unwrap();

        assert_eq!(report.queue_size, 3);
        assert_eq!(sink.value_of("ci.queuesize"), Some(3));
    }

    #[tokio::test]
    async fn test_build_metrics_emitted_in_order() {
        let ci = MockCiServer::new()
            .with_queue(vec![])
            .with_builds(vec![build(1, "build1", 1000, 1010, 1050)]);
        let sink = RecordingSink::new();
        let poller = Poller::new(&settings(""), ci, sink.clone());

        poller.poll_once(PollState::starting_at(ts(0))).await;

        assert_eq!(
            sink.paths(),
            vec![
                "ci.queuesize".to_string(),
                "ci.build.build1.buildtime".to_string(),
                "ci.build.build1.queuetime".to_string(),
            ]
        );
        assert_eq!(sink.value_of("ci.build.build1.buildtime"), Some(40));
        assert_eq!(sink.value_of("ci.build.build1.queuetime"), Some(10));
    }

    #[tokio::test]
    async fn test_query_uses_watermark_and_limit() {
        let ci = MockCiServer::new();
        let poller = Poller::new(&settings("maxbuilds: 25\n"), ci.clone(), RecordingSink::new());

        poller.poll_once(PollState::starting_at(ts(500))).await;

        let queries = ci.finished_queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].status, BuildStatus::Success);
        assert_eq!(queries[0].since, ts(500));
        assert_eq!(queries[0].limit, 25);
    }

    #[tokio::test]
    async fn test_excluded_builds_still_advance_watermark() {
        let ci = MockCiServer::new()
            .with_queue(vec![])
            .with_builds(vec![
                build(1, "proj-nightly", 100, 110, 900),
                build(2, "proj2", 100, 120, 300),
            ]);
        let sink = RecordingSink::new();
        let poller = Poller::new(&settings("exclude:\n  - proj-.*\n"), ci, sink.clone());

        let iteration = poller.poll_once(PollState::starting_at(ts(0))).await;
        let report = iteration.outcome.unwrap();

        assert_eq!(report.builds_seen, 2);
        assert_eq!(report.builds_excluded, 1);
        assert_eq!(iteration.state.watermark.at(), ts(900));
        assert!(sink.value_of("ci.build.proj-nightly.buildtime").is_none());
        assert_eq!(sink.value_of("ci.build.proj2.buildtime"), Some(180));
    }

    #[tokio::test]
    async fn test_ci_failure_is_reported_not_raised() {
        let ci = MockCiServer::new().with_queue_error("connection reset");
        let sink = RecordingSink::new();
        let poller = Poller::new(&settings(""), ci.clone(), sink.clone());

        let iteration = poller.poll_once(PollState::starting_at(ts(0))).await;

        assert!(iteration.outcome.is_err());
        assert_eq!(iteration.state.iterations, 1);
        assert_eq!(iteration.state.failures, 1);
        assert!(sink.metrics().is_empty());
        assert!(ci.finished_queries().is_empty());
    }

    #[tokio::test]
    async fn test_builds_failure_keeps_queue_metric() {
        let ci = MockCiServer::new()
            .with_queue(vec![])
            .with_builds_error("HTTP 500");
        let sink = RecordingSink::new();
        let poller = Poller::new(&settings(""), ci, sink.clone());

        let iteration = poller.poll_once(PollState::starting_at(ts(0))).await;

        assert!(iteration.outcome.is_err());
        assert_eq!(sink.value_of("ci.queuesize"), Some(0));
        assert_eq!(iteration.state.watermark.at(), ts(0));
    }

    #[tokio::test]
    async fn test_dropped_metric_does_not_stop_others() {
        let ci = MockCiServer::new()
            .with_queue(vec![])
            .with_builds(vec![build(1, "build1", 1000, 1010, 1050)]);
        let sink = RecordingSink::new().with_failing_path("ci.build.build1.buildtime");
        let poller = Poller::new(&settings(""), ci, sink.clone());

        let report = poller
            .poll_once(PollState::starting_at(ts(0)))
            .await
            .outcome
            .unwrap();

        assert_eq!(report.metrics_sent, 2);
        assert_eq!(report.metrics_dropped, 1);
        assert_eq!(sink.value_of("ci.build.build1.queuetime"), Some(10));
    }
}
