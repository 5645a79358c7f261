//! CI server abstraction

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cistat_core::{BuildRecord, BuildStatus, CistatError, QueuedBuild, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Trait for querying a CI server (allows mocking in tests)
#[async_trait]
pub trait CiServer: Send + Sync {
    /// Builds currently waiting in the queue
    async fn queued_builds(&self) -> Result<Vec<QueuedBuild>>;

    /// Builds with `status` finished no earlier than `since`, at most `limit`,
    /// in server order
    async fn finished_builds(
        &self,
        status: BuildStatus,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<BuildRecord>>;
}

/// A recorded `finished_builds` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedQuery {
    pub status: BuildStatus,
    pub since: DateTime<Utc>,
    pub limit: usize,
}

enum Scripted<T> {
    Ok(T),
    Err(String),
}

impl<T> Scripted<T> {
    fn into_result(self) -> Result<T> {
        match self {
            Scripted::Ok(v) => Ok(v),
            Scripted::Err(msg) => Err(CistatError::CiTransport(msg)),
        }
    }
}

#[derive(Default)]
struct MockState {
    queue: VecDeque<Scripted<Vec<QueuedBuild>>>,
    builds: VecDeque<Scripted<Vec<BuildRecord>>>,
    queries: Vec<FinishedQuery>,
}

/// Mock CI server for testing
///
/// Responses are consumed in the order they were scripted, one per call.
/// Once a script runs out the mock answers with an empty list.
#[derive(Clone, Default)]
pub struct MockCiServer {
    state: Arc<Mutex<MockState>>,
}

impl MockCiServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_queue(self, queued: Vec<QueuedBuild>) -> Self {
        self.lock().queue.push_back(Scripted::Ok(queued));
        self
    }

    pub fn with_queue_error(self, message: &str) -> Self {
        self.lock().queue.push_back(Scripted::Err(message.to_string()));
        self
    }

    pub fn with_builds(self, builds: Vec<BuildRecord>) -> Self {
        self.lock().builds.push_back(Scripted::Ok(builds));
        self
    }

    pub fn with_builds_error(self, message: &str) -> Self {
        self.lock().builds.push_back(Scripted::Err(message.to_string()));
        self
    }

    /// Every `finished_builds` call made so far
    pub fn finished_queries(&self) -> Vec<FinishedQuery> {
        self.lock().queries.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CiServer for MockCiServer {
    async fn queued_builds(&self) -> Result<Vec<QueuedBuild>> {
        match self.lock().queue.pop_front() {
            Some(scripted) => scripted.into_result(),
            None => Ok(Vec::new()),
        }
    }

    async fn finished_builds(
        &self,
        status: BuildStatus,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<BuildRecord>> {
        let mut state = self.lock();
        state.queries.push(FinishedQuery {
            status,
            since,
            limit,
        });
        match state.builds.pop_front() {
            Some(scripted) => scripted.into_result(),
            None => Ok(Vec::new()),
        }
    }
}
