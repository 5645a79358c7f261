//! State threaded between poll iterations

use chrono::{DateTime, Utc};
use cistat_core::{Result, Watermark};

/// Everything carried from one iteration to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollState {
    /// Lower bound of the next finished-builds query
    pub watermark: Watermark,
    /// Iterations run so far
    pub iterations: u64,
    /// Iterations that ended with an error
    pub failures: u64,
}

impl PollState {
    /// State for a process starting now
    pub fn starting_now() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(at: DateTime<Utc>) -> Self {
        Self {
            watermark: Watermark::new(at),
            iterations: 0,
            failures: 0,
        }
    }
}

/// Summary of a completed iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationReport {
    pub queue_size: usize,
    /// Finished builds returned by the CI server, before filtering
    pub builds_seen: usize,
    pub builds_excluded: usize,
    pub metrics_sent: usize,
    pub metrics_dropped: usize,
    /// Watermark after this iteration
    pub watermark: Watermark,
}

/// Result of one iteration: the next state plus what happened
///
/// `state` is always returned, even when `outcome` is an error, so watermark
/// advances made before the failure are kept.
#[derive(Debug)]
pub struct Iteration {
    pub state: PollState,
    pub outcome: Result<IterationReport>,
}
