//! Async job completion tracking
//!
//! Migrations return a job id; the job is polled until it reaches a terminal
//! status or the retry budget runs out. A timeout is reported exactly like a
//! failure: the caller only learns "successful" or "not".

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::{CloudApi, JobId, JobStatus};

/// Default number of status polls per job
pub const DEFAULT_MAX_RETRIES: u32 = 120;

/// Default delay between polls (seconds)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 1;

/// Polls a single async job to completion
#[derive(Debug, Clone, Copy)]
pub struct JobWaiter {
    max_retries: u32,
    interval: Duration,
}

impl JobWaiter {
    /// Create a waiter with the default budget (120 polls, 1s apart)
    pub fn new() -> Self {
        Self::with_budget(
            DEFAULT_MAX_RETRIES,
            Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        )
    }

    /// Create a waiter with a custom budget
    pub fn with_budget(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
        }
    }

    /// Maximum number of polls
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay between polls
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for `job_id` to finish
    ///
    /// Returns `true` only if the job reports success within the budget.
    /// A failed poll (transport error, unknown status) uses up one retry.
    pub async fn wait(&self, api: &dyn CloudApi, job_id: &JobId) -> bool {
        for attempt in 1..=self.max_retries {
            match api.query_async_job_result(job_id).await {
                Ok(JobStatus::Succeeded) => {
                    info!(job_id = %job_id, polls = attempt, "Job completed successfully");
                    return true;
                }
                Ok(JobStatus::Failed) => {
                    warn!(job_id = %job_id, polls = attempt, "Job failed");
                    return false;
                }
                Ok(JobStatus::Running) => {
                    debug!(job_id = %job_id, attempt, "Job still running");
                }
                Err(e) => {
                    warn!(job_id = %job_id, attempt, error = %e, "Job status query failed");
                }
            }

            if attempt < self.max_retries {
                tokio::time::sleep(self.interval).await;
            }
        }

        warn!(
            job_id = %job_id,
            max_retries = self.max_retries,
            "Job did not finish within retry budget"
        );
        false
    }
}

impl Default for JobWaiter {
    fn default() -> Self {
        Self::new()
    }
}
