//! Bounded status polling
//!
//! The job status is checked at a fixed interval until it reaches a terminal
//! status or the attempt budget runs out. There is no backoff or jitter,
//! and no sleep after the last attempt.

use crate::error::{Result, SdkError, WorkflowStep};
use crate::transport::CancellationSignal;
use crate::types::{JobStatus, ProverJob};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Statuses that end polling
pub const TERMINAL_STATUSES: [JobStatus; 3] = [JobStatus::Done, JobStatus::Failed, JobStatus::Canceled];

/// Default number of status checks
pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;

/// Default pause between status checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polling budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingPolicy {
    /// Maximum number of status checks
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause between consecutive checks
    #[serde(
        default = "default_interval",
        with = "crate::config::duration_millis"
    )]
    pub interval: Duration,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

impl Default for PollingPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollingPolicy {
    /// Whether `status` ends polling
    pub fn is_terminal(status: JobStatus) -> bool {
        TERMINAL_STATUSES.contains(&status)
    }

    /// Poll `check` until `job` reaches a terminal status
    ///
    /// # Arguments
    /// * `job` - Job being polled; its status is updated after every check
    /// * `cancel` - Optional signal observed before each check and while sleeping
    /// * `check` - Fetches the current status; its errors end polling
    ///
    /// # Returns
    /// The terminal status; `Err(SdkError::PollingTimedOut)` after
    /// `max_attempts` non-terminal checks; `Err(SdkError::Canceled)` when
    /// `cancel` fires between checks.
    pub async fn run<F, Fut>(
        &self,
        job: &mut ProverJob,
        cancel: Option<&CancellationSignal>,
        mut check: F,
    ) -> Result<JobStatus>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<JobStatus>>,
    {
        let canceled = SdkError::Canceled {
            step: WorkflowStep::Polling,
        };

        let mut attempts = 0;
        while attempts < self.max_attempts {
            if cancel.is_some_and(CancellationSignal::is_canceled) {
                return Err(canceled);
            }

            attempts += 1;
            job.status = check().await?;
            log::debug!(
                "job {} status {} (check {}/{})",
                job.query_id,
                job.status,
                attempts,
                self.max_attempts
            );

            if Self::is_terminal(job.status) {
                return Ok(job.status);
            }
            if attempts == self.max_attempts {
                break;
            }

            match cancel {
                Some(signal) => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.interval) => {}
                        _ = signal.canceled() => return Err(canceled),
                    }
                }
                None => tokio::time::sleep(self.interval).await,
            }
        }

        log::warn!(
            "job {} not finished after {} status checks",
            job.query_id,
            attempts
        );
        Err(SdkError::PollingTimedOut {
            query_id: job.query_id.clone(),
            attempts,
        })
    }
}
