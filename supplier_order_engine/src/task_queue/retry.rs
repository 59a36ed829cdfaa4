use std::time::Duration;

use serde::Serialize;

use crate::task_queue::JobError;

/// Which failures a job may be retried on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryOn {
    /// Any failure except an abandoned job.
    AnyFailure,
    TimeoutsOnly,
    Never,
}

/// How the task queue retries a failed job. Chosen by whoever enqueues the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub retry_on: RetryOn,
}

impl RetryPolicy {
    /// A few retries with backoff for order placement. Generic failures are worth another go; everything the user
    /// has to fix is reported as an abandoned job and never retried.
    pub fn placement() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(300),
            retry_on: RetryOn::AnyFailure,
        }
    }

    /// Price verification is only retried when the supplier timed out.
    pub fn verification() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(120),
            retry_on: RetryOn::TimeoutsOnly,
        }
    }

    /// Run once. Used for every job triggered by a two-factor code submission.
    pub fn none() -> Self {
        Self { max_attempts: 1, base_delay: Duration::ZERO, max_delay: Duration::ZERO, retry_on: RetryOn::Never }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// Whether a job that has just failed its `attempt`-th run (1-based) with `error` should run again.
    pub fn should_retry(&self, error: &JobError, attempt: u32) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        match (self.retry_on, error) {
            (RetryOn::Never, _) | (_, JobError::Abandoned(_)) | (_, JobError::QueueClosed) => false,
            (RetryOn::AnyFailure, _) => true,
            (RetryOn::TimeoutsOnly, JobError::Timeout(_)) => true,
            (RetryOn::TimeoutsOnly, _) => false,
        }
    }

    /// The wait before the next run after `attempt` failures: `base_delay * 2^(attempt - 1)`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent).min(self.max_delay)
    }
}
