use std::fmt::Display;

use serde::{Deserialize, Serialize};
use supplier_order_engine::task_queue::{Job, JobKind};

/// The reply to a request that was handed to the task queue.
#[derive(Debug, Clone, Serialize)]
pub struct QueuedJob {
    pub message: String,
    pub job: JobKind,
    pub concurrency_key: Option<String>,
}

impl QueuedJob {
    pub fn new<S: Display>(message: S, job: Job) -> Self {
        Self { message: message.to_string(), job: job.kind, concurrency_key: job.concurrency_key }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SkipVerificationParams {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitCodeParams {
    pub session_token: String,
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelChallengeParams {
    pub session_token: String,
}
