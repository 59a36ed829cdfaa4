//! # Task queue
//!
//! Every pipeline stage runs as a [`Job`]. A job carries its own [`RetryPolicy`] and an optional concurrency key;
//! jobs sharing a key (one supplier credential) run strictly one at a time, everything else runs concurrently.
mod jobs;
mod locks;
mod queue;
mod retry;

pub use jobs::{credential_key, Job, JobError, JobKind};
pub use locks::{KeyGuard, KeyedLocks};
pub use queue::{
    execute,
    execute_keyed,
    JobOutcome,
    JobRunner,
    JobScheduler,
    RecordingScheduler,
    TaskQueue,
    TaskQueueHandle,
};
pub use retry::{RetryOn, RetryPolicy};
