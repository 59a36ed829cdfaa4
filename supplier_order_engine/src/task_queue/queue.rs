use std::{rc::Rc, sync::Arc};

use async_trait::async_trait;
use log::*;
use tokio::{sync::mpsc, task::JoinSet};

use crate::task_queue::{Job, JobError, JobKind, KeyedLocks};

/// Executes one job. Runners are driven on a single thread, so their futures need not be `Send`.
#[async_trait(?Send)]
pub trait JobRunner {
    async fn run(&self, job: &JobKind) -> Result<(), JobError>;
}

/// Accepts jobs for asynchronous execution.
pub trait JobScheduler: Send + Sync {
    fn schedule(&self, job: Job) -> Result<(), JobError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { attempts: u32 },
    Failed { attempts: u32 },
}

/// The sending half of a [`TaskQueue`].
#[derive(Clone)]
pub struct TaskQueueHandle {
    sender: mpsc::UnboundedSender<Job>,
}

impl JobScheduler for TaskQueueHandle {
    fn schedule(&self, job: Job) -> Result<(), JobError> {
        trace!("⏱️ Scheduling {:?}", job.kind);
        self.sender.send(job).map_err(|_| JobError::QueueClosed)
    }
}

/// An in-process task queue with per-job retry policies and per-key mutual exclusion.
pub struct TaskQueue {
    receiver: mpsc::UnboundedReceiver<Job>,
    locks: KeyedLocks,
}

impl TaskQueue {
    pub fn new() -> (Self, TaskQueueHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { receiver, locks: KeyedLocks::default() }, TaskQueueHandle { sender })
    }

    /// The locks behind the concurrency keys. Hand these to the engine context so that work done outside the queue
    /// on a supplier credential waits for queued work on the same credential, and vice versa.
    pub fn locks(&self) -> KeyedLocks {
        self.locks.clone()
    }

    /// Runs jobs until every [`TaskQueueHandle`] has been dropped and the backlog has drained.
    ///
    /// Jobs are spawned with `spawn_local`, so this must be driven from inside a `tokio::task::LocalSet` (the actix
    /// runtime is one).
    pub async fn run<R: JobRunner + 'static>(mut self, runner: Rc<R>) {
        info!("⏱️ Task queue started");
        let mut in_flight = JoinSet::new();
        while let Some(job) = self.receiver.recv().await {
            let runner = Rc::clone(&runner);
            let locks = self.locks.clone();
            in_flight.spawn_local(async move { execute_keyed(runner.as_ref(), &job, &locks).await });
            while let Some(done) = in_flight.try_join_next() {
                if let Err(e) = done {
                    error!("⏱️ A job panicked: {e}");
                }
            }
        }
        while let Some(done) = in_flight.join_next().await {
            if let Err(e) = done {
                error!("⏱️ A job panicked: {e}");
            }
        }
        info!("⏱️ Task queue stopped");
    }
}

/// Runs the job to completion under its retry policy, ignoring its concurrency key.
pub async fn execute<R: JobRunner + ?Sized>(runner: &R, job: &Job) -> JobOutcome {
    run_attempts(runner, job, None).await
}

/// Like [`execute`], but every attempt holds the job's concurrency key. The key is released while the job waits to
/// retry, so other work on the same credential can run in between.
pub async fn execute_keyed<R: JobRunner + ?Sized>(runner: &R, job: &Job, locks: &KeyedLocks) -> JobOutcome {
    run_attempts(runner, job, Some(locks)).await
}

async fn run_attempts<R: JobRunner + ?Sized>(runner: &R, job: &Job, locks: Option<&KeyedLocks>) -> JobOutcome {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = {
            let _guard = match (locks, &job.concurrency_key) {
                (Some(locks), Some(key)) => Some(locks.lock(key).await),
                _ => None,
            };
            runner.run(&job.kind).await
        };
        match result {
            Ok(()) => {
                debug!("⏱️ {:?} completed after {attempt} attempt(s)", job.kind);
                return JobOutcome::Completed { attempts: attempt };
            },
            Err(e) if job.policy.should_retry(&e, attempt) => {
                let delay = job.policy.delay_for(attempt);
                warn!("⏱️ {:?} failed on attempt {attempt}: {e}. Retrying in {}s", job.kind, delay.as_secs());
                tokio::time::sleep(delay).await;
            },
            Err(e) => {
                error!("⏱️ {:?} gave up after {attempt} attempt(s): {e}", job.kind);
                return JobOutcome::Failed { attempts: attempt };
            },
        }
    }
}

/// A scheduler that only records what it is given. Useful where jobs must be observed rather than run.
#[derive(Clone, Default)]
pub struct RecordingScheduler {
    jobs: Arc<std::sync::Mutex<Vec<Job>>>,
}

impl RecordingScheduler {
    pub fn jobs(&self) -> Vec<Job> {
        match self.jobs.lock() {
            Ok(jobs) => jobs.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl JobScheduler for RecordingScheduler {
    fn schedule(&self, job: Job) -> Result<(), JobError> {
        match self.jobs.lock() {
            Ok(mut jobs) => jobs.push(job),
            Err(poisoned) => poisoned.into_inner().push(job),
        }
        Ok(())
    }
}
