use serde::Serialize;
use thiserror::Error;

use crate::{db_types::OrderId, soe_api::order_objects::PlacementOptions, task_queue::RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum JobKind {
    PlaceOrder { order_id: OrderId, options: PlacementOptions },
    /// Re-run only the add-to-cart and checkout pair for an order whose checkout was interrupted by a challenge.
    ResumeCheckout { order_id: OrderId },
    VerifyPrices { order_id: OrderId },
    RefreshSession { credential_id: i64 },
    QuickRefresh { user_id: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub kind: JobKind,
    /// Jobs sharing a key never run at the same time.
    pub concurrency_key: Option<String>,
    pub policy: RetryPolicy,
}

impl Job {
    pub fn new(kind: JobKind, policy: RetryPolicy) -> Self {
        Self { kind, concurrency_key: None, policy }
    }

    /// Serialises the job with every other job touching the same supplier credential.
    pub fn for_credential(mut self, credential_id: i64) -> Self {
        self.concurrency_key = Some(credential_key(credential_id));
        self
    }
}

pub fn credential_key(credential_id: i64) -> String {
    format!("credential:{credential_id}")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// A transient failure caused by a slow supplier.
    #[error("Job timed out: {0}")]
    Timeout(String),
    #[error("Job failed: {0}")]
    Failed(String),
    /// The job reached a conclusion that another run cannot change.
    #[error("Job abandoned: {0}")]
    Abandoned(String),
    #[error("The task queue is not accepting jobs")]
    QueueClosed,
}
