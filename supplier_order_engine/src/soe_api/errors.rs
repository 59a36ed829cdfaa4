use thiserror::Error;

use crate::{
    adapters::AdapterError,
    db_types::{ChallengeStatus, OrderId, OrderStatusType},
    soe_api::order_objects::ValidationReport,
    task_queue::JobError,
    traits::StoreError,
};

#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {order_id} failed validation: {}", .report.error_summary())]
    Blocked { order_id: OrderId, report: ValidationReport },
}

#[derive(Debug, Clone, Error)]
pub enum PlacementError {
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} failed price verification and is held until verification is retried or skipped")]
    VerificationHeld(OrderId),
    #[error("Order {0} has unreviewed price changes. Accept the changes to place it")]
    PriceReviewRequired(OrderId),
    #[error("Order {0} cannot be placed while it is {1}")]
    NotPlaceable(OrderId, OrderStatusType),
    /// The attempt failed for a reason another attempt might not share. The order has been marked `failed`.
    #[error("Placement of order {0} failed: {1}")]
    Retryable(OrderId, String),
    #[error("Unexpected error while placing order {0}: {1}")]
    Unexpected(OrderId, String),
    #[error("Could not queue the placement: {0}")]
    Scheduling(#[from] JobError),
}

#[derive(Debug, Clone, Error)]
pub enum PriceVerificationError {
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} cannot be verified while it is {1}")]
    NotVerifiable(OrderId, OrderStatusType),
    /// The supplier did not answer in time. The order has been marked as failed verification.
    #[error("Price verification for order {0} timed out")]
    Timeout(OrderId),
    #[error("Could not queue the verification: {0}")]
    Scheduling(#[from] JobError),
}

#[derive(Debug, Clone, Error)]
pub enum TwoFactorError {
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("No verification request matches that session token")]
    ChallengeNotFound,
    #[error("The verification request is already {0}")]
    NotPending(ChallengeStatus),
    #[error("The verification request has expired")]
    Expired,
    #[error("Too many incorrect codes. Please start again")]
    AttemptsExhausted,
    #[error("Supplier credential {0} does not exist")]
    CredentialNotFound(i64),
    #[error("Could not reach the supplier: {0}")]
    Adapter(#[from] AdapterError),
    #[error("Could not schedule the follow-up work: {0}")]
    Scheduling(#[from] JobError),
}

#[derive(Debug, Clone, Error)]
pub enum OrderApiError {
    #[error("{0}")]
    Store(#[from] StoreError),
    /// Also returned for orders that belong to another user.
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
}
