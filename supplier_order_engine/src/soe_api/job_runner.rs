use async_trait::async_trait;
use log::*;

use crate::{
    soe_api::{
        errors::{PlacementError, PriceVerificationError, TwoFactorError},
        order_objects::PlacementOutcome,
        EngineContext,
        PlacementApi,
        PriceVerificationApi,
        TwoFactorApi,
    },
    task_queue::{JobError, JobKind, JobRunner},
    traits::SupplierOrderDatabase,
};

/// Runs task queue jobs against the engine APIs.
pub struct EngineJobRunner<B> {
    placement: PlacementApi<B>,
    prices: PriceVerificationApi<B>,
    two_factor: TwoFactorApi<B>,
}

impl<B: Clone> EngineJobRunner<B> {
    pub fn new(ctx: EngineContext<B>) -> Self {
        Self {
            placement: PlacementApi::new(ctx.clone()),
            prices: PriceVerificationApi::new(ctx.clone()),
            two_factor: TwoFactorApi::new(ctx),
        }
    }
}

#[async_trait(?Send)]
impl<B> JobRunner for EngineJobRunner<B>
where B: SupplierOrderDatabase
{
    async fn run(&self, job: &JobKind) -> Result<(), JobError> {
        match job {
            JobKind::PlaceOrder { order_id, options } => {
                let outcome = self.placement.place_order(order_id, *options).await.map_err(placement_error)?;
                log_outcome(job, &outcome);
            },
            JobKind::ResumeCheckout { order_id } => {
                let outcome = self.placement.resume_checkout(order_id).await.map_err(placement_error)?;
                log_outcome(job, &outcome);
            },
            JobKind::VerifyPrices { order_id } => {
                let outcome = self.prices.verify_order(order_id).await.map_err(verification_error)?;
                debug!("⏱️ {job:?}: verification {}", outcome.status);
            },
            JobKind::RefreshSession { credential_id } => {
                self.two_factor.refresh_session(*credential_id).await.map_err(two_factor_error)?;
            },
            JobKind::QuickRefresh { user_id } => {
                let report = self.prices.quick_refresh(*user_id).await.map_err(verification_error)?;
                debug!("⏱️ {job:?}: {} branches", report.branches.len());
            },
        }
        Ok(())
    }
}

fn log_outcome(job: &JobKind, outcome: &PlacementOutcome) {
    debug!("⏱️ {job:?}: order is now {}", outcome.status());
}

fn placement_error(e: PlacementError) -> JobError {
    match e {
        PlacementError::Retryable(_, msg) => JobError::Failed(msg),
        PlacementError::Store(e) => JobError::Failed(e.to_string()),
        PlacementError::Unexpected(_, msg) => JobError::Failed(msg),
        e => JobError::Abandoned(e.to_string()),
    }
}

fn verification_error(e: PriceVerificationError) -> JobError {
    match e {
        PriceVerificationError::Timeout(id) => JobError::Timeout(format!("price verification for order {id}")),
        PriceVerificationError::Store(e) => JobError::Failed(e.to_string()),
        e => JobError::Abandoned(e.to_string()),
    }
}

fn two_factor_error(e: TwoFactorError) -> JobError {
    match e {
        TwoFactorError::Adapter(crate::adapters::AdapterError::Timeout) => JobError::Timeout(e.to_string()),
        e => JobError::Failed(e.to_string()),
    }
}
