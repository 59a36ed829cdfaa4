//! # Placement orchestrator
//!
//! Drives one order from `pending` to `submitted` (or to the state that explains why not):
//!
//! 1. Claim the order by moving it to `processing`. A concurrent attempt loses the claim and backs off.
//! 2. Validate. Errors fail the order; warnings hold it for review unless the caller skips them.
//! 3. Pre-flight against the live supplier.
//! 4. Add to cart and check out, with at most one retry after an accepted price change.
//!
//! Add to cart and checkout are each sent once. A checkout the supplier did not answer in time may still have gone
//! through, so the order is handed to the user to check rather than failed and retried.
//!
//! Every adapter failure is routed to exactly one terminal status. Anything unexpected marks the order `failed` and
//! is returned as an error so the task queue may retry it.
use chrono::Utc;
use log::*;
use serde_json::json;

use crate::{
    adapters::{with_timeout, AdapterError, CartLine, CheckoutReceipt, PriceChange, SupplierAdapter, TwoFactorPrompt},
    db_types::{
        CredentialStatus,
        ItemStatus,
        NewOrderValidation,
        Order,
        OrderId,
        OrderSnapshot,
        OrderStatusType,
        OrderTransition,
        TwoFactorRequestType,
        ValidationType,
        VerificationStatus,
    },
    events::{HoldKind, OrderFailedEvent, OrderHeldEvent, OrderSubmittedEvent},
    soe_api::{
        errors::PlacementError,
        order_objects::{PlacementOptions, PlacementOutcome, PreflightFailure},
        preflight::{PreflightRun, PreflightVerifier},
        session,
        two_factor_api::{ChallengeRequest, TwoFactorApi},
        validation_engine::ValidationEngine,
        EngineContext,
    },
    task_queue::{Job, JobKind, RetryPolicy},
    traits::{StoreError, SupplierOrderDatabase},
};

pub struct PlacementApi<B> {
    ctx: EngineContext<B>,
    validator: ValidationEngine<B>,
    preflight: PreflightVerifier<B>,
    two_factor: TwoFactorApi<B>,
}

impl<B: Clone> PlacementApi<B> {
    pub fn new(ctx: EngineContext<B>) -> Self {
        Self {
            validator: ValidationEngine::new(ctx.db.clone(), ctx.config.clone()),
            preflight: PreflightVerifier::new(ctx.clone()),
            two_factor: TwoFactorApi::new(ctx.clone()),
            ctx,
        }
    }
}

impl<B> PlacementApi<B>
where B: SupplierOrderDatabase
{
    /// Places the order with the supplier.
    ///
    /// Orders whose last price verification failed, and orders with unreviewed price changes, are refused before
    /// anything is written. If another attempt already holds the order, [`PlacementOutcome::InFlight`] is returned.
    pub async fn place_order(
        &self,
        order_id: &OrderId,
        options: PlacementOptions,
    ) -> Result<PlacementOutcome, PlacementError> {
        let order = self.ctx.db.fetch_order(order_id).await?.ok_or(PlacementError::OrderNotFound(*order_id))?;
        ensure_placeable(&order, &options)?;
        if !self.claim(order_id).await? {
            info!("🧾️ Order {order_id} is already being placed");
            return Ok(PlacementOutcome::InFlight);
        }
        info!("🧾️ Placing order {order_id} with {options:?}");
        let result = self.run_placement(order_id, options).await;
        self.settle(order_id, result).await
    }

    /// Queues [`Self::place_order`] on the task queue, serialised with every other job for the same supplier account.
    pub async fn schedule_placement(&self, order_id: &OrderId, options: PlacementOptions) -> Result<Job, PlacementError> {
        let snapshot =
            self.ctx.db.fetch_order_snapshot(order_id).await?.ok_or(PlacementError::OrderNotFound(*order_id))?;
        ensure_placeable(&snapshot.order, &options)?;
        if snapshot.order.status.is_final() {
            return Err(PlacementError::NotPlaceable(*order_id, snapshot.order.status));
        }
        let policy = RetryPolicy::placement().with_max_attempts(self.ctx.config.placement_max_attempts);
        let mut job = Job::new(JobKind::PlaceOrder { order_id: *order_id, options }, policy);
        if let Some(credential) = &snapshot.credential {
            job = job.for_credential(credential.id);
        }
        self.ctx.scheduler.schedule(job.clone())?;
        info!("🧾️ Placement of order {order_id} queued");
        Ok(job)
    }

    /// Re-runs only the add-to-cart and checkout pair for an order whose checkout stopped at a two-factor prompt.
    /// Validation and pre-flight are not repeated.
    pub async fn resume_checkout(&self, order_id: &OrderId) -> Result<PlacementOutcome, PlacementError> {
        self.ctx.db.fetch_order(order_id).await?.ok_or(PlacementError::OrderNotFound(*order_id))?;
        if !self.claim(order_id).await? {
            info!("🧾️ Order {order_id} is already being placed");
            return Ok(PlacementOutcome::InFlight);
        }
        info!("🧾️ Resuming checkout for order {order_id}");
        let result = self.run_resume(order_id).await;
        self.settle(order_id, result).await
    }

    /// Moves the order to `processing`. Returns `false` if another attempt holds it.
    async fn claim(&self, order_id: &OrderId) -> Result<bool, PlacementError> {
        match self.ctx.db.transition_order(order_id, OrderTransition::Processing).await {
            Ok(_) => Ok(true),
            Err(StoreError::InvalidTransition { from: OrderStatusType::Processing, .. }) => Ok(false),
            Err(StoreError::InvalidTransition { from, .. }) => Err(PlacementError::NotPlaceable(*order_id, from)),
            Err(e) => Err(e.into()),
        }
    }

    /// Makes sure an order never stays `processing` after an unexpected error.
    async fn settle(
        &self,
        order_id: &OrderId,
        result: Result<PlacementOutcome, PlacementError>,
    ) -> Result<PlacementOutcome, PlacementError> {
        let err = match result {
            Ok(outcome) => return Ok(outcome),
            Err(PlacementError::Retryable(id, msg)) => return Err(PlacementError::Retryable(id, msg)),
            Err(e) => e,
        };
        error!("🧾️ Unexpected error while placing order {order_id}: {err}");
        if let Err(e) = self.fail(order_id, err.to_string()).await {
            error!("🧾️ Could not mark order {order_id} as failed: {e}");
        }
        Err(err)
    }

    async fn run_placement(
        &self,
        order_id: &OrderId,
        options: PlacementOptions,
    ) -> Result<PlacementOutcome, PlacementError> {
        let (report, snapshot) = self.validator.validate(order_id, Utc::now()).await?;
        if report.is_blocking() {
            return self.fail(order_id, report.error_summary()).await;
        }
        if report.has_warnings() && !options.skip_warnings {
            return self.hold_for_review(order_id, report.warning_summary()).await;
        }

        let PreflightRun { report, adapter } = self.preflight.run(&snapshot, &options).await?;
        let mut adapter = match (adapter, report.failure) {
            (Some(adapter), None) => adapter,
            (_, Some(failure)) => return self.route_preflight_failure(&snapshot, failure).await,
            (None, None) => {
                return Err(PlacementError::Unexpected(*order_id, "pre-flight returned no session".to_string()))
            },
        };
        // Pre-flight may have repriced items.
        let snapshot = self.snapshot(order_id).await?;
        self.checkout(snapshot, adapter.as_mut(), options.accept_price_changes).await
    }

    async fn run_resume(&self, order_id: &OrderId) -> Result<PlacementOutcome, PlacementError> {
        let snapshot = self.snapshot(order_id).await?;
        let Some(credential) = snapshot.credential.clone().filter(|c| c.is_active()) else {
            let reason = format!("No active {} account is linked", snapshot.supplier.name);
            return self.fail(order_id, reason).await;
        };
        let mut adapter = match session::open_session(&self.ctx, &snapshot.supplier, &credential).await {
            Ok(adapter) => adapter,
            Err(e) => return self.route_adapter_failure(&snapshot, e, TwoFactorRequestType::Checkout).await,
        };
        self.checkout(snapshot, adapter.as_mut(), false).await
    }

    async fn checkout(
        &self,
        mut snapshot: OrderSnapshot,
        adapter: &mut dyn SupplierAdapter,
        accept_price_changes: bool,
    ) -> Result<PlacementOutcome, PlacementError> {
        let order_id = snapshot.id();
        let timeout = self.ctx.config.adapter_timeout;
        let mut repriced = false;
        loop {
            let lines = cart_lines(&snapshot);
            let delivery_date = snapshot.order.delivery_date;
            let result = match with_timeout(timeout, adapter.add_to_cart(&lines, delivery_date)).await {
                Ok(()) => match with_timeout(timeout, adapter.checkout()).await {
                    Err(AdapterError::Timeout) => return self.unconfirmed_checkout(&snapshot).await,
                    result => result,
                },
                Err(e) => Err(e),
            };
            let changes = match result {
                Ok(receipt) => return self.submitted(&snapshot, receipt).await,
                Err(AdapterError::PriceChanged(changes)) => changes,
                Err(e) => return self.route_adapter_failure(&snapshot, e, TwoFactorRequestType::Checkout).await,
            };
            self.record_price_changes(&order_id, &changes, accept_price_changes).await?;
            if !accept_price_changes {
                let reason = AdapterError::PriceChanged(changes).to_string();
                return self.hold_for_review(&order_id, reason).await;
            }
            if repriced {
                let reason = format!("Prices changed again during checkout: {}", AdapterError::PriceChanged(changes));
                return self.fail(&order_id, reason).await;
            }
            repriced = true;
            let prices = changes
                .iter()
                .filter_map(|c| snapshot.line_for_sku(&c.sku).map(|l| (l.item.id, c.new_price)))
                .collect::<Vec<_>>();
            self.ctx.db.reprice_order_items(&order_id, &prices).await?;
            info!("🧾️ Order {order_id}: accepted {} price changes at checkout. Retrying once", prices.len());
            snapshot = self.snapshot(&order_id).await?;
        }
    }

    /// The checkout was sent but never answered. The order may exist at the supplier, so it must not be sent again.
    async fn unconfirmed_checkout(&self, snapshot: &OrderSnapshot) -> Result<PlacementOutcome, PlacementError> {
        let supplier = &snapshot.supplier;
        warn!("🧾️ Order {}: {} did not answer the checkout in time", snapshot.id(), supplier.name);
        let reason = format!(
            "{} did not confirm the order in time. It may have been placed. Check your orders on the supplier's website \
             before trying again: {}",
            supplier.name, supplier.website_url
        );
        self.hold_manual(&snapshot.id(), reason, None).await
    }

    async fn route_preflight_failure(
        &self,
        snapshot: &OrderSnapshot,
        failure: PreflightFailure,
    ) -> Result<PlacementOutcome, PlacementError> {
        let order_id = snapshot.id();
        match failure {
            PreflightFailure::TwoFactorRequired(prompt) => {
                self.await_code(snapshot, prompt, TwoFactorRequestType::Login).await
            },
            PreflightFailure::SessionFailed(e) => {
                self.route_adapter_failure(snapshot, e, TwoFactorRequestType::Login).await
            },
            PreflightFailure::ItemsUnavailable(items) => {
                self.route_adapter_failure(snapshot, AdapterError::ItemUnavailable(items), TwoFactorRequestType::Login)
                    .await
            },
            PreflightFailure::UnresolvedPriceChanges(_) => self.hold_for_review(&order_id, failure.message()).await,
            other => self.fail(&order_id, other.message()).await,
        }
    }

    /// Routes a failed adapter call to the order status it calls for.
    async fn route_adapter_failure(
        &self,
        snapshot: &OrderSnapshot,
        err: AdapterError,
        challenge_type: TwoFactorRequestType,
    ) -> Result<PlacementOutcome, PlacementError> {
        let order_id = snapshot.id();
        let supplier = &snapshot.supplier;
        match err {
            AdapterError::OrderMinimum { .. } | AdapterError::DeliveryUnavailable(_) => {
                self.fail(&order_id, err.to_string()).await
            },
            AdapterError::ItemUnavailable(ref items) => {
                let ids = items
                    .iter()
                    .filter_map(|i| snapshot.line_for_sku(&i.sku).map(|l| l.item.id))
                    .collect::<Vec<_>>();
                self.ctx.db.set_item_status(&order_id, &ids, ItemStatus::Failed).await?;
                self.fail(&order_id, err.to_string()).await
            },
            AdapterError::AccountHold(_) => {
                if let Some(credential) = &snapshot.credential {
                    warn!("🧾️ {} put credential {} on hold", supplier.name, credential.id);
                    self.ctx.db.set_credential_status(credential.id, CredentialStatus::OnHold).await?;
                }
                self.fail(&order_id, err.to_string()).await
            },
            AdapterError::CaptchaDetected => {
                let reason = format!(
                    "{} asked for a CAPTCHA. Please finish this order on the supplier's website: {}",
                    supplier.name, supplier.website_url
                );
                self.hold_manual(&order_id, reason, None).await
            },
            AdapterError::TwoFactorRequired(prompt) => self.await_code(snapshot, prompt, challenge_type).await,
            AdapterError::NotImplemented(capability) => {
                let reason = format!("The {} integration cannot place orders ({capability} is not supported)", supplier.name);
                self.fail(&order_id, reason).await
            },
            other => {
                let reason = other.to_string();
                self.fail(&order_id, reason.clone()).await?;
                Err(PlacementError::Retryable(order_id, reason))
            },
        }
    }

    /// Parks the order as `pending_manual` and asks the user for a code. The verified code resumes the work.
    async fn await_code(
        &self,
        snapshot: &OrderSnapshot,
        prompt: TwoFactorPrompt,
        request_type: TwoFactorRequestType,
    ) -> Result<PlacementOutcome, PlacementError> {
        let order_id = snapshot.id();
        let Some(credential) = &snapshot.credential else {
            return self.fail(&order_id, "The supplier asked for a code but no account is linked".to_string()).await;
        };
        let reason = format!("{} needs a verification code to continue", snapshot.supplier.name);
        let order = self.ctx.db.transition_order(&order_id, OrderTransition::PendingManual { message: reason.clone() }).await?;
        let request = ChallengeRequest::new(credential, &snapshot.supplier, request_type, prompt).for_order(order_id);
        let challenge = self
            .two_factor
            .open_challenge(request)
            .await
            .map_err(|e| PlacementError::Unexpected(order_id, e.to_string()))?;
        self.publish_held(order, HoldKind::Manual, reason.clone()).await;
        Ok(PlacementOutcome::PendingManual { reason, session_token: Some(challenge.session_token) })
    }

    async fn submitted(
        &self,
        snapshot: &OrderSnapshot,
        receipt: CheckoutReceipt,
    ) -> Result<PlacementOutcome, PlacementError> {
        let order_id = snapshot.id();
        self.ctx.db.set_item_status(&order_id, &snapshot.item_ids(), ItemStatus::Added).await?;
        let transition = OrderTransition::Submitted {
            confirmation_number: receipt.confirmation_number.clone(),
            total: receipt.total,
            delivery_date: receipt.delivery_date.or(snapshot.order.delivery_date),
            at: Utc::now(),
        };
        let order = self.ctx.db.transition_order(&order_id, transition).await?;
        info!("🧾️ Order {order_id} submitted. Confirmation number {}", receipt.confirmation_number);
        self.ctx.producers.publish_order_submitted(OrderSubmittedEvent { order }).await;
        Ok(PlacementOutcome::Submitted { confirmation_number: receipt.confirmation_number, total: receipt.total })
    }

    async fn fail(&self, order_id: &OrderId, reason: String) -> Result<PlacementOutcome, PlacementError> {
        let order = self.ctx.db.transition_order(order_id, OrderTransition::Failed { message: reason.clone() }).await?;
        info!("🧾️ Order {order_id} failed: {reason}");
        self.ctx.producers.publish_order_failed(OrderFailedEvent { order, reason: reason.clone() }).await;
        Ok(PlacementOutcome::Failed { reason })
    }

    async fn hold_for_review(&self, order_id: &OrderId, reason: String) -> Result<PlacementOutcome, PlacementError> {
        let transition = OrderTransition::PendingReview { message: reason.clone() };
        let order = self.ctx.db.transition_order(order_id, transition).await?;
        info!("🧾️ Order {order_id} held for review: {reason}");
        self.publish_held(order, HoldKind::Review, reason.clone()).await;
        Ok(PlacementOutcome::PendingReview { reason })
    }

    async fn hold_manual(
        &self,
        order_id: &OrderId,
        reason: String,
        session_token: Option<String>,
    ) -> Result<PlacementOutcome, PlacementError> {
        let transition = OrderTransition::PendingManual { message: reason.clone() };
        let order = self.ctx.db.transition_order(order_id, transition).await?;
        info!("🧾️ Order {order_id} needs manual action: {reason}");
        self.publish_held(order, HoldKind::Manual, reason.clone()).await;
        Ok(PlacementOutcome::PendingManual { reason, session_token })
    }

    async fn publish_held(&self, order: Order, hold: HoldKind, reason: String) {
        self.ctx.producers.publish_order_held(OrderHeldEvent { order, hold, reason }).await;
    }

    async fn record_price_changes(
        &self,
        order_id: &OrderId,
        changes: &[PriceChange],
        accepted: bool,
    ) -> Result<(), PlacementError> {
        let details = changes
            .iter()
            .map(|c| json!({ "sku": c.sku, "old_price": c.old_price, "new_price": c.new_price }))
            .collect::<Vec<_>>();
        let row = NewOrderValidation::warning(
            *order_id,
            ValidationType::LivePriceChange,
            AdapterError::PriceChanged(changes.to_vec()).to_string(),
            json!({ "items": details, "accepted": accepted, "stage": "checkout" }),
        );
        self.ctx.db.record_validations(&[row]).await?;
        Ok(())
    }

    async fn snapshot(&self, order_id: &OrderId) -> Result<OrderSnapshot, PlacementError> {
        self.ctx.db.fetch_order_snapshot(order_id).await?.ok_or(PlacementError::OrderNotFound(*order_id))
    }
}

fn cart_lines(snapshot: &OrderSnapshot) -> Vec<CartLine> {
    snapshot
        .items
        .iter()
        .map(|l| CartLine { sku: l.product.sku.clone(), quantity: l.item.quantity, unit_price: l.item.unit_price })
        .collect()
}

/// Refuses orders whose last price verification failed, and unreviewed price changes the caller has not accepted.
fn ensure_placeable(order: &Order, options: &PlacementOptions) -> Result<(), PlacementError> {
    if order.verification_status == VerificationStatus::Failed {
        return Err(PlacementError::VerificationHeld(order.id));
    }
    if order.status == OrderStatusType::PriceChanged && !options.accept_price_changes {
        return Err(PlacementError::PriceReviewRequired(order.id));
    }
    Ok(())
}
