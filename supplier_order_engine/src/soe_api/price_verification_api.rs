//! # Price verification
//!
//! Compares an order's prices with what the supplier currently charges. Recently cached prices are trusted as they
//! are. Otherwise one live scrape is made and the relative change in the order total is compared with the tolerance
//! band. The stage is deliberately forgiving: a supplier that cannot be checked right now leaves the order `skipped`
//! with cached prices rather than blocking it, unless the failure means the user's account needs attention.
use std::{cell::Cell, collections::HashMap};

use chrono::Utc;
use futures_util::future::join_all;
use log::*;
use serde_json::json;
use sog_common::Money;
use tokio::time::Instant;

use crate::{
    adapters::{AdapterError, ScrapedPrice},
    db_types::{
        NewOrderValidation,
        Order,
        OrderId,
        OrderSnapshot,
        OrderStatusType,
        OrderTransition,
        Supplier,
        SupplierCredential,
        SupplierProduct,
        TwoFactorRequestType,
        ValidationType,
        VerificationStatus,
    },
    helpers::name_list,
    live_call,
    soe_api::{
        errors::PriceVerificationError,
        order_objects::{
            BatchEntry,
            BatchVerificationReport,
            BranchResult,
            ItemPriceDelta,
            QuickRefreshReport,
            RefreshBranch,
            VerificationOutcome,
        },
        session,
        two_factor_api::{ChallengeRequest, TwoFactorApi},
        EngineContext,
    },
    task_queue::{Job, JobKind, RetryPolicy},
    traits::{StoreError, SupplierOrderDatabase},
};

pub struct PriceVerificationApi<B> {
    ctx: EngineContext<B>,
    two_factor: TwoFactorApi<B>,
}

impl<B: Clone> PriceVerificationApi<B> {
    pub fn new(ctx: EngineContext<B>) -> Self {
        Self { two_factor: TwoFactorApi::new(ctx.clone()), ctx }
    }
}

struct Verdict {
    outcome: VerificationOutcome,
    timed_out: bool,
}

impl From<VerificationOutcome> for Verdict {
    fn from(outcome: VerificationOutcome) -> Self {
        Self { outcome, timed_out: false }
    }
}

/// One supplier session's worth of products for a quick refresh.
struct RefreshGroup {
    supplier: Supplier,
    credential: SupplierCredential,
    products: Vec<SupplierProduct>,
}

impl<B> PriceVerificationApi<B>
where B: SupplierOrderDatabase
{
    /// Verifies the order's prices. The order passes through `verifying` and ends up `pending` (verified, skipped or
    /// failed verification) or `price_changed`.
    ///
    /// A supplier timeout is recorded as a failed verification and also returned as
    /// [`PriceVerificationError::Timeout`] so that the job can be retried.
    pub async fn verify_order(&self, order_id: &OrderId) -> Result<VerificationOutcome, PriceVerificationError> {
        self.claim(order_id).await?;
        let verdict = match self.run_verification(order_id).await {
            Ok(verdict) => verdict,
            Err(e) => {
                self.abandon(order_id, format!("Price verification failed: {e}")).await;
                return Err(e);
            },
        };
        let outcome = self.finish(verdict.outcome).await?;
        if verdict.timed_out {
            return Err(PriceVerificationError::Timeout(*order_id));
        }
        Ok(outcome)
    }

    /// Queues [`Self::verify_order`] behind any other work on the order's supplier account.
    pub async fn schedule_verification(&self, order_id: &OrderId) -> Result<Job, PriceVerificationError> {
        let snapshot = self.snapshot(order_id).await?;
        let mut job = Job::new(JobKind::VerifyPrices { order_id: *order_id }, RetryPolicy::verification());
        if let Some(credential) = &snapshot.credential {
            job = job.for_credential(credential.id);
        }
        self.ctx.scheduler.schedule(job.clone())?;
        debug!("💲️ Price verification for order {order_id} queued");
        Ok(job)
    }

    /// Queues [`Self::quick_refresh`]. The job has no concurrency key of its own: it spans several credentials, and
    /// each branch locks its credential before opening a session.
    pub fn schedule_quick_refresh(&self, user_id: i64) -> Result<Job, PriceVerificationError> {
        let job = Job::new(JobKind::QuickRefresh { user_id }, RetryPolicy::verification());
        self.ctx.scheduler.schedule(job.clone())?;
        Ok(job)
    }

    /// Marks the order as verified from cached prices without a live check, e.g. after a failed verification the
    /// user chose to ignore.
    pub async fn skip_verification(
        &self,
        order_id: &OrderId,
        reason: &str,
    ) -> Result<VerificationOutcome, PriceVerificationError> {
        self.claim(order_id).await?;
        let snapshot = match self.snapshot(order_id).await {
            Ok(s) => s,
            Err(e) => {
                self.abandon(order_id, e.to_string()).await;
                return Err(e);
            },
        };
        let message = format!("Verification skipped: {reason}");
        info!("💲️ Order {order_id}: {message}");
        self.finish(cached_outcome(&snapshot, VerificationStatus::Skipped, Some(message))).await
    }

    /// Refreshes cached prices for every product on the user's open orders, one concurrent session per supplier
    /// account. Each branch has its own time budget and the whole fan-out has an overall budget; a slow supplier only
    /// costs its own branch. A branch whose credential is busy (a placement in progress, say) waits within its budget.
    pub async fn quick_refresh(&self, user_id: i64) -> Result<QuickRefreshReport, PriceVerificationError> {
        let groups = self.refresh_groups(user_id).await?;
        if groups.is_empty() {
            debug!("💲️ Nothing to refresh for user {user_id}");
            return Ok(QuickRefreshReport::default());
        }
        let deadline = Instant::now() + self.ctx.config.fan_out_budget;
        info!("💲️ Refreshing prices for user {user_id} across {} supplier accounts", groups.len());
        let branches = join_all(groups.into_iter().map(|g| self.refresh_branch(g, deadline))).await;
        Ok(QuickRefreshReport { branches })
    }

    /// Verifies every order in the batch concurrently, within the fan-out budget. Each order waits for its credential
    /// to be free, and that wait counts against the branch budget.
    pub async fn verify_batch(&self, batch_id: &str) -> Result<BatchVerificationReport, PriceVerificationError> {
        let orders = self.ctx.db.fetch_orders_for_batch(batch_id).await?;
        let deadline = Instant::now() + self.ctx.config.fan_out_budget;
        let entries = join_all(orders.iter().map(|o| self.verify_batch_entry(o, deadline))).await;
        Ok(BatchVerificationReport { batch_id: batch_id.to_string(), entries })
    }

    async fn verify_batch_entry(&self, order: &Order, deadline: Instant) -> BatchEntry {
        let branch_deadline = deadline.min(Instant::now() + self.ctx.config.branch_budget);
        let order_id = order.id;
        let credential_id = match self.snapshot(&order_id).await {
            Ok(snapshot) => snapshot.credential.map(|c| c.id),
            Err(e) => return BatchEntry { order_id, outcome: None, error: Some(e.to_string()) },
        };
        let started = Cell::new(false);
        let locked_verification = async {
            let _lock = match credential_id {
                Some(id) => Some(self.ctx.locks.lock_credential(id).await),
                None => None,
            };
            started.set(true);
            self.verify_order(&order_id).await
        };
        match tokio::time::timeout_at(branch_deadline, locked_verification).await {
            Ok(Ok(outcome)) => BatchEntry { order_id, outcome: Some(outcome), error: None },
            Ok(Err(e)) => BatchEntry { order_id, outcome: None, error: Some(e.to_string()) },
            Err(_) => {
                // An order that never got its credential was not touched.
                if started.get() {
                    self.abandon(&order_id, "Price verification timed out".to_string()).await;
                }
                BatchEntry { order_id, outcome: None, error: Some(PriceVerificationError::Timeout(order_id).to_string()) }
            },
        }
    }

    async fn claim(&self, order_id: &OrderId) -> Result<Order, PriceVerificationError> {
        match self.ctx.db.transition_order(order_id, OrderTransition::Verifying).await {
            Ok(order) => Ok(order),
            Err(StoreError::OrderNotFound(id)) => Err(PriceVerificationError::OrderNotFound(id)),
            Err(StoreError::InvalidTransition { from, .. }) => Err(PriceVerificationError::NotVerifiable(*order_id, from)),
            Err(e) => Err(e.into()),
        }
    }

    async fn run_verification(&self, order_id: &OrderId) -> Result<Verdict, PriceVerificationError> {
        let snapshot = self.snapshot(order_id).await?;
        let now = Utc::now();
        let freshness = self.ctx.config.price_freshness;
        if snapshot.items.iter().all(|l| now - l.product.price_updated_at <= freshness) {
            debug!("💲️ Order {order_id}: cached prices are fresh. No live check needed");
            return Ok(cached_outcome(&snapshot, VerificationStatus::Verified, None).into());
        }
        let Some(credential) = snapshot.credential.clone().filter(|c| c.is_active()) else {
            let message = format!("No active {} account to check prices with", snapshot.supplier.name);
            return Ok(failed_outcome(&snapshot, message).into());
        };
        let mut adapter = match session::open_session(&self.ctx, &snapshot.supplier, &credential).await {
            Ok(adapter) => adapter,
            Err(e) => return self.classify_failure(&snapshot, &credential, e).await,
        };
        let policy = self.ctx.config.call_policy();
        let skus = snapshot.skus();
        let prices = match live_call!(&policy, adapter.scrape_prices(&skus)) {
            Ok(prices) => prices,
            Err(e) => return self.classify_failure(&snapshot, &credential, e).await,
        };
        self.store_prices(&snapshot.items.iter().map(|l| &l.product).collect::<Vec<_>>(), &prices).await?;
        Ok(self.compare(&snapshot, &prices).into())
    }

    /// Decides what a failed live check means for the order.
    async fn classify_failure(
        &self,
        snapshot: &OrderSnapshot,
        credential: &SupplierCredential,
        err: AdapterError,
    ) -> Result<Verdict, PriceVerificationError> {
        let order_id = snapshot.id();
        let supplier = &snapshot.supplier;
        let verdict: Verdict = match err {
            AdapterError::NotImplemented(_) | AdapterError::CaptchaDetected | AdapterError::Maintenance => {
                let message = format!("Live prices are unavailable from {} ({err}). Using cached prices", supplier.name);
                cached_outcome(snapshot, VerificationStatus::Skipped, Some(message)).into()
            },
            AdapterError::TwoFactorRequired(prompt) => {
                let request = ChallengeRequest::new(credential, supplier, TwoFactorRequestType::PriceRefresh, prompt)
                    .for_order(order_id);
                if let Err(e) = self.two_factor.open_challenge(request).await {
                    warn!("💲️ Could not open a challenge for order {order_id}: {e}");
                }
                let message = format!("{} needs a verification code. Using cached prices", supplier.name);
                cached_outcome(snapshot, VerificationStatus::Skipped, Some(message)).into()
            },
            ref e if e.is_session_failure() && !supplier.supports_password_login => {
                let message = format!("{} needs you to sign in again ({e}). Using cached prices", supplier.name);
                cached_outcome(snapshot, VerificationStatus::Skipped, Some(message)).into()
            },
            AdapterError::Timeout => Verdict {
                outcome: failed_outcome(snapshot, format!("{} did not respond in time", supplier.name)),
                timed_out: true,
            },
            e => failed_outcome(snapshot, format!("Could not check prices with {}: {e}", supplier.name)).into(),
        };
        debug!("💲️ Order {order_id}: live check failed, verification is {}", verdict.outcome.status);
        Ok(verdict)
    }

    fn compare(&self, snapshot: &OrderSnapshot, prices: &[ScrapedPrice]) -> VerificationOutcome {
        let live = prices.iter().map(|p| (p.supplier_sku.as_str(), p.current_price)).collect::<HashMap<_, _>>();
        let item_deltas = snapshot
            .items
            .iter()
            .map(|l| ItemPriceDelta {
                item_id: l.item.id,
                sku: l.product.sku.clone(),
                quantity: l.item.quantity,
                expected_price: l.item.unit_price,
                verified_price: live.get(l.product.sku.as_str()).copied().unwrap_or(l.product.current_price),
            })
            .collect::<Vec<_>>();
        let subtotal = snapshot.subtotal();
        let change = item_deltas.iter().map(|d| d.line_delta()).sum::<Money>();
        let verified_total = subtotal + change;
        let tolerance = self.ctx.config.price_tolerance_bps;
        let within = match change.basis_points_of(subtotal) {
            Some(bps) => bps <= tolerance,
            None => change.is_zero(),
        };
        let (status, message) = if within {
            (VerificationStatus::Verified, None)
        } else {
            let changed = item_deltas.iter().filter(|d| !d.line_delta().is_zero()).map(|d| d.sku.as_str()).collect::<Vec<_>>();
            let message = format!(
                "The order total changed by {change} (from {subtotal} to {verified_total}). Changed items: {}",
                name_list(&changed)
            );
            (VerificationStatus::PriceChanged, Some(message))
        };
        VerificationOutcome {
            order_id: snapshot.id(),
            status,
            verified_total: Some(verified_total),
            price_change_amount: change,
            item_deltas,
            message,
            used_cache: false,
        }
    }

    /// Persists the outcome and moves the order out of `verifying`.
    async fn finish(&self, outcome: VerificationOutcome) -> Result<VerificationOutcome, PriceVerificationError> {
        let order_id = outcome.order_id;
        if !outcome.item_deltas.is_empty() {
            let prices = outcome.item_deltas.iter().map(|d| (d.item_id, d.verified_price)).collect::<Vec<_>>();
            self.ctx.db.set_verified_prices(&order_id, &prices).await?;
        }
        let transition = match (outcome.status, outcome.verified_total) {
            (VerificationStatus::PriceChanged, Some(verified_total)) => {
                let message = outcome.message.clone().unwrap_or_default();
                let details = outcome
                    .item_deltas
                    .iter()
                    .filter(|d| d.verified_price != d.expected_price)
                    .map(|d| json!({ "item_id": d.item_id, "sku": d.sku, "expected": d.expected_price, "live": d.verified_price }))
                    .collect::<Vec<_>>();
                let row = NewOrderValidation::warning(
                    order_id,
                    ValidationType::LivePriceChange,
                    message.clone(),
                    json!({ "items": details, "price_change_amount": outcome.price_change_amount, "stage": "verification" }),
                );
                self.ctx.db.record_validations(&[row]).await?;
                OrderTransition::PriceChanged { verified_total, price_change_amount: outcome.price_change_amount, message }
            },
            (status, verified_total) => OrderTransition::Verified {
                outcome: status,
                verified_total,
                price_change_amount: outcome.price_change_amount,
                message: outcome.message.clone(),
            },
        };
        let order = self.ctx.db.transition_order(&order_id, transition).await?;
        info!("💲️ Order {order_id} verification finished: {} (order is {})", outcome.status, order.status);
        Ok(outcome)
    }

    /// Best effort: records a failed verification so the order does not stay `verifying`.
    async fn abandon(&self, order_id: &OrderId, message: String) {
        let transition = OrderTransition::Verified {
            outcome: VerificationStatus::Failed,
            verified_total: None,
            price_change_amount: Money::default(),
            message: Some(message),
        };
        match self.ctx.db.transition_order(order_id, transition).await {
            Ok(_) => {},
            Err(StoreError::InvalidTransition { from, .. }) if from != OrderStatusType::Verifying => {
                trace!("💲️ Order {order_id} already left verifying ({from})");
            },
            Err(e) => error!("💲️ Could not record the failed verification for order {order_id}: {e}"),
        }
    }

    async fn refresh_groups(&self, user_id: i64) -> Result<Vec<RefreshGroup>, PriceVerificationError> {
        let orders = self.ctx.db.fetch_open_orders_for_user(user_id).await?;
        let mut groups: Vec<RefreshGroup> = Vec::new();
        for order in orders {
            let Some(snapshot) = self.ctx.db.fetch_order_snapshot(&order.id).await? else { continue };
            let Some(credential) = snapshot.credential.filter(|c| c.is_active()) else {
                trace!("💲️ Order {} has no active credential. Not refreshing", order.id);
                continue;
            };
            let index = match groups.iter().position(|g| g.credential.id == credential.id) {
                Some(index) => index,
                None => {
                    groups.push(RefreshGroup { supplier: snapshot.supplier, credential, products: Vec::new() });
                    groups.len() - 1
                },
            };
            let group = &mut groups[index];
            for line in snapshot.items {
                if !group.products.iter().any(|p| p.id == line.product.id) {
                    group.products.push(line.product);
                }
            }
        }
        Ok(groups)
    }

    async fn refresh_branch(&self, group: RefreshGroup, deadline: Instant) -> RefreshBranch {
        let branch_deadline = deadline.min(Instant::now() + self.ctx.config.branch_budget);
        let supplier_id = group.supplier.id;
        let credential_id = group.credential.id;
        let locked_refresh = async {
            let _lock = self.ctx.locks.lock_credential(credential_id).await;
            self.refresh_group(&group).await
        };
        let result = match tokio::time::timeout_at(branch_deadline, locked_refresh).await {
            Ok(Ok(products)) => BranchResult::Refreshed { products },
            Ok(Err(reason)) => {
                warn!("💲️ Price refresh at {} failed: {reason}", group.supplier.name);
                BranchResult::Failed { reason }
            },
            Err(_) => {
                warn!("💲️ Price refresh at {} ran out of time", group.supplier.name);
                BranchResult::TimedOut
            },
        };
        RefreshBranch { supplier_id, credential_id, result }
    }

    async fn refresh_group(&self, group: &RefreshGroup) -> Result<usize, String> {
        let RefreshGroup { supplier, credential, products } = group;
        let mut adapter = match session::open_session(&self.ctx, supplier, credential).await {
            Ok(adapter) => adapter,
            Err(AdapterError::TwoFactorRequired(prompt)) => {
                let request = ChallengeRequest::new(credential, supplier, TwoFactorRequestType::PriceRefresh, prompt);
                self.two_factor.open_challenge(request).await.map_err(|e| e.to_string())?;
                return Err(format!("{} needs a verification code", supplier.name));
            },
            Err(e) => return Err(e.to_string()),
        };
        let skus = products.iter().map(|p| p.sku.clone()).collect::<Vec<_>>();
        let policy = self.ctx.config.call_policy();
        let prices = live_call!(&policy, adapter.scrape_prices(&skus)).map_err(|e| e.to_string())?;
        self.store_prices(&products.iter().collect::<Vec<_>>(), &prices).await.map_err(|e| e.to_string())
    }

    /// Writes scraped prices back to the catalog. Returns how many products were updated.
    async fn store_prices(&self, products: &[&SupplierProduct], prices: &[ScrapedPrice]) -> Result<usize, StoreError> {
        let now = Utc::now();
        let mut updated = 0;
        for price in prices {
            if let Some(product) = products.iter().find(|p| p.sku == price.supplier_sku) {
                self.ctx.db.update_product_price(product.id, price.current_price, Some(price.in_stock), now).await?;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn snapshot(&self, order_id: &OrderId) -> Result<OrderSnapshot, PriceVerificationError> {
        self.ctx.db.fetch_order_snapshot(order_id).await?.ok_or(PriceVerificationError::OrderNotFound(*order_id))
    }
}

/// An outcome computed from the catalog's cached prices.
fn cached_outcome(snapshot: &OrderSnapshot, status: VerificationStatus, message: Option<String>) -> VerificationOutcome {
    let item_deltas = snapshot
        .items
        .iter()
        .map(|l| ItemPriceDelta {
            item_id: l.item.id,
            sku: l.product.sku.clone(),
            quantity: l.item.quantity,
            expected_price: l.item.unit_price,
            verified_price: l.product.current_price,
        })
        .collect::<Vec<_>>();
    let change = item_deltas.iter().map(|d| d.line_delta()).sum::<Money>();
    VerificationOutcome {
        order_id: snapshot.id(),
        status,
        verified_total: Some(snapshot.subtotal() + change),
        price_change_amount: change,
        item_deltas,
        message,
        used_cache: true,
    }
}

fn failed_outcome(snapshot: &OrderSnapshot, message: String) -> VerificationOutcome {
    VerificationOutcome {
        order_id: snapshot.id(),
        status: VerificationStatus::Failed,
        verified_total: None,
        price_change_amount: Money::default(),
        item_deltas: Vec::new(),
        message: Some(message),
        used_cache: false,
    }
}
