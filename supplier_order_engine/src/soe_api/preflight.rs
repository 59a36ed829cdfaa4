//! # Pre-flight verifier
//!
//! Live checks against the supplier immediately before checkout: credential, session handshake, stock, prices, the
//! supplier's own minimum and delivery availability. Hard failures stop the run at once. Price changes are collected
//! and only decide the outcome at the end. Any capability the adapter does not implement is skipped.
use chrono::Utc;
use log::*;
use serde_json::json;
use sog_common::Money;

use crate::{
    adapters::{AdapterError, CallPolicy, SupplierAdapter, UnavailableItem},
    db_types::{CredentialStatus, NewOrderValidation, OrderSnapshot, ValidationType},
    live_call,
    soe_api::{
        order_objects::{describe_price_changes, LivePriceChange, PlacementOptions, PreflightFailure, PreflightReport},
        session,
        EngineContext,
    },
    traits::{CatalogManagement, ChallengeManagement, OrderManagement, StoreError, ValidationLog},
};

/// The result of a pre-flight run. When the run may proceed, the live session is handed on for checkout.
pub struct PreflightRun {
    pub report: PreflightReport,
    pub adapter: Option<Box<dyn SupplierAdapter>>,
}

impl PreflightRun {
    fn failed(mut report: PreflightReport, failure: PreflightFailure) -> Self {
        report.failure = Some(failure);
        Self { report, adapter: None }
    }
}

pub struct PreflightVerifier<B> {
    ctx: EngineContext<B>,
}

impl<B> PreflightVerifier<B> {
    pub fn new(ctx: EngineContext<B>) -> Self {
        Self { ctx }
    }
}

enum Check<T> {
    Done(T),
    Skipped,
    Failed(PreflightFailure),
}

impl<B> PreflightVerifier<B>
where B: OrderManagement + CatalogManagement + ChallengeManagement + ValidationLog
{
    pub async fn run(&self, snapshot: &OrderSnapshot, options: &PlacementOptions) -> Result<PreflightRun, StoreError> {
        let mut report = PreflightReport::default();
        let order_id = snapshot.id();
        let supplier = &snapshot.supplier;
        let credential = match &snapshot.credential {
            None => {
                let msg = format!("No {} account is linked", supplier.name);
                return Ok(PreflightRun::failed(report, PreflightFailure::CredentialUnavailable(msg)));
            },
            Some(c) if c.status == CredentialStatus::OnHold => {
                let msg = format!("{} has put your account on hold", supplier.name);
                return Ok(PreflightRun::failed(report, PreflightFailure::AccountOnHold(msg)));
            },
            Some(c) if !c.is_active() => {
                let msg = format!("Your {} account connection is {}", supplier.name, c.status);
                return Ok(PreflightRun::failed(report, PreflightFailure::CredentialUnavailable(msg)));
            },
            Some(c) => c,
        };

        let mut adapter = match session::open_session(&self.ctx, supplier, credential).await {
            Ok(adapter) => adapter,
            Err(AdapterError::TwoFactorRequired(prompt)) => {
                return Ok(PreflightRun::failed(report, PreflightFailure::TwoFactorRequired(prompt)));
            },
            Err(e) => return Ok(PreflightRun::failed(report, PreflightFailure::SessionFailed(e))),
        };
        let policy = self.ctx.config.call_policy();

        match self.check_stock(snapshot, adapter.as_mut(), &policy).await? {
            Check::Failed(f) => return Ok(PreflightRun::failed(report, f)),
            Check::Skipped => report.skipped_checks.push("check_stock"),
            Check::Done(()) => {},
        }

        match self.check_prices(snapshot, adapter.as_mut(), &policy).await? {
            Check::Failed(f) => return Ok(PreflightRun::failed(report, f)),
            Check::Skipped => report.skipped_checks.push("get_product_info"),
            Check::Done(changes) => report.price_changes = changes,
        }

        let mut subtotal = snapshot.subtotal();
        if options.accept_price_changes {
            subtotal += report.price_changes.iter().map(|c| c.delta() * quantity_of(snapshot, c.item_id)).sum::<Money>();
        }
        match live_call!(&policy, adapter.get_order_minimum()) {
            Ok(minimum) if subtotal < minimum => {
                let failure = PreflightFailure::OrderMinimum { minimum, current_total: subtotal };
                return Ok(PreflightRun::failed(report, failure));
            },
            Ok(_) => {},
            Err(AdapterError::TwoFactorRequired(p)) => {
                return Ok(PreflightRun::failed(report, PreflightFailure::TwoFactorRequired(p)));
            },
            Err(e) => {
                skip_notice("get_order_minimum", &e);
                report.skipped_checks.push("get_order_minimum");
            },
        }

        if let Some(date) = snapshot.order.delivery_date {
            match live_call!(&policy, adapter.get_delivery_availability(date)) {
                Ok(availability) if !availability.available => {
                    let msg = availability
                        .message
                        .unwrap_or_else(|| format!("{} cannot deliver on {date}", supplier.name));
                    return Ok(PreflightRun::failed(report, PreflightFailure::DeliveryUnavailable(msg)));
                },
                Ok(_) => {},
                Err(AdapterError::TwoFactorRequired(p)) => {
                    return Ok(PreflightRun::failed(report, PreflightFailure::TwoFactorRequired(p)));
                },
                Err(e) => {
                    skip_notice("get_delivery_availability", &e);
                    report.skipped_checks.push("get_delivery_availability");
                },
            }
        }

        if !report.price_changes.is_empty() {
            let details = report
                .price_changes
                .iter()
                .map(|c| json!({ "item_id": c.item_id, "sku": c.sku, "expected": c.expected, "live": c.live }))
                .collect::<Vec<_>>();
            let row = NewOrderValidation::warning(
                order_id,
                ValidationType::LivePriceChange,
                describe_price_changes(&report.price_changes),
                json!({ "items": details, "accepted": options.accept_price_changes }),
            );
            self.ctx.db.record_validations(&[row]).await?;
            if !options.accept_price_changes {
                let failure = PreflightFailure::UnresolvedPriceChanges(report.price_changes.clone());
                return Ok(PreflightRun::failed(report, failure));
            }
            let prices = report.price_changes.iter().map(|c| (c.item_id, c.live)).collect::<Vec<_>>();
            let order = self.ctx.db.reprice_order_items(&order_id, &prices).await?;
            info!("🛫️ Order {order_id}: accepted {} live price changes. New subtotal {}", prices.len(), order.subtotal);
        }
        debug!("🛫️ Order {order_id} passed preflight. Skipped checks: {:?}", report.skipped_checks);
        Ok(PreflightRun { report, adapter: Some(adapter) })
    }

    async fn check_stock(
        &self,
        snapshot: &OrderSnapshot,
        adapter: &mut dyn SupplierAdapter,
        policy: &CallPolicy,
    ) -> Result<Check<()>, StoreError> {
        let mut unavailable = Vec::new();
        for line in &snapshot.items {
            match live_call!(policy, adapter.check_stock(&line.product.sku)) {
                Ok(level) => {
                    let short = level.available_quantity.is_some_and(|n| n < line.item.quantity);
                    if !level.in_stock || short {
                        unavailable.push(UnavailableItem {
                            sku: line.product.sku.clone(),
                            requested: Some(line.item.quantity),
                            available: level.available_quantity,
                        });
                    }
                    if !level.in_stock {
                        self.ctx.db.update_product_stock(line.product.id, false).await?;
                    }
                },
                Err(AdapterError::TwoFactorRequired(p)) => return Ok(Check::Failed(PreflightFailure::TwoFactorRequired(p))),
                Err(e) => {
                    skip_notice("check_stock", &e);
                    return Ok(Check::Skipped);
                },
            }
        }
        if unavailable.is_empty() {
            Ok(Check::Done(()))
        } else {
            Ok(Check::Failed(PreflightFailure::ItemsUnavailable(unavailable)))
        }
    }

    async fn check_prices(
        &self,
        snapshot: &OrderSnapshot,
        adapter: &mut dyn SupplierAdapter,
        policy: &CallPolicy,
    ) -> Result<Check<Vec<LivePriceChange>>, StoreError> {
        let mut changes = Vec::new();
        for line in &snapshot.items {
            match live_call!(policy, adapter.get_product_info(&line.product.sku)) {
                Ok(info) => {
                    self.ctx.db.update_product_price(line.product.id, info.price, Some(info.in_stock), Utc::now()).await?;
                    if info.price != line.item.unit_price {
                        changes.push(LivePriceChange {
                            item_id: line.item.id,
                            sku: line.product.sku.clone(),
                            expected: line.item.unit_price,
                            live: info.price,
                        });
                    }
                },
                Err(AdapterError::TwoFactorRequired(p)) => return Ok(Check::Failed(PreflightFailure::TwoFactorRequired(p))),
                Err(e) => {
                    skip_notice("get_product_info", &e);
                    return Ok(Check::Skipped);
                },
            }
        }
        Ok(Check::Done(changes))
    }
}

fn quantity_of(snapshot: &OrderSnapshot, item_id: i64) -> i64 {
    snapshot.items.iter().find(|l| l.item.id == item_id).map(|l| l.item.quantity).unwrap_or_default()
}

fn skip_notice(check: &str, e: &AdapterError) {
    if e.is_not_implemented() {
        trace!("🛫️ Adapter does not support {check}. Skipping");
    } else {
        warn!("🛫️ {check} failed ({e}). Skipping the check");
    }
}
