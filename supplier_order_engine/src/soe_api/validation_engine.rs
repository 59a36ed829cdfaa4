//! # Validation engine
//!
//! Runs the static, database-only checks on an order in a fixed order. Each rule yields errors (which block
//! placement) or warnings (which need the user's acknowledgement). Every issue is appended to the validation log.
//!
//! Out-of-stock items are dropped from a partially available order before the later rules run, so the minimum and
//! quantity checks see the order that would actually be placed.
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use log::*;
use serde_json::json;

use crate::{
    config::EngineConfig,
    db_types::{CredentialStatus, NewOrderValidation, OrderId, OrderSnapshot, ValidationType},
    helpers::name_list,
    soe_api::{
        errors::ValidationError,
        order_objects::{ValidationIssue, ValidationReport},
    },
    traits::{CatalogManagement, OrderManagement, ValidationLog},
};

pub struct ValidationEngine<B> {
    db: B,
    config: EngineConfig,
}

impl<B> ValidationEngine<B> {
    pub fn new(db: B, config: EngineConfig) -> Self {
        Self { db, config }
    }
}

struct Findings {
    order_id: OrderId,
    rows: Vec<NewOrderValidation>,
}

impl Findings {
    fn error<S: Into<String>>(&mut self, validation_type: ValidationType, message: S, details: serde_json::Value) {
        self.rows.push(NewOrderValidation::error(self.order_id, validation_type, message, details));
    }

    fn warning<S: Into<String>>(&mut self, validation_type: ValidationType, message: S, details: serde_json::Value) {
        self.rows.push(NewOrderValidation::warning(self.order_id, validation_type, message, details));
    }

    fn into_report(self, removed_items: Vec<i64>) -> (ValidationReport, Vec<NewOrderValidation>) {
        let mut report = ValidationReport { removed_items, ..Default::default() };
        for row in &self.rows {
            let issue = ValidationIssue {
                validation_type: row.validation_type,
                message: row.message.clone(),
                details: row.details.clone(),
            };
            if row.passed {
                report.warnings.push(issue);
            } else {
                report.errors.push(issue);
            }
        }
        (report, self.rows)
    }
}

impl<B> ValidationEngine<B>
where B: OrderManagement + ValidationLog + CatalogManagement
{
    /// Validates the order as of `now` and logs the findings. Returns the report together with the order as it stands
    /// afterwards (unavailable items may have been removed).
    pub async fn validate(
        &self,
        order_id: &OrderId,
        now: DateTime<Utc>,
    ) -> Result<(ValidationReport, OrderSnapshot), ValidationError> {
        let mut snapshot =
            self.db.fetch_order_snapshot(order_id).await?.ok_or(ValidationError::OrderNotFound(*order_id))?;
        let mut findings = Findings { order_id: *order_id, rows: Vec::new() };

        let (removed, all_unavailable) = check_availability(&snapshot, &mut findings);
        if !removed.is_empty() {
            self.db.prune_order_items(order_id, &removed).await?;
            snapshot =
                self.db.fetch_order_snapshot(order_id).await?.ok_or(ValidationError::OrderNotFound(*order_id))?;
        }
        if !all_unavailable {
            check_minimum(&snapshot, &mut findings);
        }
        check_quantities(&snapshot, &mut findings);
        check_delivery_schedule(&snapshot, &mut findings);
        self.check_cutoff(&snapshot, now, &mut findings);
        check_account(&snapshot, &mut findings);
        check_price_drift(&snapshot, &mut findings);

        let (report, rows) = findings.into_report(removed);
        if !rows.is_empty() {
            self.db.record_validations(&rows).await?;
        }
        debug!(
            "🔍️ Order {order_id} validated: {} errors, {} warnings, {} items removed",
            report.errors.len(),
            report.warnings.len(),
            report.removed_items.len()
        );
        Ok((report, snapshot))
    }

    /// Like [`Self::validate`], but a report with errors is returned as [`ValidationError::Blocked`].
    pub async fn validate_blocking(
        &self,
        order_id: &OrderId,
        now: DateTime<Utc>,
    ) -> Result<(ValidationReport, OrderSnapshot), ValidationError> {
        let (report, snapshot) = self.validate(order_id, now).await?;
        if report.is_blocking() {
            return Err(ValidationError::Blocked { order_id: *order_id, report });
        }
        Ok((report, snapshot))
    }

    /// The cutoff for a delivery date is `order_lead_days` before it, at the supplier's cutoff time.
    fn check_cutoff(&self, snapshot: &OrderSnapshot, now: DateTime<Utc>, findings: &mut Findings) {
        let (Some(delivery), Some(cutoff_time)) = (snapshot.order.delivery_date, snapshot.supplier.cutoff_time) else {
            return;
        };
        let cutoff_day = delivery - Duration::days(snapshot.supplier.order_lead_days);
        let cutoff = Utc.from_utc_datetime(&cutoff_day.and_time(cutoff_time));
        let details = json!({ "delivery_date": delivery, "cutoff": cutoff });
        if now > cutoff {
            findings.error(
                ValidationType::CutoffPassed,
                format!("The order cutoff for delivery on {delivery} passed at {}", cutoff.format("%Y-%m-%d %H:%M UTC")),
                details,
            );
        } else if cutoff - now <= self.config.cutoff_warning_lead {
            let minutes = (cutoff - now).num_minutes();
            findings.warning(
                ValidationType::CutoffApproaching,
                format!("Only {minutes} minutes left before the cutoff for delivery on {delivery}"),
                details,
            );
        }
    }
}

/// Returns the ids of the items to drop, and whether the whole order is unavailable.
fn check_availability(snapshot: &OrderSnapshot, findings: &mut Findings) -> (Vec<i64>, bool) {
    let unavailable = snapshot.items.iter().filter(|l| !l.product.in_stock).collect::<Vec<_>>();
    if unavailable.is_empty() {
        return (vec![], false);
    }
    if unavailable.len() == snapshot.items.len() {
        for line in unavailable {
            findings.error(
                ValidationType::ItemsUnavailable,
                format!("{} is out of stock", line.product.name),
                json!({ "item_id": line.item.id, "sku": line.product.sku }),
            );
        }
        return (vec![], true);
    }
    let skus = unavailable.iter().map(|l| l.product.sku.as_str()).collect::<Vec<_>>();
    let ids = unavailable.iter().map(|l| l.item.id).collect::<Vec<_>>();
    findings.warning(
        ValidationType::ItemsRemoved,
        format!("Removed out of stock items: {}", name_list(&skus)),
        json!({ "item_ids": ids, "skus": skus }),
    );
    (ids, false)
}

fn check_minimum(snapshot: &OrderSnapshot, findings: &mut Findings) {
    let minimum = snapshot.supplier.order_minimum;
    let subtotal = snapshot.subtotal();
    if subtotal < minimum {
        let difference = minimum - subtotal;
        findings.error(
            ValidationType::OrderMinimum,
            format!("{} requires a minimum order of {minimum}. Add {difference} more", snapshot.supplier.name),
            json!({
                "minimum": minimum.to_decimal_string(),
                "subtotal": subtotal.to_decimal_string(),
                "difference": difference.to_decimal_string(),
            }),
        );
    }
}

fn check_quantities(snapshot: &OrderSnapshot, findings: &mut Findings) {
    for line in &snapshot.items {
        let quantity = line.item.quantity;
        let details = json!({ "item_id": line.item.id, "sku": line.product.sku, "quantity": quantity });
        if let Some(min) = line.product.min_quantity.filter(|min| quantity < *min) {
            findings.error(
                ValidationType::QuantityBelowMinimum,
                format!("{} must be ordered in quantities of at least {min}", line.product.name),
                details,
            );
        } else if let Some(max) = line.product.max_quantity.filter(|max| quantity > *max) {
            findings.error(
                ValidationType::QuantityAboveMaximum,
                format!("{} can be ordered in quantities of at most {max}", line.product.name),
                details,
            );
        }
    }
}

fn check_delivery_schedule(snapshot: &OrderSnapshot, findings: &mut Findings) {
    let days = &snapshot.supplier.delivery_days;
    if days.is_empty() {
        findings.warning(
            ValidationType::NoDeliverySchedule,
            format!("{} has no delivery schedule on file", snapshot.supplier.name),
            json!({}),
        );
        return;
    }
    if let Some(date) = snapshot.order.delivery_date.filter(|d| !days.contains(d.weekday())) {
        findings.warning(
            ValidationType::NoDeliverySchedule,
            format!("{} does not normally deliver on {}", snapshot.supplier.name, date.format("%A")),
            json!({ "delivery_date": date, "delivery_days": days.to_string() }),
        );
    }
}

fn check_account(snapshot: &OrderSnapshot, findings: &mut Findings) {
    let supplier = &snapshot.supplier.name;
    match &snapshot.credential {
        None => findings.error(
            ValidationType::CredentialMissing,
            format!("No {supplier} account is linked. Connect your account first"),
            json!({}),
        ),
        Some(c) if c.status == CredentialStatus::OnHold => findings.error(
            ValidationType::AccountOnHold,
            format!("Your {supplier} account is on hold"),
            json!({ "credential_id": c.id }),
        ),
        Some(c) if !c.is_active() => findings.error(
            ValidationType::CredentialInactive,
            format!("Your {supplier} account connection is {}. Reconnect it first", c.status),
            json!({ "credential_id": c.id }),
        ),
        Some(_) => {},
    }
}

fn check_price_drift(snapshot: &OrderSnapshot, findings: &mut Findings) {
    let drifted = snapshot.items.iter().filter(|l| l.product.current_price != l.item.unit_price).collect::<Vec<_>>();
    if drifted.is_empty() {
        return;
    }
    let details = drifted
        .iter()
        .map(|l| {
            json!({
                "item_id": l.item.id,
                "sku": l.product.sku,
                "unit_price": l.item.unit_price,
                "current_price": l.product.current_price,
            })
        })
        .collect::<Vec<_>>();
    let skus = drifted.iter().map(|l| l.product.sku.as_str()).collect::<Vec<_>>();
    findings.warning(
        ValidationType::PriceDrift,
        format!("Catalog prices have changed since these items were added: {}", name_list(&skus)),
        json!({ "items": details }),
    );
}
