use serde::{Deserialize, Serialize};
use serde_json::Value;
use sog_common::Money;

use crate::{
    adapters::{AdapterError, TwoFactorPrompt, UnavailableItem},
    db_types::{Order, OrderId, OrderStatusType, ValidationType, VerificationStatus},
};

//--------------------------------------   PlacementOptions    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementOptions {
    /// Proceed despite validation warnings. Errors still block.
    #[serde(default)]
    pub skip_warnings: bool,
    /// Accept live price changes found during preflight or checkout.
    #[serde(default)]
    pub accept_price_changes: bool,
}

impl PlacementOptions {
    /// The options used when placement is re-run after the user answered a login challenge. The user already saw the
    /// validation warnings for this order, but any price change still needs their approval.
    pub fn resumed() -> Self {
        Self { skip_warnings: true, accept_price_changes: false }
    }
}

//--------------------------------------   ValidationReport    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub validation_type: ValidationType,
    pub message: String,
    pub details: Value,
}

/// The outcome of one validation run. Every issue in here has also been written to the validation log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    /// Items dropped from the order because they are out of stock.
    pub removed_items: Vec<i64>,
}

impl ValidationReport {
    pub fn is_blocking(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn has(&self, validation_type: ValidationType) -> bool {
        self.errors.iter().chain(self.warnings.iter()).any(|i| i.validation_type == validation_type)
    }

    pub fn error_summary(&self) -> String {
        summarise(&self.errors)
    }

    pub fn warning_summary(&self) -> String {
        summarise(&self.warnings)
    }
}

fn summarise(issues: &[ValidationIssue]) -> String {
    issues.iter().map(|i| i.message.as_str()).collect::<Vec<_>>().join("; ")
}

//--------------------------------------    PreflightReport    ---------------------------------------------------------
/// A live price that differs from the price on the order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LivePriceChange {
    pub item_id: i64,
    pub sku: String,
    pub expected: Money,
    pub live: Money,
}

impl LivePriceChange {
    pub fn delta(&self) -> Money {
        self.live - self.expected
    }
}

/// The hard failure that stopped a preflight run.
#[derive(Debug, Clone)]
pub enum PreflightFailure {
    CredentialUnavailable(String),
    AccountOnHold(String),
    /// The handshake needs a code from the user.
    TwoFactorRequired(TwoFactorPrompt),
    /// The handshake failed for another reason.
    SessionFailed(AdapterError),
    ItemsUnavailable(Vec<UnavailableItem>),
    OrderMinimum { minimum: Money, current_total: Money },
    DeliveryUnavailable(String),
    /// Live prices differ and the caller did not accept the changes.
    UnresolvedPriceChanges(Vec<LivePriceChange>),
}

impl PreflightFailure {
    pub fn message(&self) -> String {
        match self {
            Self::CredentialUnavailable(m) | Self::DeliveryUnavailable(m) => m.clone(),
            Self::AccountOnHold(m) => format!("Supplier account is on hold: {m}"),
            Self::TwoFactorRequired(p) => p.prompt_message.clone(),
            Self::SessionFailed(e) => e.to_string(),
            Self::ItemsUnavailable(items) => AdapterError::ItemUnavailable(items.clone()).to_string(),
            Self::OrderMinimum { minimum, current_total } => {
                AdapterError::OrderMinimum { minimum: *minimum, current_total: *current_total }.to_string()
            },
            Self::UnresolvedPriceChanges(changes) => describe_price_changes(changes),
        }
    }
}

pub fn describe_price_changes(changes: &[LivePriceChange]) -> String {
    let lines =
        changes.iter().map(|c| format!("{} ({} -> {})", c.sku, c.expected, c.live)).collect::<Vec<_>>().join(", ");
    format!("Prices changed at the supplier: {lines}")
}

#[derive(Debug, Clone, Default)]
pub struct PreflightReport {
    pub failure: Option<PreflightFailure>,
    pub price_changes: Vec<LivePriceChange>,
    /// Checks the adapter could not perform.
    pub skipped_checks: Vec<&'static str>,
}

impl PreflightReport {
    pub fn proceed(&self) -> bool {
        self.failure.is_none()
    }
}

//--------------------------------------   PlacementOutcome    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlacementOutcome {
    Submitted { confirmation_number: String, total: Money },
    Failed { reason: String },
    PendingReview { reason: String },
    PendingManual { reason: String, session_token: Option<String> },
    /// Another placement attempt already holds the order.
    InFlight,
}

impl PlacementOutcome {
    pub fn status(&self) -> OrderStatusType {
        match self {
            Self::Submitted { .. } => OrderStatusType::Submitted,
            Self::Failed { .. } => OrderStatusType::Failed,
            Self::PendingReview { .. } => OrderStatusType::PendingReview,
            Self::PendingManual { .. } => OrderStatusType::PendingManual,
            Self::InFlight => OrderStatusType::Processing,
        }
    }
}

//--------------------------------------  VerificationOutcome  ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemPriceDelta {
    pub item_id: i64,
    pub sku: String,
    pub quantity: i64,
    pub expected_price: Money,
    pub verified_price: Money,
}

impl ItemPriceDelta {
    /// The change in the line total.
    pub fn line_delta(&self) -> Money {
        (self.verified_price - self.expected_price) * self.quantity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationOutcome {
    pub order_id: OrderId,
    pub status: VerificationStatus,
    pub verified_total: Option<Money>,
    pub price_change_amount: Money,
    pub item_deltas: Vec<ItemPriceDelta>,
    pub message: Option<String>,
    /// The outcome is based on cached prices rather than a live check.
    pub used_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum BranchResult {
    Refreshed { products: usize },
    Failed { reason: String },
    TimedOut,
}

/// One supplier session in a quick refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshBranch {
    pub supplier_id: i64,
    pub credential_id: i64,
    pub result: BranchResult,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuickRefreshReport {
    pub branches: Vec<RefreshBranch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchEntry {
    pub order_id: OrderId,
    pub outcome: Option<VerificationOutcome>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchVerificationReport {
    pub batch_id: String,
    pub entries: Vec<BatchEntry>,
}

//--------------------------------------   OrderStatusView     ---------------------------------------------------------
/// What a client polling an order's progress sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusView {
    pub order_id: OrderId,
    pub processing: bool,
    pub status: OrderStatusType,
    pub verification_status: VerificationStatus,
    pub confirmation_number: Option<String>,
    pub total_amount: Money,
    pub error_message: Option<String>,
}

impl From<&Order> for OrderStatusView {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            processing: matches!(order.status, OrderStatusType::Processing | OrderStatusType::Verifying),
            status: order.status,
            verification_status: order.verification_status,
            confirmation_number: order.confirmation_number.clone(),
            total_amount: order.total_amount,
            error_message: order.error_message.clone(),
        }
    }
}

/// The result of answering a two-factor challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CodeOutcome {
    Verified,
    /// The code was not accepted but the user may try again.
    Rejected { attempts_remaining: i64, reason: String },
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn report_summaries() {
        let report = ValidationReport {
            errors: vec![ValidationIssue {
                validation_type: ValidationType::OrderMinimum,
                message: "Below minimum".into(),
                details: json!({}),
            }],
            warnings: vec![
                ValidationIssue { validation_type: ValidationType::PriceDrift, message: "Drift".into(), details: json!({}) },
                ValidationIssue {
                    validation_type: ValidationType::ItemsRemoved,
                    message: "Removed".into(),
                    details: json!({}),
                },
            ],
            removed_items: vec![],
        };
        assert!(report.is_blocking());
        assert!(report.has(ValidationType::ItemsRemoved));
        assert!(!report.has(ValidationType::CutoffPassed));
        assert_eq!(report.warning_summary(), "Drift; Removed");
    }

    #[test]
    fn line_deltas_scale_with_quantity() {
        let delta = ItemPriceDelta {
            item_id: 1,
            sku: "A".into(),
            quantity: 3,
            expected_price: Money::from_cents(1_000),
            verified_price: Money::from_cents(1_050),
        };
        assert_eq!(delta.line_delta(), Money::from_cents(150));
    }

    #[test]
    fn options_default_to_strict() {
        let options: PlacementOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, PlacementOptions::default());
        assert!(!options.skip_warnings);
    }
}
