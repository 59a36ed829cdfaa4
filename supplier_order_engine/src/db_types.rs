use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sog_common::Money;
pub use sqlx::types::Json;
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

/// Implements `Display` and `FromStr` for a fieldless enum using the same snake_case labels that sqlx and serde use.
macro_rules! labelled_enum {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $label)),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok(Self::$variant)),+,
                    s => Err(ConversionError(format!("Invalid {}: {s}", stringify!($name)))),
                }
            }
        }
    };
}

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl From<i64> for OrderId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('#');
        s.parse::<i64>().map(Self).map_err(|e| ConversionError(format!("Invalid order id {s}: {e}")))
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// Newly built, or returned to the user after a verification pass. Totals are a working estimate.
    Pending,
    /// A placement job has claimed the order. Acts as the advisory lock against double submission.
    Processing,
    /// Accepted by the supplier. A confirmation number is always present.
    Submitted,
    /// The supplier confirmed the order out of band.
    Confirmed,
    Failed,
    /// Warnings or unresolved price changes need the user's attention before placement continues.
    PendingReview,
    /// A human must finish the order (CAPTCHA) or enter a two-factor code.
    PendingManual,
    /// The price verification stage is running.
    Verifying,
    PriceChanged,
    Cancelled,
}

labelled_enum!(OrderStatusType {
    Pending => "pending",
    Processing => "processing",
    Submitted => "submitted",
    Confirmed => "confirmed",
    Failed => "failed",
    PendingReview => "pending_review",
    PendingManual => "pending_manual",
    Verifying => "verifying",
    PriceChanged => "price_changed",
    Cancelled => "cancelled",
});

impl OrderStatusType {
    /// `total_amount` is only authoritative once the supplier has accepted the order.
    pub fn total_is_authoritative(&self) -> bool {
        matches!(self, Self::Submitted | Self::Confirmed)
    }

    /// Items may be added, removed or re-quantified only while the order is at rest and unsubmitted.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Pending | Self::PendingReview | Self::PriceChanged | Self::Failed)
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Submitted | Self::Confirmed | Self::Cancelled)
    }
}

//--------------------------------------  VerificationStatus   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Unverified,
    Verified,
    PriceChanged,
    /// Live verification could not complete. The order is held until the user retries or skips.
    Failed,
    /// Live verification was not possible, but cached prices were accepted.
    Skipped,
}

labelled_enum!(VerificationStatus {
    Unverified => "unverified",
    Verified => "verified",
    PriceChanged => "price_changed",
    Failed => "failed",
    Skipped => "skipped",
});

//--------------------------------------      ItemStatus       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Added,
    Failed,
}

labelled_enum!(ItemStatus {
    Pending => "pending",
    Added => "added",
    Failed => "failed",
});

//--------------------------------------        Order       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: i64,
    pub organization_id: Option<i64>,
    pub supplier_id: i64,
    pub list_id: Option<i64>,
    /// Groups orders created together for one multi-supplier checkout.
    pub batch_id: Option<String>,
    pub subtotal: Money,
    pub tax: Money,
    pub total_amount: Money,
    pub savings: Money,
    pub verified_total: Option<Money>,
    pub price_change_amount: Option<Money>,
    pub status: OrderStatusType,
    pub verification_status: VerificationStatus,
    pub verification_message: Option<String>,
    pub confirmation_number: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    pub user_id: i64,
    pub organization_id: Option<i64>,
    pub supplier_id: i64,
    pub list_id: Option<i64>,
    pub batch_id: Option<String>,
    pub tax: Money,
    pub savings: Money,
    pub delivery_date: Option<NaiveDate>,
}

impl NewOrder {
    pub fn new(user_id: i64, supplier_id: i64) -> Self {
        Self { user_id, supplier_id, ..Default::default() }
    }

    pub fn with_organization(mut self, organization_id: i64) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    pub fn with_list(mut self, list_id: i64) -> Self {
        self.list_id = Some(list_id);
        self
    }

    pub fn with_batch<S: Into<String>>(mut self, batch_id: S) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    pub fn with_tax(mut self, tax: Money) -> Self {
        self.tax = tax;
        self
    }

    pub fn with_savings(mut self, savings: Money) -> Self {
        self.savings = savings;
        self
    }

    pub fn with_delivery_date(mut self, date: NaiveDate) -> Self {
        self.delivery_date = Some(date);
        self
    }
}

//--------------------------------------      OrderItem        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub supplier_product_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
    /// Always `unit_price * quantity`. Maintained by the order mutations in the database layer.
    pub line_total: Money,
    /// Only ever set by the price verification stage.
    pub verified_price: Option<Money>,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub supplier_product_id: i64,
    pub quantity: i64,
    /// The unit price at the time the item was added. When `None`, the product's cached price is used.
    pub unit_price: Option<Money>,
}

impl NewOrderItem {
    pub fn new(supplier_product_id: i64, quantity: i64) -> Self {
        Self { supplier_product_id, quantity, unit_price: None }
    }

    pub fn at_price(mut self, price: Money) -> Self {
        self.unit_price = Some(price);
        self
    }
}

//--------------------------------------    ValidationType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ValidationType {
    ItemsUnavailable,
    ItemsRemoved,
    OrderMinimum,
    QuantityBelowMinimum,
    QuantityAboveMaximum,
    NoDeliverySchedule,
    CutoffPassed,
    CutoffApproaching,
    CredentialMissing,
    CredentialInactive,
    AccountOnHold,
    PriceDrift,
    LivePriceChange,
}

labelled_enum!(ValidationType {
    ItemsUnavailable => "items_unavailable",
    ItemsRemoved => "items_removed",
    OrderMinimum => "order_minimum",
    QuantityBelowMinimum => "quantity_below_minimum",
    QuantityAboveMaximum => "quantity_above_maximum",
    NoDeliverySchedule => "no_delivery_schedule",
    CutoffPassed => "cutoff_passed",
    CutoffApproaching => "cutoff_approaching",
    CredentialMissing => "credential_missing",
    CredentialInactive => "credential_inactive",
    AccountOnHold => "account_on_hold",
    PriceDrift => "price_drift",
    LivePriceChange => "live_price_change",
});

//--------------------------------------   OrderValidation     ---------------------------------------------------------
/// One append-only audit row for a validation error or warning raised against an order.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct OrderValidation {
    pub id: i64,
    pub order_id: OrderId,
    pub validation_type: ValidationType,
    pub passed: bool,
    pub message: String,
    pub details: Json<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderValidation {
    pub order_id: OrderId,
    pub validation_type: ValidationType,
    /// `true` for warnings (the order may still proceed), `false` for blocking errors.
    pub passed: bool,
    pub message: String,
    pub details: Value,
}

impl NewOrderValidation {
    pub fn error<S: Into<String>>(order_id: OrderId, validation_type: ValidationType, message: S, details: Value) -> Self {
        Self { order_id, validation_type, passed: false, message: message.into(), details }
    }

    pub fn warning<S: Into<String>>(
        order_id: OrderId,
        validation_type: ValidationType,
        message: S,
        details: Value,
    ) -> Self {
        Self { order_id, validation_type, passed: true, message: message.into(), details }
    }
}

//--------------------------------------     DeliveryDays      ---------------------------------------------------------
/// The weekdays a supplier delivers on. Stored as a comma separated list, e.g. `mon,wed,fri`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryDays(pub Vec<Weekday>);

impl DeliveryDays {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0.contains(&day)
    }
}

impl TryFrom<String> for DeliveryDays {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<Weekday>().map_err(|_| ConversionError(format!("Invalid delivery day: {s}"))))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl Display for DeliveryDays {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let days = self.0.iter().map(|d| d.to_string().to_lowercase()).collect::<Vec<_>>();
        write!(f, "{}", days.join(","))
    }
}

//--------------------------------------       Supplier        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Supplier {
    pub id: i64,
    pub name: String,
    pub website_url: String,
    pub order_minimum: Money,
    /// Daily order cutoff, in UTC.
    pub cutoff_time: Option<NaiveTime>,
    /// How many days before delivery the cutoff falls.
    pub order_lead_days: i64,
    #[sqlx(try_from = "String")]
    pub delivery_days: DeliveryDays,
    /// `false` for suppliers whose login always demands a human-entered challenge code.
    pub supports_password_login: bool,
}

#[derive(Debug, Clone)]
pub struct NewSupplier {
    pub name: String,
    pub website_url: String,
    pub order_minimum: Money,
    pub cutoff_time: Option<NaiveTime>,
    pub order_lead_days: i64,
    pub delivery_days: DeliveryDays,
    pub supports_password_login: bool,
}

impl NewSupplier {
    pub fn new<S: Into<String>>(name: S, website_url: S) -> Self {
        Self {
            name: name.into(),
            website_url: website_url.into(),
            order_minimum: Money::default(),
            cutoff_time: None,
            order_lead_days: 1,
            delivery_days: DeliveryDays::default(),
            supports_password_login: true,
        }
    }

    pub fn with_minimum(mut self, minimum: Money) -> Self {
        self.order_minimum = minimum;
        self
    }

    pub fn with_cutoff(mut self, cutoff: NaiveTime, lead_days: i64) -> Self {
        self.cutoff_time = Some(cutoff);
        self.order_lead_days = lead_days;
        self
    }

    pub fn with_delivery_days(mut self, days: &[Weekday]) -> Self {
        self.delivery_days = DeliveryDays(days.to_vec());
        self
    }

    pub fn challenge_only(mut self) -> Self {
        self.supports_password_login = false;
        self
    }
}

//--------------------------------------   SupplierProduct     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SupplierProduct {
    pub id: i64,
    pub supplier_id: i64,
    pub sku: String,
    pub name: String,
    /// The last price seen on the supplier's site.
    pub current_price: Money,
    pub in_stock: bool,
    pub min_quantity: Option<i64>,
    pub max_quantity: Option<i64>,
    pub price_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSupplierProduct {
    pub supplier_id: i64,
    pub sku: String,
    pub name: String,
    pub current_price: Money,
    pub in_stock: bool,
    pub min_quantity: Option<i64>,
    pub max_quantity: Option<i64>,
    pub price_updated_at: DateTime<Utc>,
}

impl NewSupplierProduct {
    pub fn new<S: Into<String>>(supplier_id: i64, sku: S, name: S, price: Money) -> Self {
        Self {
            supplier_id,
            sku: sku.into(),
            name: name.into(),
            current_price: price,
            in_stock: true,
            min_quantity: None,
            max_quantity: None,
            price_updated_at: Utc::now(),
        }
    }

    pub fn out_of_stock(mut self) -> Self {
        self.in_stock = false;
        self
    }

    pub fn with_quantity_limits(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.min_quantity = min;
        self.max_quantity = max;
        self
    }

    pub fn priced_at(mut self, at: DateTime<Utc>) -> Self {
        self.price_updated_at = at;
        self
    }
}

//--------------------------------------   CredentialStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    Active,
    Inactive,
    OnHold,
    Failed,
}

labelled_enum!(CredentialStatus {
    Active => "active",
    Inactive => "inactive",
    OnHold => "on_hold",
    Failed => "failed",
});

//--------------------------------------  SupplierCredential   ---------------------------------------------------------
/// A user's login at one supplier. Secrets live with the session collaborator, never here.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SupplierCredential {
    pub id: i64,
    pub user_id: i64,
    pub supplier_id: i64,
    pub username: String,
    pub status: CredentialStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SupplierCredential {
    pub fn is_active(&self) -> bool {
        self.status == CredentialStatus::Active
    }
}

#[derive(Debug, Clone)]
pub struct NewSupplierCredential {
    pub user_id: i64,
    pub supplier_id: i64,
    pub username: String,
    pub status: CredentialStatus,
}

impl NewSupplierCredential {
    pub fn new<S: Into<String>>(user_id: i64, supplier_id: i64, username: S) -> Self {
        Self { user_id, supplier_id, username: username.into(), status: CredentialStatus::Active }
    }

    pub fn with_status(mut self, status: CredentialStatus) -> Self {
        self.status = status;
        self
    }
}

//--------------------------------------    ChallengeStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Pending,
    Submitted,
    Verified,
    Failed,
    Cancelled,
    Expired,
}

labelled_enum!(ChallengeStatus {
    Pending => "pending",
    Submitted => "submitted",
    Verified => "verified",
    Failed => "failed",
    Cancelled => "cancelled",
    Expired => "expired",
});

//--------------------------------------  TwoFactorRequestType ---------------------------------------------------------
/// Which suspended operation is waiting on the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TwoFactorRequestType {
    Login,
    Checkout,
    PriceRefresh,
}

labelled_enum!(TwoFactorRequestType {
    Login => "login",
    Checkout => "checkout",
    PriceRefresh => "price_refresh",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TwoFactorKind {
    Sms,
    Totp,
    Email,
    #[default]
    Unknown,
}

labelled_enum!(TwoFactorKind {
    Sms => "sms",
    Totp => "totp",
    Email => "email",
    Unknown => "unknown",
});

//--------------------------------------  TwoFactorChallenge   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct TwoFactorChallenge {
    pub id: i64,
    pub user_id: i64,
    pub credential_id: i64,
    pub order_id: Option<OrderId>,
    /// The capability a client presents to answer this challenge.
    pub session_token: String,
    pub request_type: TwoFactorRequestType,
    pub two_fa_type: TwoFactorKind,
    pub prompt_message: String,
    pub status: ChallengeStatus,
    pub attempts: i64,
    #[serde(skip)]
    pub submitted_code: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TwoFactorChallenge {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ChallengeStatus::Expired || now >= self.expires_at
    }

    pub fn is_pending(&self) -> bool {
        self.status == ChallengeStatus::Pending
    }
}

#[derive(Debug, Clone)]
pub struct NewTwoFactorChallenge {
    pub user_id: i64,
    pub credential_id: i64,
    pub order_id: Option<OrderId>,
    pub session_token: String,
    pub request_type: TwoFactorRequestType,
    pub two_fa_type: TwoFactorKind,
    pub prompt_message: String,
    pub expires_at: DateTime<Utc>,
}

//--------------------------------------    OrderTransition    ---------------------------------------------------------
/// An explicit, atomic order state change. Each variant maps to one conditional `UPDATE` that only succeeds when the
/// order is currently in one of [`OrderTransition::allowed_from`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderTransition {
    Processing,
    Submitted { confirmation_number: String, total: Money, delivery_date: Option<NaiveDate>, at: DateTime<Utc> },
    Failed { message: String },
    PendingReview { message: String },
    PendingManual { message: String },
    Verifying,
    /// The verification stage found a price change beyond the tolerance band.
    PriceChanged { verified_total: Money, price_change_amount: Money, message: String },
    /// The verification stage finished without a blocking price change and hands the order back as `pending`.
    Verified { outcome: VerificationStatus, verified_total: Option<Money>, price_change_amount: Money, message: Option<String> },
    Confirmed,
    Cancelled,
}

impl OrderTransition {
    pub fn target(&self) -> OrderStatusType {
        use OrderStatusType::*;
        match self {
            OrderTransition::Processing => Processing,
            OrderTransition::Submitted { .. } => Submitted,
            OrderTransition::Failed { .. } => Failed,
            OrderTransition::PendingReview { .. } => PendingReview,
            OrderTransition::PendingManual { .. } => PendingManual,
            OrderTransition::Verifying => Verifying,
            OrderTransition::PriceChanged { .. } => PriceChanged,
            OrderTransition::Verified { .. } => Pending,
            OrderTransition::Confirmed => Confirmed,
            OrderTransition::Cancelled => Cancelled,
        }
    }

    pub fn allowed_from(&self) -> &'static [OrderStatusType] {
        use OrderStatusType::*;
        match self {
            OrderTransition::Processing => &[Pending, PendingReview, PendingManual, Failed, PriceChanged],
            OrderTransition::Submitted { .. }
            | OrderTransition::Failed { .. }
            | OrderTransition::PendingReview { .. }
            | OrderTransition::PendingManual { .. } => &[Processing],
            OrderTransition::Verifying => &[Pending, PendingReview, PriceChanged, Failed],
            OrderTransition::PriceChanged { .. } | OrderTransition::Verified { .. } => &[Verifying],
            OrderTransition::Confirmed => &[Submitted],
            OrderTransition::Cancelled => &[Pending, PendingReview, PendingManual, PriceChanged, Failed],
        }
    }
}

//--------------------------------------    OrderSnapshot      ---------------------------------------------------------
/// An order item joined with the catalog product it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem {
    pub item: OrderItem,
    pub product: SupplierProduct,
}

/// A fully loaded order: the order row, its items with their products, the supplier and the user's credential at that
/// supplier (if one exists).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSnapshot {
    pub order: Order,
    pub items: Vec<LineItem>,
    pub supplier: Supplier,
    pub credential: Option<SupplierCredential>,
}

impl OrderSnapshot {
    pub fn id(&self) -> OrderId {
        self.order.id
    }

    pub fn subtotal(&self) -> Money {
        self.items.iter().map(|l| l.item.line_total).sum()
    }

    pub fn item_ids(&self) -> Vec<i64> {
        self.items.iter().map(|l| l.item.id).collect()
    }

    pub fn skus(&self) -> Vec<String> {
        self.items.iter().map(|l| l.product.sku.clone()).collect()
    }

    pub fn line_for_sku(&self, sku: &str) -> Option<&LineItem> {
        self.items.iter().find(|l| l.product.sku == sku)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_labels() {
        assert_eq!(OrderStatusType::PendingReview.to_string(), "pending_review");
        assert_eq!("price_changed".parse::<OrderStatusType>().unwrap(), OrderStatusType::PriceChanged);
        assert!("Paid".parse::<OrderStatusType>().is_err());
        let json = serde_json::to_string(&OrderStatusType::PendingManual).unwrap();
        assert_eq!(json, "\"pending_manual\"");
    }

    #[test]
    fn order_id_parsing() {
        assert_eq!("#42".parse::<OrderId>().unwrap(), OrderId(42));
        assert_eq!("7".parse::<OrderId>().unwrap(), OrderId(7));
        assert!("abc".parse::<OrderId>().is_err());
    }

    #[test]
    fn delivery_days() {
        let days = DeliveryDays::try_from("mon, wed,fri".to_string()).unwrap();
        assert!(days.contains(Weekday::Wed));
        assert!(!days.contains(Weekday::Tue));
        assert_eq!(days.to_string(), "mon,wed,fri");
        assert!(DeliveryDays::try_from(String::new()).unwrap().is_empty());
        assert!(DeliveryDays::try_from("funday".to_string()).is_err());
    }

    #[test]
    fn processing_is_the_only_way_to_submitted() {
        let submit = OrderTransition::Submitted {
            confirmation_number: "ABC123".into(),
            total: Money::from_dollars(120),
            delivery_date: None,
            at: Utc::now(),
        };
        assert_eq!(submit.allowed_from(), &[OrderStatusType::Processing]);
        assert!(!OrderTransition::Processing.allowed_from().contains(&OrderStatusType::Processing));
        assert!(!OrderTransition::Cancelled.allowed_from().contains(&OrderStatusType::Submitted));
    }

    #[test]
    fn editable_statuses() {
        assert!(OrderStatusType::Pending.is_editable());
        assert!(OrderStatusType::Failed.is_editable());
        assert!(!OrderStatusType::Processing.is_editable());
        assert!(!OrderStatusType::Submitted.is_editable());
        assert!(!OrderStatusType::PendingManual.is_editable());
    }
}
