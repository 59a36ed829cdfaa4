use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sog_common::{Money, Secret};

use crate::db_types::{Supplier, SupplierCredential, TwoFactorKind};

/// One line handed to `add_to_cart`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub sku: String,
    pub quantity: i64,
    pub unit_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub confirmation_number: String,
    pub total: Money,
    pub delivery_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub in_stock: bool,
    pub available_quantity: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub price: Money,
    pub in_stock: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAvailability {
    pub available: bool,
    pub cutoff_time: Option<NaiveTime>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedPrice {
    pub supplier_sku: String,
    pub current_price: Money,
    pub in_stock: bool,
}

/// The payload of a "two-factor code required" signal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TwoFactorPrompt {
    /// The supplier's own identifier for the request, if it exposes one.
    pub request_id: Option<String>,
    /// Opaque token identifying this challenge. Generated by the engine when the adapter leaves it empty.
    pub session_token: String,
    pub two_fa_type: TwoFactorKind,
    pub prompt_message: String,
    /// How long the supplier will wait for the code.
    pub expires_in: Option<Duration>,
}

impl TwoFactorPrompt {
    pub fn new<S: Into<String>>(two_fa_type: TwoFactorKind, prompt_message: S) -> Self {
        Self { two_fa_type, prompt_message: prompt_message.into(), ..Default::default() }
    }

    pub fn with_session_token<S: Into<String>>(mut self, token: S) -> Self {
        self.session_token = token.into();
        self
    }

    pub fn expiring_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = Some(expires_in);
        self
    }
}

/// Everything an adapter factory needs to open a session for one credential.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub supplier: Supplier,
    pub credential: SupplierCredential,
    /// A code the user entered for an earlier challenge, for adapters that consume codes at login.
    pub two_factor_code: Option<Secret<String>>,
}
