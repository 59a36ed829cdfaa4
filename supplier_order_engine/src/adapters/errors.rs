use std::fmt::Display;

use serde::{Deserialize, Serialize};
use sog_common::Money;
use thiserror::Error;

use crate::adapters::TwoFactorPrompt;

/// An item the supplier could not supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableItem {
    pub sku: String,
    pub requested: Option<i64>,
    pub available: Option<i64>,
}

impl Display for UnavailableItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.available {
            Some(n) => write!(f, "{} ({n} available)", self.sku),
            None => write!(f, "{}", self.sku),
        }
    }
}

/// A price difference the supplier reported during checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChange {
    pub sku: String,
    pub old_price: Money,
    pub new_price: Money,
}

impl PriceChange {
    pub fn delta(&self) -> Money {
        self.new_price - self.old_price
    }
}

fn describe_items(items: &[UnavailableItem]) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

fn describe_changes(changes: &[PriceChange]) -> String {
    changes.iter().map(|c| format!("{} ({} -> {})", c.sku, c.old_price, c.new_price)).collect::<Vec<_>>().join(", ")
}

/// Every failure a supplier adapter can signal. Callers match on the variant to decide where an order goes next.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    #[error("The adapter does not implement {0}")]
    NotImplemented(&'static str),
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("The supplier session has expired")]
    SessionExpired,
    #[error("Order total {current_total} is below the supplier minimum of {minimum}")]
    OrderMinimum { minimum: Money, current_total: Money },
    #[error("Items unavailable: {}", describe_items(.0))]
    ItemUnavailable(Vec<UnavailableItem>),
    #[error("Prices changed: {}", describe_changes(.0))]
    PriceChanged(Vec<PriceChange>),
    #[error("The supplier account is on hold: {0}")]
    AccountHold(String),
    #[error("The supplier site presented a CAPTCHA")]
    CaptchaDetected,
    #[error("Delivery unavailable: {0}")]
    DeliveryUnavailable(String),
    #[error("The supplier site is down for maintenance")]
    Maintenance,
    #[error("The supplier is rate limiting requests")]
    RateLimited,
    #[error("Two-factor authentication required")]
    TwoFactorRequired(TwoFactorPrompt),
    #[error("The supplier did not respond in time")]
    Timeout,
    #[error("Unexpected adapter error: {0}")]
    Unexpected(String),
}

impl AdapterError {
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, AdapterError::NotImplemented(_))
    }

    /// Errors caused by an expired or rejected login.
    pub fn is_session_failure(&self) -> bool {
        matches!(self, AdapterError::Authentication(_) | AdapterError::SessionExpired)
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn messages_name_the_items() {
        let err = AdapterError::ItemUnavailable(vec![
            UnavailableItem { sku: "A1".into(), requested: Some(4), available: Some(1) },
            UnavailableItem { sku: "B2".into(), requested: None, available: None },
        ]);
        assert_eq!(err.to_string(), "Items unavailable: A1 (1 available), B2");
        let err = AdapterError::OrderMinimum { minimum: Money::from_dollars(100), current_total: Money::from_dollars(80) };
        assert_eq!(err.to_string(), "Order total $80.00 is below the supplier minimum of $100.00");
    }

    #[test]
    fn price_change_delta() {
        let change =
            PriceChange { sku: "X".into(), old_price: Money::from_cents(1_000), new_price: Money::from_cents(1_150) };
        assert_eq!(change.delta(), Money::from_cents(150));
    }
}
