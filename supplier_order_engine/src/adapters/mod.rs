//! # Supplier adapters
//!
//! The engine never talks to a supplier website directly. It drives a [`SupplierAdapter`], obtained from an
//! [`AdapterFactory`], which exposes a fixed set of capabilities. Every capability has a default implementation that
//! returns [`AdapterError::NotImplemented`]; callers treat that as "skip this check", never as a failure.
//!
//! Adapter failures are returned as [`AdapterError`] variants and matched on explicitly by the placement and
//! verification stages.
//!
//! Read-only live calls are wrapped with [`live_call!`](crate::live_call), which applies the per-call timeout and
//! retries a bounded number of times when (and only when) the call timed out. Calls that change state at the supplier
//! (`add_to_cart`, `checkout`, `verify_two_factor_code`) go through [`with_timeout`] and are sent exactly once.
mod errors;
mod objects;
mod registry;

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use chrono::NaiveDate;
pub use errors::{AdapterError, AdapterResult, PriceChange, UnavailableItem};
pub use objects::{
    CartLine,
    CheckoutReceipt,
    DeliveryAvailability,
    ProductInfo,
    ScrapedPrice,
    SessionContext,
    StockLevel,
    TwoFactorPrompt,
};
pub use registry::AdapterRegistry;
use sog_common::Money;

/// A live session with one supplier for one credential. A session is exclusive: the task queue guarantees only one
/// exists per credential at any time.
#[async_trait]
pub trait SupplierAdapter: Send {
    async fn login(&mut self) -> AdapterResult<()> {
        Err(AdapterError::NotImplemented("login"))
    }

    /// Tries to revive an existing session without an interactive login. `Ok(false)` means the session could not be
    /// revived and a full login is needed.
    async fn soft_refresh(&mut self) -> AdapterResult<bool> {
        Err(AdapterError::NotImplemented("soft_refresh"))
    }

    async fn add_to_cart(&mut self, _items: &[CartLine], _delivery_date: Option<NaiveDate>) -> AdapterResult<()> {
        Err(AdapterError::NotImplemented("add_to_cart"))
    }

    async fn checkout(&mut self) -> AdapterResult<CheckoutReceipt> {
        Err(AdapterError::NotImplemented("checkout"))
    }

    async fn check_stock(&mut self, _sku: &str) -> AdapterResult<StockLevel> {
        Err(AdapterError::NotImplemented("check_stock"))
    }

    async fn get_product_info(&mut self, _sku: &str) -> AdapterResult<ProductInfo> {
        Err(AdapterError::NotImplemented("get_product_info"))
    }

    async fn get_order_minimum(&mut self) -> AdapterResult<Money> {
        Err(AdapterError::NotImplemented("get_order_minimum"))
    }

    async fn get_delivery_availability(&mut self, _date: NaiveDate) -> AdapterResult<DeliveryAvailability> {
        Err(AdapterError::NotImplemented("get_delivery_availability"))
    }

    /// Fetches current prices for all the SKUs in one round trip.
    async fn scrape_prices(&mut self, _skus: &[String]) -> AdapterResult<Vec<ScrapedPrice>> {
        Err(AdapterError::NotImplemented("scrape_prices"))
    }

    /// Hands a user-entered code to the supplier. `Ok(false)` means the supplier rejected the code.
    async fn verify_two_factor_code(&mut self, _session_token: &str, _code: &str) -> AdapterResult<bool> {
        Err(AdapterError::NotImplemented("verify_two_factor_code"))
    }
}

/// Creates adapter sessions. Implementations pick the right adapter for the supplier in the context.
#[async_trait]
pub trait AdapterFactory: Send + Sync {
    async fn connect(&self, context: SessionContext) -> AdapterResult<Box<dyn SupplierAdapter>>;
}

/// Timeout and retry settings for live adapter calls.
#[derive(Debug, Clone, Copy)]
pub struct CallPolicy {
    pub timeout: Duration,
    /// How many extra attempts a call gets after timing out. Other failures are never retried here.
    pub timeout_retries: u32,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30), timeout_retries: 2 }
    }
}

/// Awaits `fut`, converting an elapsed deadline into [`AdapterError::Timeout`].
pub async fn with_timeout<T, F>(timeout: Duration, fut: F) -> AdapterResult<T>
where F: Future<Output = AdapterResult<T>> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(AdapterError::Timeout),
    }
}

/// Runs an adapter call under a [`CallPolicy`]. The call expression is re-evaluated for every attempt, so it must be
/// safe to send twice.
///
/// ```ignore
/// let stock = live_call!(&policy, adapter.check_stock(&sku))?;
/// ```
#[macro_export]
macro_rules! live_call {
    ($policy:expr, $call:expr) => {{
        let policy: &$crate::adapters::CallPolicy = $policy;
        let mut retries = 0u32;
        loop {
            match $crate::adapters::with_timeout(policy.timeout, $call).await {
                Err($crate::adapters::AdapterError::Timeout) if retries < policy.timeout_retries => {
                    retries += 1;
                    log::debug!("⏱️ Adapter call timed out. Retrying ({retries}/{})", policy.timeout_retries);
                },
                result => break result,
            }
        }
    }};
}
