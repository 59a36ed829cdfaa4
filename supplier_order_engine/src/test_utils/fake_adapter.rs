//! A scriptable in-memory supplier for tests.
//!
//! [`FakeSupplier`] holds the supplier's "live" state (prices, stock, minimum, the valid two-factor code) plus queued
//! failures per capability. Every session the [`FakeAdapterFactory`] hands out shares that state and records each call,
//! so tests can both script the supplier and assert on what the engine asked of it.
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use sog_common::Money;

use crate::adapters::{
    AdapterError,
    AdapterFactory,
    AdapterResult,
    CartLine,
    CheckoutReceipt,
    DeliveryAvailability,
    ProductInfo,
    ScrapedPrice,
    SessionContext,
    StockLevel,
    SupplierAdapter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Login,
    SoftRefresh,
    AddToCart,
    Checkout,
    CheckStock,
    ProductInfo,
    OrderMinimum,
    DeliveryAvailability,
    ScrapePrices,
    VerifyCode,
}

impl Capability {
    fn name(&self) -> &'static str {
        match self {
            Capability::Login => "login",
            Capability::SoftRefresh => "soft_refresh",
            Capability::AddToCart => "add_to_cart",
            Capability::Checkout => "checkout",
            Capability::CheckStock => "check_stock",
            Capability::ProductInfo => "get_product_info",
            Capability::OrderMinimum => "get_order_minimum",
            Capability::DeliveryAvailability => "get_delivery_availability",
            Capability::ScrapePrices => "scrape_prices",
            Capability::VerifyCode => "verify_two_factor_code",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterCall {
    Connect { credential_id: i64, with_code: Option<String> },
    Login,
    SoftRefresh,
    AddToCart(Vec<CartLine>),
    Checkout,
    CheckStock(String),
    ProductInfo(String),
    OrderMinimum,
    DeliveryAvailability(NaiveDate),
    ScrapePrices(Vec<String>),
    VerifyCode { session_token: String, code: String },
}

impl AdapterCall {
    pub fn capability(&self) -> Option<Capability> {
        match self {
            AdapterCall::Connect { .. } => None,
            AdapterCall::Login => Some(Capability::Login),
            AdapterCall::SoftRefresh => Some(Capability::SoftRefresh),
            AdapterCall::AddToCart(_) => Some(Capability::AddToCart),
            AdapterCall::Checkout => Some(Capability::Checkout),
            AdapterCall::CheckStock(_) => Some(Capability::CheckStock),
            AdapterCall::ProductInfo(_) => Some(Capability::ProductInfo),
            AdapterCall::OrderMinimum => Some(Capability::OrderMinimum),
            AdapterCall::DeliveryAvailability(_) => Some(Capability::DeliveryAvailability),
            AdapterCall::ScrapePrices(_) => Some(Capability::ScrapePrices),
            AdapterCall::VerifyCode { .. } => Some(Capability::VerifyCode),
        }
    }
}

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<AdapterCall>,
    capabilities: HashSet<Capability>,
    failures: HashMap<Capability, VecDeque<AdapterError>>,
    delays: HashMap<Capability, Duration>,
    live_prices: HashMap<String, Money>,
    stock: HashMap<String, StockLevel>,
    minimum: Money,
    delivery_available: bool,
    valid_code: Option<String>,
    cart: Vec<CartLine>,
    checkouts: u32,
}

/// The shared, scriptable state of a fake supplier. Cloning gives another handle onto the same supplier.
#[derive(Debug, Clone)]
pub struct FakeSupplier {
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakeSupplier {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSupplier {
    /// A supplier that can log in, fill a cart and check out, and implements nothing else.
    pub fn new() -> Self {
        let state = FakeState {
            capabilities: [Capability::Login, Capability::SoftRefresh, Capability::AddToCart, Capability::Checkout]
                .into_iter()
                .collect(),
            delivery_available: true,
            ..Default::default()
        };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    /// A supplier implementing every capability.
    pub fn full() -> Self {
        let supplier = Self::new();
        for c in [
            Capability::CheckStock,
            Capability::ProductInfo,
            Capability::OrderMinimum,
            Capability::DeliveryAvailability,
            Capability::ScrapePrices,
            Capability::VerifyCode,
        ] {
            supplier.enable(c);
        }
        supplier
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn enable(&self, capability: Capability) -> &Self {
        self.state().capabilities.insert(capability);
        self
    }

    pub fn disable(&self, capability: Capability) -> &Self {
        self.state().capabilities.remove(&capability);
        self
    }

    /// The next call to `capability` fails with `err`. Queued failures are consumed in order, before the capability
    /// check, so they also apply to capabilities that are otherwise not implemented.
    pub fn fail_next(&self, capability: Capability, err: AdapterError) -> &Self {
        self.state().failures.entry(capability).or_default().push_back(err);
        self
    }

    pub fn delay(&self, capability: Capability, delay: Duration) -> &Self {
        self.state().delays.insert(capability, delay);
        self
    }

    pub fn set_price(&self, sku: &str, price: Money) -> &Self {
        self.state().live_prices.insert(sku.to_string(), price);
        self
    }

    pub fn set_stock(&self, sku: &str, in_stock: bool, available_quantity: Option<i64>) -> &Self {
        self.state().stock.insert(sku.to_string(), StockLevel { in_stock, available_quantity });
        self
    }

    pub fn set_minimum(&self, minimum: Money) -> &Self {
        self.state().minimum = minimum;
        self
    }

    pub fn set_delivery_available(&self, available: bool) -> &Self {
        self.state().delivery_available = available;
        self
    }

    pub fn set_valid_code(&self, code: &str) -> &Self {
        self.state().valid_code = Some(code.to_string());
        self
    }

    pub fn calls(&self) -> Vec<AdapterCall> {
        self.state().calls.clone()
    }

    pub fn count(&self, capability: Capability) -> usize {
        self.state().calls.iter().filter(|c| c.capability() == Some(capability)).count()
    }

    pub fn connections(&self) -> usize {
        self.state().calls.iter().filter(|c| matches!(c, AdapterCall::Connect { .. })).count()
    }

    /// Every call made so far, in order, reduced to the capability it exercised.
    pub fn capability_log(&self) -> Vec<Capability> {
        self.state().calls.iter().filter_map(|c| c.capability()).collect()
    }

    pub fn factory(&self) -> FakeAdapterFactory {
        FakeAdapterFactory { default: self.clone(), by_supplier: HashMap::new() }
    }

    /// Records the call and applies the script. Returns `Some(result)` when the script decides the outcome.
    async fn begin<T>(&self, call: AdapterCall) -> Option<AdapterResult<T>> {
        let capability = call.capability()?;
        let delay = {
            let mut state = self.state();
            state.calls.push(call);
            state.delays.get(&capability).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state();
        if let Some(err) = state.failures.get_mut(&capability).and_then(|q| q.pop_front()) {
            return Some(Err(err));
        }
        if !state.capabilities.contains(&capability) {
            return Some(Err(AdapterError::NotImplemented(capability.name())));
        }
        None
    }
}

/// Hands out sessions on a [`FakeSupplier`]. Sessions for suppliers registered with [`FakeAdapterFactory::route`] go
/// to their own fake; everything else goes to the default one.
pub struct FakeAdapterFactory {
    default: FakeSupplier,
    by_supplier: HashMap<i64, FakeSupplier>,
}

impl FakeAdapterFactory {
    pub fn route(mut self, supplier_id: i64, site: FakeSupplier) -> Self {
        self.by_supplier.insert(supplier_id, site);
        self
    }
}

#[async_trait]
impl AdapterFactory for FakeAdapterFactory {
    async fn connect(&self, context: SessionContext) -> AdapterResult<Box<dyn SupplierAdapter>> {
        let supplier = self.by_supplier.get(&context.supplier.id).unwrap_or(&self.default).clone();
        let with_code = context.two_factor_code.as_ref().map(|c| c.expose().clone());
        supplier.state().calls.push(AdapterCall::Connect { credential_id: context.credential.id, with_code });
        Ok(Box::new(FakeAdapter { supplier }))
    }
}

pub struct FakeAdapter {
    supplier: FakeSupplier,
}

#[async_trait]
impl SupplierAdapter for FakeAdapter {
    async fn login(&mut self) -> AdapterResult<()> {
        if let Some(result) = self.supplier.begin(AdapterCall::Login).await {
            return result;
        }
        Ok(())
    }

    async fn soft_refresh(&mut self) -> AdapterResult<bool> {
        if let Some(result) = self.supplier.begin(AdapterCall::SoftRefresh).await {
            return result;
        }
        Ok(true)
    }

    async fn add_to_cart(&mut self, items: &[CartLine], _delivery_date: Option<NaiveDate>) -> AdapterResult<()> {
        if let Some(result) = self.supplier.begin(AdapterCall::AddToCart(items.to_vec())).await {
            return result;
        }
        self.supplier.state().cart = items.to_vec();
        Ok(())
    }

    async fn checkout(&mut self) -> AdapterResult<CheckoutReceipt> {
        if let Some(result) = self.supplier.begin(AdapterCall::Checkout).await {
            return result;
        }
        let mut state = self.supplier.state();
        state.checkouts += 1;
        let total = state.cart.iter().map(|l| l.unit_price * l.quantity).sum();
        state.cart.clear();
        Ok(CheckoutReceipt { confirmation_number: format!("CONF-{:04}", state.checkouts), total, delivery_date: None })
    }

    async fn check_stock(&mut self, sku: &str) -> AdapterResult<StockLevel> {
        if let Some(result) = self.supplier.begin(AdapterCall::CheckStock(sku.to_string())).await {
            return result;
        }
        let level = self.supplier.state().stock.get(sku).copied();
        Ok(level.unwrap_or(StockLevel { in_stock: true, available_quantity: None }))
    }

    async fn get_product_info(&mut self, sku: &str) -> AdapterResult<ProductInfo> {
        if let Some(result) = self.supplier.begin(AdapterCall::ProductInfo(sku.to_string())).await {
            return result;
        }
        let state = self.supplier.state();
        let price = state.live_prices.get(sku).copied().ok_or_else(|| AdapterError::Unexpected(format!("Unknown SKU {sku}")))?;
        let in_stock = state.stock.get(sku).map(|s| s.in_stock).unwrap_or(true);
        Ok(ProductInfo { price, in_stock })
    }

    async fn get_order_minimum(&mut self) -> AdapterResult<Money> {
        if let Some(result) = self.supplier.begin(AdapterCall::OrderMinimum).await {
            return result;
        }
        Ok(self.supplier.state().minimum)
    }

    async fn get_delivery_availability(&mut self, date: NaiveDate) -> AdapterResult<DeliveryAvailability> {
        if let Some(result) = self.supplier.begin(AdapterCall::DeliveryAvailability(date)).await {
            return result;
        }
        let available = self.supplier.state().delivery_available;
        let message = (!available).then(|| format!("No delivery slots on {date}"));
        Ok(DeliveryAvailability { available, cutoff_time: None, message })
    }

    async fn scrape_prices(&mut self, skus: &[String]) -> AdapterResult<Vec<ScrapedPrice>> {
        if let Some(result) = self.supplier.begin(AdapterCall::ScrapePrices(skus.to_vec())).await {
            return result;
        }
        let state = self.supplier.state();
        let prices = skus
            .iter()
            .filter_map(|sku| {
                let price = state.live_prices.get(sku)?;
                let in_stock = state.stock.get(sku).map(|s| s.in_stock).unwrap_or(true);
                Some(ScrapedPrice { supplier_sku: sku.clone(), current_price: *price, in_stock })
            })
            .collect();
        Ok(prices)
    }

    async fn verify_two_factor_code(&mut self, session_token: &str, code: &str) -> AdapterResult<bool> {
        let call = AdapterCall::VerifyCode { session_token: session_token.to_string(), code: code.to_string() };
        if let Some(result) = self.supplier.begin(call).await {
            return result;
        }
        Ok(self.supplier.state().valid_code.as_deref() == Some(code))
    }
}
