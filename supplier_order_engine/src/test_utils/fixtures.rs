use std::sync::Arc;

use sog_common::Money;

use crate::{
    config::EngineConfig,
    db_types::{
        NewOrder,
        NewOrderItem,
        NewSupplier,
        NewSupplierCredential,
        NewSupplierProduct,
        Order,
        Supplier,
        SupplierCredential,
        SupplierProduct,
    },
    messaging::BroadcastBus,
    task_queue::RecordingScheduler,
    test_utils::{
        prepare_env::{drop_database, prepare_test_env},
        FakeSupplier,
    },
    traits::{CatalogManagement, OrderManagement},
    EngineContext,
    OrderApi,
    PlacementApi,
    PriceVerificationApi,
    SqliteDatabase,
    TwoFactorApi,
};

/// A fully wired engine over a fresh SQLite database and a [`FakeSupplier`]. Deferred jobs are recorded, not run.
pub struct TestEngine {
    pub url: String,
    pub db: SqliteDatabase,
    pub supplier_site: FakeSupplier,
    pub scheduler: Arc<RecordingScheduler>,
    pub bus: BroadcastBus,
    pub ctx: EngineContext<SqliteDatabase>,
}

impl TestEngine {
    pub async fn new(supplier_site: FakeSupplier) -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        let scheduler = Arc::new(RecordingScheduler::default());
        let bus = BroadcastBus::default();
        let ctx = EngineContext::new(db.clone(), Arc::new(supplier_site.factory()), scheduler.clone(), Arc::new(bus.clone()));
        Self { url, db, supplier_site, scheduler, bus, ctx }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.ctx.config = config;
        self
    }

    pub fn placement(&self) -> PlacementApi<SqliteDatabase> {
        PlacementApi::new(self.ctx.clone())
    }

    pub fn prices(&self) -> PriceVerificationApi<SqliteDatabase> {
        PriceVerificationApi::new(self.ctx.clone())
    }

    pub fn two_factor(&self) -> TwoFactorApi<SqliteDatabase> {
        TwoFactorApi::new(self.ctx.clone())
    }

    pub fn orders(&self) -> OrderApi<SqliteDatabase> {
        OrderApi::new(self.db.clone())
    }

    /// Inserts the supplier and one product per `(sku, price)` pair.
    pub async fn seed_supplier(&self, supplier: NewSupplier, products: &[(&str, Money)]) -> (Supplier, Vec<SupplierProduct>) {
        let supplier = self.db.insert_supplier(supplier).await.expect("Error inserting supplier");
        let mut result = Vec::with_capacity(products.len());
        for (sku, price) in products {
            let product = NewSupplierProduct::new(supplier.id, *sku, *sku, *price);
            result.push(self.db.insert_product(product).await.expect("Error inserting product"));
        }
        (supplier, result)
    }

    pub async fn seed_product(&self, product: NewSupplierProduct) -> SupplierProduct {
        self.db.insert_product(product).await.expect("Error inserting product")
    }

    pub async fn seed_credential(&self, user_id: i64, supplier_id: i64) -> SupplierCredential {
        let credential = NewSupplierCredential::new(user_id, supplier_id, format!("buyer{user_id}"));
        self.db.insert_credential(credential).await.expect("Error inserting credential")
    }

    /// Creates the order and adds one item per `(product_id, quantity)` pair at the catalog price.
    pub async fn seed_order(&self, order: NewOrder, lines: &[(i64, i64)]) -> Order {
        let mut order = self.db.insert_order(order).await.expect("Error inserting order");
        for (product_id, quantity) in lines {
            order = self
                .db
                .add_order_item(&order.id, NewOrderItem::new(*product_id, *quantity))
                .await
                .expect("Error adding order item");
        }
        order
    }

    pub async fn teardown(self) {
        self.db.pool().close().await;
        drop_database(&self.url).await;
    }
}
