//! `SqliteDatabase` is a concrete implementation of a supplier order engine backend.
//!
//! It uses SQLite as the store and implements all the traits defined in the [`crate::traits`] module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sog_common::Money;
use sqlx::SqlitePool;

use super::{
    db::{catalog, challenges, db_url, new_pool, order_items, orders, validations},
    SqliteDatabaseError,
};
use crate::{
    db_types::{
        ChallengeStatus,
        CredentialStatus,
        ItemStatus,
        NewOrder,
        NewOrderItem,
        NewOrderValidation,
        NewSupplier,
        NewSupplierCredential,
        NewSupplierProduct,
        NewTwoFactorChallenge,
        Order,
        OrderId,
        OrderItem,
        OrderSnapshot,
        OrderTransition,
        OrderValidation,
        Supplier,
        SupplierCredential,
        SupplierProduct,
        TwoFactorChallenge,
    },
    traits::{
        CatalogManagement,
        ChallengeManagement,
        OrderManagement,
        StoreError,
        SupplierOrderDatabase,
        ValidationLog,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `SOG_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Applies any outstanding embedded migrations.
    pub async fn migrate(&self) -> Result<(), SqliteDatabaseError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl SupplierOrderDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;
        if catalog::fetch_supplier(order.supplier_id, &mut tx).await?.is_none() {
            return Err(StoreError::SupplierNotFound(order.supplier_id));
        }
        let order = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(order_id, &mut conn).await
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        order_items::fetch_items(order_id, &mut conn).await
    }

    async fn fetch_order_snapshot(&self, order_id: &OrderId) -> Result<Option<OrderSnapshot>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::fetch_order(order_id, &mut tx).await? else {
            return Ok(None);
        };
        let items = order_items::fetch_line_items(order_id, &mut tx).await?;
        let supplier = catalog::fetch_supplier(order.supplier_id, &mut tx)
            .await?
            .ok_or(StoreError::SupplierNotFound(order.supplier_id))?;
        let credential = catalog::fetch_credential_for_supplier(order.user_id, order.supplier_id, &mut tx).await?;
        tx.commit().await?;
        Ok(Some(OrderSnapshot { order, items, supplier, credential }))
    }

    async fn fetch_orders_for_batch(&self, batch_id: &str) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders_for_batch(batch_id, &mut conn).await
    }

    async fn fetch_open_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_open_orders_for_user(user_id, &mut conn).await
    }

    async fn add_order_item(&self, order_id: &OrderId, item: NewOrderItem) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_editable_order(order_id, &mut tx).await?;
        let product = catalog::fetch_product(item.supplier_product_id, &mut tx)
            .await?
            .ok_or(StoreError::ProductNotFound(item.supplier_product_id))?;
        if product.supplier_id != order.supplier_id {
            return Err(StoreError::SupplierMismatch {
                product_id: product.id,
                product_supplier: product.supplier_id,
                order_supplier: order.supplier_id,
            });
        }
        let unit_price = item.unit_price.unwrap_or(product.current_price);
        order_items::insert_or_merge_item(order_id, item, unit_price, &mut tx).await?;
        let order = orders::recompute_totals(order_id, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn remove_order_items(&self, order_id: &OrderId, item_ids: &[i64]) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;
        orders::fetch_editable_order(order_id, &mut tx).await?;
        order_items::delete_items(order_id, item_ids, &mut tx).await?;
        let order = orders::recompute_totals(order_id, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn prune_order_items(&self, order_id: &OrderId, item_ids: &[i64]) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;
        orders::fetch_existing_order(order_id, &mut tx).await?;
        order_items::delete_items(order_id, item_ids, &mut tx).await?;
        let order = orders::recompute_totals(order_id, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn update_item_quantity(&self, order_id: &OrderId, item_id: i64, quantity: i64) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;
        orders::fetch_editable_order(order_id, &mut tx).await?;
        order_items::update_quantity(order_id, item_id, quantity, &mut tx).await?;
        let order = orders::recompute_totals(order_id, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn reprice_order_items(&self, order_id: &OrderId, prices: &[(i64, Money)]) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;
        for (item_id, price) in prices {
            order_items::update_unit_price(order_id, *item_id, *price, &mut tx).await?;
        }
        let order = orders::recompute_totals(order_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {order_id}: {} items repriced. New subtotal {}", prices.len(), order.subtotal);
        Ok(order)
    }

    async fn set_verified_prices(&self, order_id: &OrderId, prices: &[(i64, Money)]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for (item_id, price) in prices {
            order_items::set_verified_price(order_id, *item_id, *price, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn set_item_status(&self, order_id: &OrderId, item_ids: &[i64], status: ItemStatus) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        order_items::set_status(order_id, item_ids, status, &mut conn).await
    }

    async fn delete_order(&self, order_id: &OrderId) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::delete_order(order_id, &mut conn).await
    }

    async fn transition_order(&self, order_id: &OrderId, transition: OrderTransition) -> Result<Order, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::transition_order(order_id, transition, &mut conn).await
    }
}

impl ValidationLog for SqliteDatabase {
    async fn record_validations(&self, entries: &[NewOrderValidation]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for entry in entries {
            validations::insert_validation(entry, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_validations(&self, order_id: &OrderId) -> Result<Vec<OrderValidation>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        validations::fetch_validations(order_id, &mut conn).await
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn insert_supplier(&self, supplier: NewSupplier) -> Result<Supplier, StoreError> {
        let mut conn = self.pool.acquire().await?;
        catalog::insert_supplier(supplier, &mut conn).await
    }

    async fn fetch_supplier(&self, supplier_id: i64) -> Result<Option<Supplier>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_supplier(supplier_id, &mut conn).await
    }

    async fn insert_product(&self, product: NewSupplierProduct) -> Result<SupplierProduct, StoreError> {
        let mut conn = self.pool.acquire().await?;
        catalog::insert_product(product, &mut conn).await
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<SupplierProduct>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_product(product_id, &mut conn).await
    }

    async fn fetch_product_by_sku(&self, supplier_id: i64, sku: &str) -> Result<Option<SupplierProduct>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_product_by_sku(supplier_id, sku, &mut conn).await
    }

    async fn update_product_price(
        &self,
        product_id: i64,
        price: Money,
        in_stock: Option<bool>,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        catalog::update_product_price(product_id, price, in_stock, at, &mut conn).await
    }

    async fn update_product_stock(&self, product_id: i64, in_stock: bool) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        catalog::update_product_stock(product_id, in_stock, &mut conn).await
    }

    async fn insert_credential(&self, credential: NewSupplierCredential) -> Result<SupplierCredential, StoreError> {
        let mut conn = self.pool.acquire().await?;
        catalog::insert_credential(credential, &mut conn).await
    }

    async fn fetch_credential(&self, credential_id: i64) -> Result<Option<SupplierCredential>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_credential(credential_id, &mut conn).await
    }

    async fn fetch_credential_for_supplier(
        &self,
        user_id: i64,
        supplier_id: i64,
    ) -> Result<Option<SupplierCredential>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_credential_for_supplier(user_id, supplier_id, &mut conn).await
    }

    async fn set_credential_status(&self, credential_id: i64, status: CredentialStatus) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        catalog::set_credential_status(credential_id, status, &mut conn).await
    }
}

impl ChallengeManagement for SqliteDatabase {
    async fn insert_challenge(
        &self,
        challenge: NewTwoFactorChallenge,
    ) -> Result<(TwoFactorChallenge, u64), StoreError> {
        let mut tx = self.pool.begin().await?;
        let superseded = challenges::supersede_pending(challenge.user_id, challenge.credential_id, &mut tx).await?;
        if superseded > 0 {
            debug!("🗃️ {superseded} pending challenges for credential {} superseded", challenge.credential_id);
        }
        let challenge = challenges::insert_challenge(challenge, &mut tx).await?;
        tx.commit().await?;
        Ok((challenge, superseded))
    }

    async fn fetch_challenge_by_token(&self, session_token: &str) -> Result<Option<TwoFactorChallenge>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        challenges::fetch_by_token(session_token, &mut conn).await
    }

    async fn fetch_pending_challenges(&self, user_id: i64) -> Result<Vec<TwoFactorChallenge>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        challenges::fetch_pending_for_user(user_id, &mut conn).await
    }

    async fn begin_code_attempt(
        &self,
        challenge_id: i64,
        max_attempts: i64,
    ) -> Result<Option<TwoFactorChallenge>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        challenges::begin_attempt(challenge_id, max_attempts, &mut conn).await
    }

    async fn update_challenge_status(
        &self,
        challenge_id: i64,
        from: &[ChallengeStatus],
        to: ChallengeStatus,
    ) -> Result<Option<TwoFactorChallenge>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        challenges::update_status(challenge_id, from, to, &mut conn).await
    }

    async fn store_submitted_code(&self, challenge_id: i64, code: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        challenges::store_code(challenge_id, code, &mut conn).await
    }

    async fn take_verified_code(&self, credential_id: i64) -> Result<Option<String>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let code = challenges::take_verified_code(credential_id, &mut tx).await?;
        tx.commit().await?;
        Ok(code)
    }

    async fn expire_challenges(&self, now: DateTime<Utc>) -> Result<Vec<TwoFactorChallenge>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let stale = challenges::fetch_expired_pending(now, &mut tx).await?;
        let mut expired = Vec::with_capacity(stale.len());
        for challenge in stale {
            let from = [ChallengeStatus::Pending];
            if let Some(c) = challenges::update_status(challenge.id, &from, ChallengeStatus::Expired, &mut tx).await? {
                expired.push(c);
            }
        }
        tx.commit().await?;
        Ok(expired)
    }
}
