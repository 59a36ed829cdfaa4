use std::collections::HashMap;

use chrono::Utc;
use log::{debug, trace};
use sog_common::Money;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{ItemStatus, LineItem, NewOrderItem, OrderId, OrderItem, SupplierProduct},
    traits::StoreError,
};

pub async fn fetch_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, StoreError> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Fetches the order's items, each paired with the catalog product it refers to.
pub async fn fetch_line_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<LineItem>, StoreError> {
    let items = fetch_items(order_id, &mut *conn).await?;
    let products: Vec<SupplierProduct> = sqlx::query_as(
        "SELECT * FROM supplier_products WHERE id IN (SELECT supplier_product_id FROM order_items WHERE order_id = $1)",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    let products = products.into_iter().map(|p| (p.id, p)).collect::<HashMap<_, _>>();
    items
        .into_iter()
        .map(|item| {
            let product = products
                .get(&item.supplier_product_id)
                .cloned()
                .ok_or(StoreError::ProductNotFound(item.supplier_product_id))?;
            Ok(LineItem { item, product })
        })
        .collect()
}

/// Adds the product to the order at `unit_price`. If the product is already on the order, the quantity is added to
/// the existing line and the line keeps its original unit price.
pub async fn insert_or_merge_item(
    order_id: &OrderId,
    item: NewOrderItem,
    unit_price: Money,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, StoreError> {
    if item.quantity <= 0 {
        return Err(StoreError::InvalidQuantity(item.quantity));
    }
    let now = Utc::now();
    let line_total = unit_price * item.quantity;
    let row: OrderItem = sqlx::query_as(
        r#"
        INSERT INTO order_items (order_id, supplier_product_id, quantity, unit_price, line_total, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        ON CONFLICT (order_id, supplier_product_id) DO UPDATE SET
            quantity = quantity + excluded.quantity,
            line_total = unit_price * (quantity + excluded.quantity),
            updated_at = excluded.updated_at
        RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(item.supplier_product_id)
    .bind(item.quantity)
    .bind(unit_price)
    .bind(line_total)
    .bind(now)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Order {order_id}: product {} now at quantity {}", row.supplier_product_id, row.quantity);
    Ok(row)
}

pub async fn delete_items(order_id: &OrderId, item_ids: &[i64], conn: &mut SqliteConnection) -> Result<u64, StoreError> {
    if item_ids.is_empty() {
        return Ok(0);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM order_items WHERE order_id = ");
    builder.push_bind(*order_id);
    builder.push(" AND id IN (");
    let mut ids = builder.separated(", ");
    for id in item_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(")");
    let result = builder.build().execute(conn).await?;
    debug!("🗃️ Removed {} items from order {order_id}", result.rows_affected());
    Ok(result.rows_affected())
}

pub async fn update_quantity(
    order_id: &OrderId,
    item_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    if quantity <= 0 {
        return Err(StoreError::InvalidQuantity(quantity));
    }
    let result = sqlx::query(
        "UPDATE order_items SET quantity = $1, line_total = unit_price * $1, updated_at = $2 WHERE id = $3 AND \
         order_id = $4",
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(item_id)
    .bind(order_id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::ItemNotFound(item_id, *order_id));
    }
    Ok(())
}

pub async fn update_unit_price(
    order_id: &OrderId,
    item_id: i64,
    price: Money,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE order_items SET unit_price = $1, line_total = $1 * quantity, updated_at = $2 WHERE id = $3 AND \
         order_id = $4",
    )
    .bind(price)
    .bind(Utc::now())
    .bind(item_id)
    .bind(order_id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::ItemNotFound(item_id, *order_id));
    }
    Ok(())
}

pub async fn set_verified_price(
    order_id: &OrderId,
    item_id: i64,
    price: Money,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    let result =
        sqlx::query("UPDATE order_items SET verified_price = $1, updated_at = $2 WHERE id = $3 AND order_id = $4")
            .bind(price)
            .bind(Utc::now())
            .bind(item_id)
            .bind(order_id)
            .execute(conn)
            .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::ItemNotFound(item_id, *order_id));
    }
    Ok(())
}

pub async fn set_status(
    order_id: &OrderId,
    item_ids: &[i64],
    status: ItemStatus,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    if item_ids.is_empty() {
        return Ok(());
    }
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE order_items SET status = ");
    builder.push_bind(status);
    builder.push(", updated_at = ").push_bind(Utc::now());
    builder.push(" WHERE order_id = ").push_bind(*order_id);
    builder.push(" AND id IN (");
    let mut ids = builder.separated(", ");
    for id in item_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(")");
    builder.build().execute(conn).await?;
    trace!("🗃️ Order {order_id}: {} items marked {status}", item_ids.len());
    Ok(())
}
