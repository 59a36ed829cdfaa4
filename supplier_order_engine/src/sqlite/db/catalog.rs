use chrono::{DateTime, Utc};
use log::{debug, trace};
use sog_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db_types::{
        CredentialStatus,
        NewSupplier,
        NewSupplierCredential,
        NewSupplierProduct,
        Supplier,
        SupplierCredential,
        SupplierProduct,
    },
    traits::StoreError,
};

pub async fn insert_supplier(supplier: NewSupplier, conn: &mut SqliteConnection) -> Result<Supplier, StoreError> {
    let supplier: Supplier = sqlx::query_as(
        r#"
        INSERT INTO suppliers (
            name,
            website_url,
            order_minimum,
            cutoff_time,
            order_lead_days,
            delivery_days,
            supports_password_login
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *;
        "#,
    )
    .bind(supplier.name)
    .bind(supplier.website_url)
    .bind(supplier.order_minimum)
    .bind(supplier.cutoff_time)
    .bind(supplier.order_lead_days)
    .bind(supplier.delivery_days.to_string())
    .bind(supplier.supports_password_login)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Supplier {} ({}) created", supplier.id, supplier.name);
    Ok(supplier)
}

pub async fn fetch_supplier(supplier_id: i64, conn: &mut SqliteConnection) -> Result<Option<Supplier>, StoreError> {
    let supplier =
        sqlx::query_as("SELECT * FROM suppliers WHERE id = $1").bind(supplier_id).fetch_optional(conn).await?;
    Ok(supplier)
}

pub async fn insert_product(
    product: NewSupplierProduct,
    conn: &mut SqliteConnection,
) -> Result<SupplierProduct, StoreError> {
    let product: SupplierProduct = sqlx::query_as(
        r#"
        INSERT INTO supplier_products (
            supplier_id,
            sku,
            name,
            current_price,
            in_stock,
            min_quantity,
            max_quantity,
            price_updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *;
        "#,
    )
    .bind(product.supplier_id)
    .bind(product.sku)
    .bind(product.name)
    .bind(product.current_price)
    .bind(product.in_stock)
    .bind(product.min_quantity)
    .bind(product.max_quantity)
    .bind(product.price_updated_at)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Product {} [{}] created at {}", product.id, product.sku, product.current_price);
    Ok(product)
}

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<SupplierProduct>, StoreError> {
    let product =
        sqlx::query_as("SELECT * FROM supplier_products WHERE id = $1").bind(product_id).fetch_optional(conn).await?;
    Ok(product)
}

pub async fn fetch_product_by_sku(
    supplier_id: i64,
    sku: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<SupplierProduct>, StoreError> {
    let product = sqlx::query_as("SELECT * FROM supplier_products WHERE supplier_id = $1 AND sku = $2")
        .bind(supplier_id)
        .bind(sku)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

pub async fn update_product_price(
    product_id: i64,
    price: Money,
    in_stock: Option<bool>,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE supplier_products SET current_price = $1, in_stock = COALESCE($2, in_stock), price_updated_at = $3 \
         WHERE id = $4",
    )
    .bind(price)
    .bind(in_stock)
    .bind(at)
    .bind(product_id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::ProductNotFound(product_id));
    }
    trace!("🗃️ Product {product_id} repriced at {price}");
    Ok(())
}

pub async fn update_product_stock(
    product_id: i64,
    in_stock: bool,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE supplier_products SET in_stock = $1 WHERE id = $2")
        .bind(in_stock)
        .bind(product_id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::ProductNotFound(product_id));
    }
    Ok(())
}

pub async fn insert_credential(
    credential: NewSupplierCredential,
    conn: &mut SqliteConnection,
) -> Result<SupplierCredential, StoreError> {
    let now = Utc::now();
    let credential: SupplierCredential = sqlx::query_as(
        r#"
        INSERT INTO supplier_credentials (user_id, supplier_id, username, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        RETURNING *;
        "#,
    )
    .bind(credential.user_id)
    .bind(credential.supplier_id)
    .bind(credential.username)
    .bind(credential.status)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Credential {} created for user {}", credential.id, credential.user_id);
    Ok(credential)
}

pub async fn fetch_credential(
    credential_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<SupplierCredential>, StoreError> {
    let credential = sqlx::query_as("SELECT * FROM supplier_credentials WHERE id = $1")
        .bind(credential_id)
        .fetch_optional(conn)
        .await?;
    Ok(credential)
}

pub async fn fetch_credential_for_supplier(
    user_id: i64,
    supplier_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<SupplierCredential>, StoreError> {
    let credential = sqlx::query_as(
        "SELECT * FROM supplier_credentials WHERE user_id = $1 AND supplier_id = $2 ORDER BY created_at DESC, id DESC \
         LIMIT 1",
    )
    .bind(user_id)
    .bind(supplier_id)
    .fetch_optional(conn)
    .await?;
    Ok(credential)
}

pub async fn set_credential_status(
    credential_id: i64,
    status: CredentialStatus,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE supplier_credentials SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(status)
        .bind(Utc::now())
        .bind(credential_id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::CredentialNotFound(credential_id));
    }
    debug!("🗃️ Credential {credential_id} is now {status}");
    Ok(())
}
