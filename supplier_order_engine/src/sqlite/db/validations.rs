use chrono::Utc;
use log::trace;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{NewOrderValidation, OrderId, OrderValidation},
    traits::StoreError,
};

pub async fn insert_validation(validation: &NewOrderValidation, conn: &mut SqliteConnection) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO order_validations (order_id, validation_type, passed, message, details, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(validation.order_id)
    .bind(validation.validation_type)
    .bind(validation.passed)
    .bind(&validation.message)
    .bind(Json(&validation.details))
    .bind(Utc::now())
    .execute(conn)
    .await?;
    trace!(
        "🗃️ Recorded {} {} for order {}",
        if validation.passed { "warning" } else { "error" },
        validation.validation_type,
        validation.order_id
    );
    Ok(())
}

pub async fn fetch_validations(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderValidation>, StoreError> {
    let rows = sqlx::query_as("SELECT * FROM order_validations WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}
