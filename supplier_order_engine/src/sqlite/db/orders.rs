use chrono::Utc;
use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType, OrderTransition},
    traits::StoreError,
};

pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, StoreError> {
    let now = Utc::now();
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                user_id,
                organization_id,
                supplier_id,
                list_id,
                batch_id,
                tax,
                total_amount,
                savings,
                delivery_date,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $6, $7, $8, $9, $9)
            RETURNING *;
        "#,
    )
    .bind(order.user_id)
    .bind(order.organization_id)
    .bind(order.supplier_id)
    .bind(order.list_id)
    .bind(order.batch_id)
    .bind(order.tax)
    .bind(order.savings)
    .bind(order.delivery_date)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Order {} created for user {} at supplier {}", order.id, order.user_id, order.supplier_id);
    Ok(order)
}

pub async fn fetch_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, StoreError> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

/// Like [`fetch_order`], but a missing order is an error.
pub async fn fetch_existing_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Order, StoreError> {
    fetch_order(order_id, conn).await?.ok_or(StoreError::OrderNotFound(*order_id))
}

pub async fn fetch_orders_for_batch(batch_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Order>, StoreError> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE batch_id = $1 ORDER BY created_at ASC, id ASC")
        .bind(batch_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

pub async fn fetch_open_orders_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Order>, StoreError> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM orders WHERE user_id = ");
    builder.push_bind(user_id);
    builder.push(" AND status NOT IN (");
    let mut statuses = builder.separated(", ");
    for status in [OrderStatusType::Submitted, OrderStatusType::Confirmed, OrderStatusType::Cancelled] {
        statuses.push_bind(status);
    }
    statuses.push_unseparated(") ORDER BY created_at ASC, id ASC");
    let orders = builder.build_query_as().fetch_all(conn).await?;
    Ok(orders)
}

/// Fetches the order and checks that its items may currently be changed.
pub async fn fetch_editable_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Order, StoreError> {
    let order = fetch_existing_order(order_id, conn).await?;
    if order.status.is_editable() {
        Ok(order)
    } else {
        Err(StoreError::OrderNotEditable(order.id, order.status))
    }
}

/// Recomputes `subtotal` and `total_amount` from the current line totals.
pub async fn recompute_totals(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Order, StoreError> {
    let order: Option<Order> = sqlx::query_as(
        r#"
        UPDATE orders SET
            subtotal = (SELECT COALESCE(SUM(line_total), 0) FROM order_items WHERE order_id = $1),
            total_amount = (SELECT COALESCE(SUM(line_total), 0) FROM order_items WHERE order_id = $1) + tax,
            updated_at = $2
        WHERE id = $1
        RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(Utc::now())
    .fetch_optional(conn)
    .await?;
    let order = order.ok_or(StoreError::OrderNotFound(*order_id))?;
    trace!("🗃️ Order {order_id} totals recomputed. Subtotal {}, total {}", order.subtotal, order.total_amount);
    Ok(order)
}

pub async fn delete_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        DELETE FROM orders
        WHERE id = $1 AND status = $2 AND NOT EXISTS (SELECT 1 FROM order_items WHERE order_id = $1)
        "#,
    )
    .bind(order_id)
    .bind(OrderStatusType::Pending)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        fetch_existing_order(order_id, conn).await?;
        return Err(StoreError::OrderNotDeletable(*order_id));
    }
    debug!("🗃️ Order {order_id} deleted");
    Ok(())
}

/// Applies the transition as a single conditional `UPDATE`. If the order is not in one of the allowed source states,
/// nothing is written and [`StoreError::InvalidTransition`] describes the conflict.
pub async fn transition_order(
    order_id: &OrderId,
    transition: OrderTransition,
    conn: &mut SqliteConnection,
) -> Result<Order, StoreError> {
    let target = transition.target();
    let allowed = transition.allowed_from();
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE orders SET status = ");
    builder.push_bind(target);
    builder.push(", updated_at = ").push_bind(Utc::now());
    match transition {
        OrderTransition::Processing => {
            builder.push(", error_message = NULL");
        },
        OrderTransition::Submitted { confirmation_number, total, delivery_date, at } => {
            builder.push(", confirmation_number = ").push_bind(confirmation_number);
            builder.push(", total_amount = ").push_bind(total);
            builder.push(", verified_total = ").push_bind(total);
            builder.push(", submitted_at = ").push_bind(at);
            builder.push(", error_message = NULL");
            if let Some(date) = delivery_date {
                builder.push(", delivery_date = ").push_bind(date);
            }
        },
        OrderTransition::Failed { message } |
        OrderTransition::PendingReview { message } |
        OrderTransition::PendingManual { message } => {
            builder.push(", error_message = ").push_bind(message);
        },
        OrderTransition::PriceChanged { verified_total, price_change_amount, message } => {
            builder.push(", verification_status = 'price_changed'");
            builder.push(", verified_total = ").push_bind(verified_total);
            builder.push(", price_change_amount = ").push_bind(price_change_amount);
            builder.push(", verification_message = ").push_bind(message);
        },
        OrderTransition::Verified { outcome, verified_total, price_change_amount, message } => {
            builder.push(", verification_status = ").push_bind(outcome);
            builder.push(", verified_total = ").push_bind(verified_total);
            builder.push(", price_change_amount = ").push_bind(price_change_amount);
            builder.push(", verification_message = ").push_bind(message);
        },
        OrderTransition::Verifying | OrderTransition::Confirmed | OrderTransition::Cancelled => {},
    }
    builder.push(" WHERE id = ").push_bind(*order_id);
    builder.push(" AND status IN (");
    let mut sources = builder.separated(", ");
    for status in allowed {
        sources.push_bind(*status);
    }
    sources.push_unseparated(") RETURNING *");
    let updated: Option<Order> = builder.build_query_as().fetch_optional(&mut *conn).await?;
    match updated {
        Some(order) => {
            debug!("🗃️ Order {order_id} is now {target}");
            Ok(order)
        },
        None => {
            let current = fetch_existing_order(order_id, conn).await?;
            trace!("🗃️ Order {order_id} is {} and cannot move to {target}", current.status);
            Err(StoreError::InvalidTransition { order_id: *order_id, from: current.status, to: target })
        },
    }
}
