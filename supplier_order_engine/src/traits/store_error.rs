use thiserror::Error;

use crate::db_types::{OrderId, OrderStatusType};

/// Errors raised by any of the database backend traits.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order item {0} does not exist on order {1}")]
    ItemNotFound(i64, OrderId),
    #[error("Supplier {0} does not exist")]
    SupplierNotFound(i64),
    #[error("Supplier product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Supplier credential {0} does not exist")]
    CredentialNotFound(i64),
    #[error("Product {product_id} belongs to supplier {product_supplier}, not to the order's supplier {order_supplier}")]
    SupplierMismatch { product_id: i64, product_supplier: i64, order_supplier: i64 },
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition { order_id: OrderId, from: OrderStatusType, to: OrderStatusType },
    #[error("Order {0} cannot be modified while it is {1}")]
    OrderNotEditable(OrderId, OrderStatusType),
    #[error("Order {0} can only be deleted while it is pending and empty")]
    OrderNotDeletable(OrderId),
    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(i64),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}
