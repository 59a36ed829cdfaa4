use sog_common::Money;

use crate::{
    db_types::{ItemStatus, NewOrder, NewOrderItem, Order, OrderId, OrderItem, OrderSnapshot, OrderTransition},
    traits::StoreError,
};

/// The `OrderManagement` trait defines behaviour for reading and mutating orders and their line items.
///
/// All mutations that touch line items recompute `line_total` for the affected items and the order's `subtotal` and
/// `total_amount` in the same transaction, so the totals are never observed out of step with the items.
///
/// Status changes go exclusively through [`OrderManagement::transition_order`].
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError>;

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, StoreError>;

    /// Loads the order, its items joined with their products, the supplier and the owner's credential at that
    /// supplier. Returns `None` if the order does not exist.
    async fn fetch_order_snapshot(&self, order_id: &OrderId) -> Result<Option<OrderSnapshot>, StoreError>;

    /// All orders sharing the given batch id, oldest first.
    async fn fetch_orders_for_batch(&self, batch_id: &str) -> Result<Vec<Order>, StoreError>;

    /// Orders for the user that have not been submitted, cancelled or confirmed.
    async fn fetch_open_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, StoreError>;

    /// Adds a line to an editable order. If the product is already on the order, the quantities are merged.
    async fn add_order_item(&self, order_id: &OrderId, item: NewOrderItem) -> Result<Order, StoreError>;

    async fn remove_order_items(&self, order_id: &OrderId, item_ids: &[i64]) -> Result<Order, StoreError>;

    /// Removes items from an order regardless of its status. Used by the placement pipeline to drop unavailable
    /// items from an order it has already claimed.
    async fn prune_order_items(&self, order_id: &OrderId, item_ids: &[i64]) -> Result<Order, StoreError>;

    async fn update_item_quantity(&self, order_id: &OrderId, item_id: i64, quantity: i64) -> Result<Order, StoreError>;

    /// Replaces the unit price of the given items (e.g. after the user accepted a price change) and recomputes totals.
    async fn reprice_order_items(&self, order_id: &OrderId, prices: &[(i64, Money)]) -> Result<Order, StoreError>;

    /// Records the live price seen for each item. Unit prices and totals are left untouched.
    async fn set_verified_prices(&self, order_id: &OrderId, prices: &[(i64, Money)]) -> Result<(), StoreError>;

    async fn set_item_status(&self, order_id: &OrderId, item_ids: &[i64], status: ItemStatus) -> Result<(), StoreError>;

    /// Deletes an order. Only pending orders without items may be deleted.
    async fn delete_order(&self, order_id: &OrderId) -> Result<(), StoreError>;

    /// Atomically applies the state change, provided the order is currently in one of the transition's allowed source
    /// states. Otherwise [`StoreError::InvalidTransition`] is returned and nothing is written.
    async fn transition_order(&self, order_id: &OrderId, transition: OrderTransition) -> Result<Order, StoreError>;
}
