use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewOrder, NewOrderItem, Order, OrderId, OrderItem, OrderTransition, OrderValidation},
    soe_api::{errors::OrderApiError, order_objects::OrderStatusView},
    traits::{OrderManagement, ValidationLog},
};

/// `OrderApi` is the order-building and order-tracking surface: creating orders, editing their lines, cancelling
/// them and reporting on their progress. Placement itself lives in [`PlacementApi`](crate::PlacementApi).
pub struct OrderApi<B> {
    db: B,
}

impl<B> Debug for OrderApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderApi")
    }
}

impl<B> OrderApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderApi<B>
where B: OrderManagement
{
    pub async fn create_order(&self, order: NewOrder) -> Result<Order, OrderApiError> {
        let order = self.db.insert_order(order).await?;
        info!("🧾️ Order {} created for user {} at supplier {}", order.id, order.user_id, order.supplier_id);
        Ok(order)
    }

    pub async fn add_item(&self, order_id: &OrderId, item: NewOrderItem) -> Result<Order, OrderApiError> {
        Ok(self.db.add_order_item(order_id, item).await?)
    }

    pub async fn remove_items(&self, order_id: &OrderId, item_ids: &[i64]) -> Result<Order, OrderApiError> {
        Ok(self.db.remove_order_items(order_id, item_ids).await?)
    }

    pub async fn update_quantity(&self, order_id: &OrderId, item_id: i64, quantity: i64) -> Result<Order, OrderApiError> {
        Ok(self.db.update_item_quantity(order_id, item_id, quantity).await?)
    }

    pub async fn delete_order(&self, order_id: &OrderId) -> Result<(), OrderApiError> {
        self.db.delete_order(order_id).await?;
        info!("🧾️ Order {order_id} deleted");
        Ok(())
    }

    /// Fetches the order, provided it belongs to `user_id`.
    pub async fn order_for_user(&self, user_id: i64, order_id: &OrderId) -> Result<Order, OrderApiError> {
        self.db
            .fetch_order(order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or(OrderApiError::OrderNotFound(*order_id))
    }

    pub async fn order_items(&self, user_id: i64, order_id: &OrderId) -> Result<Vec<OrderItem>, OrderApiError> {
        self.order_for_user(user_id, order_id).await?;
        Ok(self.db.fetch_order_items(order_id).await?)
    }

    /// The polling view of an order's progress.
    pub async fn order_status(&self, user_id: i64, order_id: &OrderId) -> Result<OrderStatusView, OrderApiError> {
        let order = self.order_for_user(user_id, order_id).await?;
        Ok(OrderStatusView::from(&order))
    }

    /// Cancels an order that has not been submitted. A pending two-factor challenge for the order is left alone; it
    /// will expire or be superseded, and the resumed work will find the order cancelled.
    pub async fn cancel_order(&self, user_id: i64, order_id: &OrderId) -> Result<Order, OrderApiError> {
        self.order_for_user(user_id, order_id).await?;
        let order = self.db.transition_order(order_id, OrderTransition::Cancelled).await?;
        info!("🧾️ Order {order_id} cancelled by user {user_id}");
        Ok(order)
    }

    /// Records the supplier's confirmation of a submitted order.
    pub async fn confirm_order(&self, order_id: &OrderId) -> Result<Order, OrderApiError> {
        let order = self.db.transition_order(order_id, OrderTransition::Confirmed).await?;
        info!("🧾️ Order {order_id} confirmed by the supplier");
        Ok(order)
    }
}

impl<B> OrderApi<B>
where B: OrderManagement + ValidationLog
{
    /// The validation log for the order, oldest first.
    pub async fn validations(&self, user_id: i64, order_id: &OrderId) -> Result<Vec<OrderValidation>, OrderApiError> {
        self.order_for_user(user_id, order_id).await?;
        Ok(self.db.fetch_validations(order_id).await?)
    }
}
