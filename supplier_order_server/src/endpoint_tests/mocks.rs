use mockall::mock;
use sog_common::Money;
use supplier_order_engine::{
    db_types::{
        ItemStatus,
        NewOrder,
        NewOrderItem,
        NewOrderValidation,
        Order,
        OrderId,
        OrderItem,
        OrderSnapshot,
        OrderTransition,
        OrderValidation,
    },
    traits::{OrderManagement, StoreError, ValidationLog},
};

mock! {
    pub OrderStore {}
    impl OrderManagement for OrderStore {
        async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError>;
        async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError>;
        async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, StoreError>;
        async fn fetch_order_snapshot(&self, order_id: &OrderId) -> Result<Option<OrderSnapshot>, StoreError>;
        async fn fetch_orders_for_batch(&self, batch_id: &str) -> Result<Vec<Order>, StoreError>;
        async fn fetch_open_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, StoreError>;
        async fn add_order_item(&self, order_id: &OrderId, item: NewOrderItem) -> Result<Order, StoreError>;
        async fn remove_order_items(&self, order_id: &OrderId, item_ids: &[i64]) -> Result<Order, StoreError>;
        async fn prune_order_items(&self, order_id: &OrderId, item_ids: &[i64]) -> Result<Order, StoreError>;
        async fn update_item_quantity(&self, order_id: &OrderId, item_id: i64, quantity: i64) -> Result<Order, StoreError>;
        async fn reprice_order_items(&self, order_id: &OrderId, prices: &[(i64, Money)]) -> Result<Order, StoreError>;
        async fn set_verified_prices(&self, order_id: &OrderId, prices: &[(i64, Money)]) -> Result<(), StoreError>;
        async fn set_item_status(&self, order_id: &OrderId, item_ids: &[i64], status: ItemStatus) -> Result<(), StoreError>;
        async fn delete_order(&self, order_id: &OrderId) -> Result<(), StoreError>;
        async fn transition_order(&self, order_id: &OrderId, transition: OrderTransition) -> Result<Order, StoreError>;
    }
    impl ValidationLog for OrderStore {
        async fn record_validations(&self, validations: &[NewOrderValidation]) -> Result<(), StoreError>;
        async fn fetch_validations(&self, order_id: &OrderId) -> Result<Vec<OrderValidation>, StoreError>;
    }
}
