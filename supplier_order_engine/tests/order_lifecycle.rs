use std::{rc::Rc, sync::Arc, time::Duration};

use chrono::Weekday;
use sog_common::Money;
use supplier_order_engine::{
    db_types::{NewOrder, NewOrderItem, NewSupplier, Order, OrderStatusType, OrderTransition, SupplierProduct},
    order_objects::{BranchResult, PlacementOptions},
    task_queue::{credential_key, TaskQueue},
    test_utils::{Capability, FakeSupplier, TestEngine},
    EngineJobRunner,
    OrderApiError,
    OrderManagement,
    PlacementApi,
    PriceVerificationApi,
    StoreError,
};
use tokio::task::LocalSet;

const USER: i64 = 3;

const EVERY_DAY: [Weekday; 7] =
    [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri, Weekday::Sat, Weekday::Sun];

async fn setup() -> (TestEngine, i64, Vec<SupplierProduct>) {
    let engine = TestEngine::new(FakeSupplier::new()).await;
    let supplier = NewSupplier::new("Northside Dairy", "https://northside.example.com").with_delivery_days(&EVERY_DAY);
    let (supplier, products) = engine
        .seed_supplier(supplier, &[("MILK", Money::from_cents(325)), ("CREAM", Money::from_cents(610))])
        .await;
    (engine, supplier.id, products)
}

async fn reload(engine: &TestEngine, order: &Order) -> Order {
    engine.db.fetch_order(&order.id).await.unwrap().unwrap()
}

#[tokio::test]
async fn building_an_order_keeps_totals_current() {
    let (engine, supplier_id, products) = setup().await;
    let api = engine.orders();
    let order = api.create_order(NewOrder::new(USER, supplier_id).with_tax(Money::from_cents(50))).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.total_amount, Money::from_cents(50));

    api.add_item(&order.id, NewOrderItem::new(products[0].id, 2)).await.unwrap();
    let order = api.add_item(&order.id, NewOrderItem::new(products[1].id, 1)).await.unwrap();
    assert_eq!(order.subtotal, Money::from_cents(1260));
    assert_eq!(order.total_amount, Money::from_cents(1310));

    // Adding the same product again merges into the existing line.
    let order = api.add_item(&order.id, NewOrderItem::new(products[0].id, 1)).await.unwrap();
    let items = api.order_items(USER, &order.id).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].quantity, 3);
    assert_eq!(items[0].line_total, Money::from_cents(975));
    assert_eq!(order.subtotal, Money::from_cents(1585));

    let order = api.update_quantity(&order.id, items[1].id, 4).await.unwrap();
    assert_eq!(order.subtotal, Money::from_cents(975 + 2440));

    let order = api.remove_items(&order.id, &[items[0].id]).await.unwrap();
    assert_eq!(order.subtotal, Money::from_cents(2440));
    assert_eq!(order.total_amount, Money::from_cents(2490));
    engine.teardown().await;
}

#[tokio::test]
async fn item_edits_are_checked() {
    let (engine, supplier_id, products) = setup().await;
    let api = engine.orders();
    let order = api.create_order(NewOrder::new(USER, supplier_id)).await.unwrap();

    let err = api.add_item(&order.id, NewOrderItem::new(products[0].id, 0)).await.unwrap_err();
    assert!(matches!(err, OrderApiError::Store(StoreError::InvalidQuantity(0))));

    let other = NewSupplier::new("Eastgate Bakery", "https://eastgate.example.com");
    let (other, bread) = engine.seed_supplier(other, &[("BREAD", Money::from_dollars(4))]).await;
    let err = api.add_item(&order.id, NewOrderItem::new(bread[0].id, 1)).await.unwrap_err();
    match err {
        OrderApiError::Store(StoreError::SupplierMismatch { product_supplier, order_supplier, .. }) => {
            assert_eq!(product_supplier, other.id);
            assert_eq!(order_supplier, supplier_id);
        },
        e => panic!("Unexpected error: {e}"),
    }

    let order = api.add_item(&order.id, NewOrderItem::new(products[0].id, 1)).await.unwrap();
    let err = api.update_quantity(&order.id, 9999, 2).await.unwrap_err();
    assert!(matches!(err, OrderApiError::Store(StoreError::ItemNotFound(9999, _))));
    engine.teardown().await;
}

#[tokio::test]
async fn only_empty_pending_orders_can_be_deleted() {
    let (engine, supplier_id, products) = setup().await;
    let api = engine.orders();
    let order = engine.seed_order(NewOrder::new(USER, supplier_id), &[(products[0].id, 1)]).await;

    let err = api.delete_order(&order.id).await.unwrap_err();
    assert!(matches!(err, OrderApiError::Store(StoreError::OrderNotDeletable(_))));

    let items = api.order_items(USER, &order.id).await.unwrap();
    api.remove_items(&order.id, &[items[0].id]).await.unwrap();
    api.delete_order(&order.id).await.unwrap();
    assert!(engine.db.fetch_order(&order.id).await.unwrap().is_none());

    let err = api.delete_order(&order.id).await.unwrap_err();
    assert!(matches!(err, OrderApiError::Store(StoreError::OrderNotFound(_))));
    engine.teardown().await;
}

#[tokio::test]
async fn orders_are_private_to_their_user() {
    let (engine, supplier_id, products) = setup().await;
    let api = engine.orders();
    let order = engine.seed_order(NewOrder::new(USER, supplier_id), &[(products[0].id, 1)]).await;

    assert!(api.order_for_user(USER, &order.id).await.is_ok());
    let err = api.order_for_user(USER + 1, &order.id).await.unwrap_err();
    assert!(matches!(err, OrderApiError::OrderNotFound(id) if id == order.id));
    assert!(matches!(api.order_status(USER + 1, &order.id).await, Err(OrderApiError::OrderNotFound(_))));
    assert!(matches!(api.cancel_order(USER + 1, &order.id).await, Err(OrderApiError::OrderNotFound(_))));
    assert_eq!(reload(&engine, &order).await.status, OrderStatusType::Pending);
    engine.teardown().await;
}

#[tokio::test]
async fn in_flight_orders_cannot_be_edited_or_cancelled() {
    let (engine, supplier_id, products) = setup().await;
    let api = engine.orders();
    let order = engine.seed_order(NewOrder::new(USER, supplier_id), &[(products[0].id, 1)]).await;
    engine.db.transition_order(&order.id, OrderTransition::Processing).await.unwrap();

    let status = api.order_status(USER, &order.id).await.unwrap();
    assert!(status.processing);
    assert_eq!(status.status, OrderStatusType::Processing);

    let err = api.add_item(&order.id, NewOrderItem::new(products[1].id, 1)).await.unwrap_err();
    assert!(matches!(err, OrderApiError::Store(StoreError::OrderNotEditable(_, OrderStatusType::Processing))));
    let err = api.cancel_order(USER, &order.id).await.unwrap_err();
    assert!(matches!(
        err,
        OrderApiError::Store(StoreError::InvalidTransition { from: OrderStatusType::Processing, .. })
    ));
    engine.teardown().await;
}

#[tokio::test]
async fn cancelled_orders_stay_cancelled() {
    let (engine, supplier_id, products) = setup().await;
    let api = engine.orders();
    let order = engine.seed_order(NewOrder::new(USER, supplier_id), &[(products[0].id, 1)]).await;

    let cancelled = api.cancel_order(USER, &order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatusType::Cancelled);
    let err = engine.placement().place_order(&order.id, PlacementOptions::default()).await.unwrap_err();
    assert_eq!(err.to_string(), format!("Order {} cannot be placed while it is cancelled", order.id));
    assert!(engine.supplier_site.calls().is_empty());
    engine.teardown().await;
}

#[tokio::test]
async fn submitted_orders_can_be_confirmed() {
    let (engine, supplier_id, products) = setup().await;
    engine.seed_credential(USER, supplier_id).await;
    let api = engine.orders();
    let order = engine.seed_order(NewOrder::new(USER, supplier_id), &[(products[0].id, 4)]).await;

    let err = api.confirm_order(&order.id).await.unwrap_err();
    assert!(matches!(err, OrderApiError::Store(StoreError::InvalidTransition { from: OrderStatusType::Pending, .. })));

    engine.placement().place_order(&order.id, PlacementOptions::default()).await.unwrap();
    let status = api.order_status(USER, &order.id).await.unwrap();
    assert!(!status.processing);
    assert_eq!(status.status, OrderStatusType::Submitted);
    assert_eq!(status.confirmation_number.as_deref(), Some("CONF-0001"));
    assert_eq!(status.total_amount, Money::from_cents(1300));

    let confirmed = api.confirm_order(&order.id).await.unwrap();
    assert_eq!(confirmed.status, OrderStatusType::Confirmed);
    assert_eq!(confirmed.confirmation_number.as_deref(), Some("CONF-0001"));
    let err = api.cancel_order(USER, &order.id).await.unwrap_err();
    assert!(matches!(err, OrderApiError::Store(StoreError::InvalidTransition { .. })));
    engine.teardown().await;
}

#[tokio::test]
async fn validation_history_is_visible_to_the_owner() {
    let (engine, supplier_id, products) = setup().await;
    let api = engine.orders();
    // No linked account, so validation fails.
    let order = engine.seed_order(NewOrder::new(USER, supplier_id), &[(products[0].id, 1)]).await;
    engine.placement().place_order(&order.id, PlacementOptions::default()).await.unwrap();

    let validations = api.validations(USER, &order.id).await.unwrap();
    assert!(!validations.is_empty());
    assert!(validations.iter().any(|v| !v.passed));
    assert!(matches!(api.validations(USER + 1, &order.id).await, Err(OrderApiError::OrderNotFound(_))));
    let status = api.order_status(USER, &order.id).await.unwrap();
    assert_eq!(status.status, OrderStatusType::Failed);
    assert!(status.error_message.is_some());
    engine.teardown().await;
}

async fn wait_for_status(engine: &TestEngine, order: &Order, status: OrderStatusType) -> Order {
    for _ in 0..250 {
        let current = reload(engine, order).await;
        if current.status == status {
            return current;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("Order {} never reached {status}", order.id);
}

#[tokio::test]
async fn queued_placements_run_one_at_a_time_per_account() {
    let (engine, supplier_id, products) = setup().await;
    let credential = engine.seed_credential(USER, supplier_id).await;
    engine.supplier_site.delay(Capability::Checkout, Duration::from_millis(50));
    let first = engine.seed_order(NewOrder::new(USER, supplier_id), &[(products[0].id, 2)]).await;
    let second = engine.seed_order(NewOrder::new(USER, supplier_id), &[(products[1].id, 1)]).await;

    let (queue, handle) = TaskQueue::new();
    let mut ctx = engine.ctx.clone();
    ctx.scheduler = Arc::new(handle);
    let placement = PlacementApi::new(ctx.clone());
    let runner = Rc::new(EngineJobRunner::new(ctx));

    let local = LocalSet::new();
    local
        .run_until(async {
            tokio::task::spawn_local(queue.run(runner));
            let job = placement.schedule_placement(&first.id, PlacementOptions::default()).await.unwrap();
            assert_eq!(job.concurrency_key, Some(credential_key(credential.id)));
            placement.schedule_placement(&second.id, PlacementOptions::default()).await.unwrap();

            let first = wait_for_status(&engine, &first, OrderStatusType::Submitted).await;
            let second = wait_for_status(&engine, &second, OrderStatusType::Submitted).await;
            assert_ne!(first.confirmation_number, second.confirmation_number);
        })
        .await;

    assert_eq!(engine.supplier_site.count(Capability::Checkout), 2);
    engine.teardown().await;
}

#[tokio::test]
async fn a_price_refresh_waits_for_a_checkout_on_the_same_account() {
    let (engine, supplier_id, products) = setup().await;
    engine.seed_credential(USER, supplier_id).await;
    engine.supplier_site.enable(Capability::ScrapePrices);
    engine.supplier_site.set_price("MILK", Money::from_cents(325)).set_price("CREAM", Money::from_cents(610));
    engine.supplier_site.delay(Capability::Checkout, Duration::from_millis(300));
    let placed = engine.seed_order(NewOrder::new(USER, supplier_id), &[(products[0].id, 2)]).await;
    engine.seed_order(NewOrder::new(USER, supplier_id), &[(products[1].id, 1)]).await;

    let (queue, handle) = TaskQueue::new();
    let mut ctx = engine.ctx.clone().with_locks(queue.locks());
    ctx.scheduler = Arc::new(handle);
    let placement = PlacementApi::new(ctx.clone());
    let prices = PriceVerificationApi::new(ctx.clone());
    let runner = Rc::new(EngineJobRunner::new(ctx));

    let local = LocalSet::new();
    local
        .run_until(async {
            tokio::task::spawn_local(queue.run(runner));
            placement.schedule_placement(&placed.id, PlacementOptions::default()).await.unwrap();
            wait_for_status(&engine, &placed, OrderStatusType::Processing).await;

            let report = prices.quick_refresh(USER).await.unwrap();
            assert!(matches!(report.branches[0].result, BranchResult::Refreshed { .. }), "{report:?}");
            // The refresh only got the account once the placement had finished with it.
            assert_eq!(reload(&engine, &placed).await.status, OrderStatusType::Submitted);
        })
        .await;

    let log = engine.supplier_site.capability_log();
    let checkout = log.iter().position(|c| *c == Capability::Checkout).unwrap();
    let scrape = log.iter().position(|c| *c == Capability::ScrapePrices).unwrap();
    assert!(checkout < scrape, "{log:?}");
    assert_eq!(log.iter().filter(|c| **c == Capability::Checkout).count(), 1);
    engine.teardown().await;
}
