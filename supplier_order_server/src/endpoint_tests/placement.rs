use actix_web::http::StatusCode;
use chrono::Weekday;
use serde_json::json;
use sog_common::Money;
use supplier_order_engine::{
    db_types::{NewOrder, NewSupplier, Order, OrderStatusType, SupplierCredential},
    task_queue::{credential_key, JobKind},
    test_utils::{FakeSupplier, TestEngine},
    OrderManagement,
};

use super::helpers::{engine_routes, get_request, json, post_request};

const BUYER: i64 = 21;

const EVERY_DAY: [Weekday; 7] =
    [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri, Weekday::Sat, Weekday::Sun];

async fn setup() -> (TestEngine, SupplierCredential, Order) {
    let _ = env_logger::try_init().ok();
    let engine = TestEngine::new(FakeSupplier::full()).await;
    let supplier = NewSupplier::new("Riverside Produce", "https://riverside.example.com").with_delivery_days(&EVERY_DAY);
    let (supplier, products) = engine
        .seed_supplier(supplier, &[("LEMON", Money::from_cents(95)), ("LIME", Money::from_cents(80))])
        .await;
    let credential = engine.seed_credential(BUYER, supplier.id).await;
    let order = engine.seed_order(NewOrder::new(BUYER, supplier.id), &[(products[0].id, 40), (products[1].id, 20)]).await;
    (engine, credential, order)
}

#[actix_web::test]
async fn submitting_queues_a_placement_for_the_account() {
    let (engine, credential, order) = setup().await;
    let path = format!("/api/orders/{}/submit", order.id.0);
    let body = json!({ "skip_warnings": true });
    let (status, body) = post_request(Some(BUYER), &path, Some(body), engine_routes(&engine)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let body = json(&body);
    assert_eq!(body["job"]["job"], "place_order");
    assert_eq!(body["job"]["options"]["skip_warnings"], true);
    assert_eq!(body["job"]["options"]["accept_price_changes"], false);
    assert_eq!(body["concurrency_key"], credential_key(credential.id));

    let jobs = engine.scheduler.jobs();
    assert_eq!(jobs.len(), 1);
    assert!(matches!(&jobs[0].kind, JobKind::PlaceOrder { order_id, options } if *order_id == order.id && options.skip_warnings));
    // Nothing happens until the queue runs the job.
    let current = engine.db.fetch_order(&order.id).await.unwrap().unwrap();
    assert_eq!(current.status, OrderStatusType::Pending);
    assert!(engine.supplier_site.calls().is_empty());
    engine.teardown().await;
}

#[actix_web::test]
async fn submitting_without_a_body_uses_the_defaults() {
    let (engine, _, order) = setup().await;
    let path = format!("/api/orders/{}/submit", order.id.0);
    let (status, _) = post_request(Some(BUYER), &path, None, engine_routes(&engine)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let jobs = engine.scheduler.jobs();
    assert!(matches!(&jobs[0].kind, JobKind::PlaceOrder { options, .. } if *options == Default::default()));
    engine.teardown().await;
}

#[actix_web::test]
async fn only_the_owner_can_submit() {
    let (engine, _, order) = setup().await;
    let path = format!("/api/orders/{}/submit", order.id.0);
    let (status, _) = post_request(Some(BUYER + 1), &path, None, engine_routes(&engine)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(engine.scheduler.jobs().is_empty());
    engine.teardown().await;
}

#[actix_web::test]
async fn cancelled_orders_are_not_queued() {
    let (engine, _, order) = setup().await;
    let routes = engine_routes(&engine);
    let (status, _) = post_request(Some(BUYER), &format!("/api/orders/{}/cancel", order.id.0), None, routes).await;
    assert_eq!(status, StatusCode::OK);

    let path = format!("/api/orders/{}/submit", order.id.0);
    let (status, body) = post_request(Some(BUYER), &path, None, engine_routes(&engine)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json(&body)["error"], format!("Order {} cannot be placed while it is cancelled", order.id));
    assert!(engine.scheduler.jobs().is_empty());
    engine.teardown().await;
}

#[actix_web::test]
async fn price_checks_are_queued() {
    let (engine, credential, order) = setup().await;
    let path = format!("/api/orders/{}/verify_prices", order.id.0);
    let (status, body) = post_request(Some(BUYER), &path, None, engine_routes(&engine)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let body = json(&body);
    assert_eq!(body["job"]["job"], "verify_prices");
    assert_eq!(body["concurrency_key"], credential_key(credential.id));
    engine.teardown().await;
}

#[actix_web::test]
async fn skipping_verification_uses_cached_prices() {
    let (engine, _, order) = setup().await;
    let path = format!("/api/orders/{}/skip_verification", order.id.0);
    let body = json!({ "reason": "supplier site is down" });
    let (status, body) = post_request(Some(BUYER), &path, Some(body), engine_routes(&engine)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["status"], "skipped");
    assert_eq!(body["used_cache"], true);
    assert!(engine.supplier_site.calls().is_empty());

    let path = format!("/api/orders/{}/status", order.id.0);
    let (status, body) = get_request(Some(BUYER), &path, engine_routes(&engine)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["verification_status"], "skipped");
    engine.teardown().await;
}

#[actix_web::test]
async fn quick_refresh_is_not_tied_to_an_account() {
    let (engine, _, _) = setup().await;
    let (status, body) = post_request(Some(BUYER), "/api/prices/refresh", None, engine_routes(&engine)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let body = json(&body);
    assert_eq!(body["job"]["job"], "quick_refresh");
    assert_eq!(body["job"]["user_id"], BUYER);
    assert!(body["concurrency_key"].is_null());
    engine.teardown().await;
}
