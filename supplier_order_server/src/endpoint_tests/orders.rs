use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use serde_json::json;
use sog_common::Money;
use supplier_order_engine::{
    db_types::{
        Json,
        Order,
        OrderId,
        OrderStatusType,
        OrderTransition,
        OrderValidation,
        ValidationType,
        VerificationStatus,
    },
    order_objects::OrderStatusView,
    traits::StoreError,
    OrderApi,
};

use super::helpers::{get_request, json, post_request};
use crate::{
    endpoint_tests::mocks::MockOrderStore,
    routes::{CancelOrderRoute, OrderStatusRoute, OrderValidationsRoute},
};

const OWNER: i64 = 7;

#[actix_web::test]
async fn status_without_a_user_is_unauthorized() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(None, "/api/orders/5/status", configure(order(OrderStatusType::Pending))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json(&body)["error"], "No user id was provided in the sog_user_id header");
}

#[actix_web::test]
async fn status_of_my_order() {
    let _ = env_logger::try_init().ok();
    let mut order = order(OrderStatusType::Submitted);
    order.confirmation_number = Some("BAY-77120".into());
    order.total_amount = Money::from_cents(48_250);
    let (status, body) = get_request(Some(OWNER), "/api/orders/5/status", configure(order)).await;
    assert_eq!(status, StatusCode::OK);
    let view: OrderStatusView = serde_json::from_str(&body).unwrap();
    assert!(!view.processing);
    assert_eq!(view.status, OrderStatusType::Submitted);
    assert_eq!(view.confirmation_number.as_deref(), Some("BAY-77120"));
    assert_eq!(view.total_amount, Money::from_cents(48_250));
    assert_eq!(view.error_message, None);
}

#[actix_web::test]
async fn status_while_processing() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request(Some(OWNER), "/api/orders/5/status", configure(order(OrderStatusType::Processing))).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["processing"], true);
    assert_eq!(body["status"], "processing");
}

#[actix_web::test]
async fn other_users_orders_are_not_found() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request(Some(OWNER + 1), "/api/orders/5/status", configure(order(OrderStatusType::Pending))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body)["error"], "The data was not found. Order #5 does not exist");

    let (status, _) =
        get_request(Some(OWNER + 1), "/api/orders/5/validations", configure(order(OrderStatusType::Pending))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn validation_history() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request(Some(OWNER), "/api/orders/5/validations", configure(order(OrderStatusType::Failed))).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["validation_type"], "order_minimum");
    assert_eq!(rows[0]["passed"], false);
    assert_eq!(rows[0]["details"]["difference"], "21.50");
    assert_eq!(rows[1]["validation_type"], "cutoff_approaching");
    assert_eq!(rows[1]["passed"], true);
}

#[actix_web::test]
async fn cancel_a_pending_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request(Some(OWNER), "/api/orders/5/cancel", None, configure(order(OrderStatusType::Pending))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "cancelled");
}

#[actix_web::test]
async fn submitted_orders_cannot_be_cancelled() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request(Some(OWNER), "/api/orders/5/cancel", None, configure(order(OrderStatusType::Submitted))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json(&body)["error"], "Order #5 cannot move from submitted to cancelled");
}

#[actix_web::test]
async fn garbage_user_ids_are_rejected() {
    let _ = env_logger::try_init().ok();
    let req = actix_web::test::TestRequest::get()
        .uri("/api/orders/5/status")
        .insert_header(("sog_user_id", "admin"))
        .to_request();
    let app = actix_web::test::init_service(actix_web::App::new().configure(configure(order(OrderStatusType::Pending))))
        .await;
    let res = actix_web::test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

/// Serves a single order (#5, owned by [`OWNER`]) from a mock store. Cancelling it follows the real transition rules.
fn configure(order: Order) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let mut store = MockOrderStore::new();
        let fetched = order.clone();
        store.expect_fetch_order().returning(move |_| Ok(Some(fetched.clone())));
        store.expect_fetch_validations().returning(|id| Ok(validations(*id)));
        store.expect_transition_order().returning(move |id, transition| {
            if transition != OrderTransition::Cancelled || !transition.allowed_from().contains(&order.status) {
                return Err(StoreError::InvalidTransition {
                    order_id: *id,
                    from: order.status,
                    to: OrderStatusType::Cancelled,
                });
            }
            Ok(Order { status: OrderStatusType::Cancelled, ..order.clone() })
        });
        let api = OrderApi::new(store);
        cfg.service(
            web::scope("/api")
                .service(OrderStatusRoute::<MockOrderStore>::new())
                .service(OrderValidationsRoute::<MockOrderStore>::new())
                .service(CancelOrderRoute::<MockOrderStore>::new()),
        )
        .app_data(web::Data::new(api));
    }
}

fn order(status: OrderStatusType) -> Order {
    let created = Utc.with_ymd_and_hms(2024, 5, 14, 6, 30, 0).unwrap();
    Order {
        id: OrderId(5),
        user_id: OWNER,
        organization_id: None,
        supplier_id: 2,
        list_id: None,
        batch_id: None,
        subtotal: Money::from_cents(2_850),
        tax: Money::from_cents(0),
        total_amount: Money::from_cents(2_850),
        savings: Money::from_cents(0),
        verified_total: None,
        price_change_amount: None,
        status,
        verification_status: VerificationStatus::Unverified,
        verification_message: None,
        confirmation_number: None,
        submitted_at: None,
        error_message: None,
        delivery_date: None,
        created_at: created,
        updated_at: created,
    }
}

fn validations(order_id: OrderId) -> Vec<OrderValidation> {
    let at = Utc.with_ymd_and_hms(2024, 5, 14, 6, 31, 0).unwrap();
    vec![
        OrderValidation {
            id: 1,
            order_id,
            validation_type: ValidationType::OrderMinimum,
            passed: false,
            message: "Order total $28.50 is below the $50.00 minimum. Add $21.50 more".into(),
            details: Json(json!({ "minimum": "50.00", "current": "28.50", "difference": "21.50" })),
            created_at: at,
        },
        OrderValidation {
            id: 2,
            order_id,
            validation_type: ValidationType::CutoffApproaching,
            passed: true,
            message: "Order cutoff is in 45 minutes".into(),
            details: Json(json!({ "minutes_remaining": 45 })),
            created_at: at,
        },
    ]
}
