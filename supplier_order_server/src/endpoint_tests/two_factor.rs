use actix_web::{http::StatusCode, test, test::TestRequest, App};
use serde_json::json;
use sog_common::Money;
use supplier_order_engine::{
    adapters::TwoFactorPrompt,
    db_types::{NewSupplier, TwoFactorChallenge, TwoFactorKind, TwoFactorRequestType},
    messaging::ServerMessage,
    task_queue::JobKind,
    test_utils::{FakeSupplier, TestEngine},
    ChallengeRequest,
};

use super::helpers::{engine_routes, get_request, json, post_request};
use crate::helpers::USER_ID_HEADER;

const BUYER: i64 = 33;
const CODE: &str = "802114";

async fn setup() -> (TestEngine, TwoFactorChallenge) {
    let _ = env_logger::try_init().ok();
    let site = FakeSupplier::full();
    site.set_valid_code(CODE);
    let engine = TestEngine::new(site).await;
    let (supplier, _) = engine
        .seed_supplier(NewSupplier::new("Hilltop Meats", "https://hilltop.example.com"), &[("BRISKET", Money::from_dollars(38))])
        .await;
    let credential = engine.seed_credential(BUYER, supplier.id).await;
    let prompt = TwoFactorPrompt::new(TwoFactorKind::Email, "Enter the code we emailed to b***@example.com");
    let request = ChallengeRequest::new(&credential, &supplier, TwoFactorRequestType::Login, prompt);
    let challenge = engine.two_factor().open_challenge(request).await.expect("Error opening challenge");
    (engine, challenge)
}

fn code(challenge: &TwoFactorChallenge, code: &str) -> Option<serde_json::Value> {
    Some(json!({ "session_token": challenge.session_token, "code": code }))
}

#[actix_web::test]
async fn correct_code_resumes_the_suspended_work() {
    let (engine, challenge) = setup().await;
    let mut events = engine.bus.subscribe(BUYER);
    let (status, body) =
        post_request(Some(BUYER), "/api/2fa/submit_code", code(&challenge, CODE), engine_routes(&engine)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["type"], "code_result");
    assert_eq!(body["success"], true);

    // The same result goes out on the channel.
    assert_eq!(events.recv().await.unwrap(), ServerMessage::code_accepted());
    let jobs = engine.scheduler.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].kind, JobKind::RefreshSession { credential_id: challenge.credential_id });
    engine.teardown().await;
}

#[actix_web::test]
async fn wrong_codes_report_the_attempts_left() {
    let (engine, challenge) = setup().await;
    let (status, body) =
        post_request(Some(BUYER), "/api/2fa/submit_code", code(&challenge, "000000"), engine_routes(&engine)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["success"], false);
    assert_eq!(body["can_retry"], true);
    assert_eq!(body["attempts_remaining"], 2);
    assert!(engine.scheduler.jobs().is_empty());
    engine.teardown().await;
}

#[actix_web::test]
async fn unknown_and_foreign_tokens_are_not_found() {
    let (engine, challenge) = setup().await;
    let body = Some(json!({ "session_token": "no-such-token", "code": CODE }));
    let (status, _) = post_request(Some(BUYER), "/api/2fa/submit_code", body, engine_routes(&engine)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) =
        post_request(Some(BUYER + 1), "/api/2fa/submit_code", code(&challenge, CODE), engine_routes(&engine)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(engine.supplier_site.calls().is_empty());
    engine.teardown().await;
}

#[actix_web::test]
async fn cancelling_a_challenge() {
    let (engine, challenge) = setup().await;
    let (status, body) = get_request(Some(BUYER), "/api/2fa/pending", engine_routes(&engine)).await;
    assert_eq!(status, StatusCode::OK);
    let pending = json(&body);
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_eq!(pending[0]["session_token"], challenge.session_token.as_str());
    assert!(pending[0].get("submitted_code").is_none());

    let body = Some(json!({ "session_token": challenge.session_token }));
    let (status, reply) = post_request(Some(BUYER), "/api/2fa/cancel", body.clone(), engine_routes(&engine)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&reply)["type"], "cancelled");

    let (_, body_after) = get_request(Some(BUYER), "/api/2fa/pending", engine_routes(&engine)).await;
    assert!(json(&body_after).as_array().unwrap().is_empty());

    let (status, reply) = post_request(Some(BUYER), "/api/2fa/cancel", body, engine_routes(&engine)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json(&reply)["error"], "The verification request is already cancelled");
    engine.teardown().await;
}

#[actix_web::test]
async fn event_stream_is_server_sent_events() {
    let (engine, _) = setup().await;
    let app = test::init_service(App::new().configure(engine_routes(&engine))).await;
    let req = TestRequest::get().uri("/api/2fa/events").insert_header((USER_ID_HEADER, BUYER.to_string())).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let content_type = res.headers().get("content-type").unwrap().to_str().unwrap();
    assert_eq!(content_type, "text/event-stream");

    let req = TestRequest::get().uri("/api/2fa/events").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    drop(app);
    engine.teardown().await;
}
