use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use log::debug;
use serde_json::Value;
use supplier_order_engine::{
    test_utils::TestEngine,
    OrderApi,
    PlacementApi,
    PriceVerificationApi,
    SqliteDatabase,
    TwoFactorApi,
};

use crate::{
    helpers::USER_ID_HEADER,
    routes::{
        CancelChallengeRoute,
        CancelOrderRoute,
        OrderStatusRoute,
        PendingChallengesRoute,
        RefreshPricesRoute,
        SkipVerificationRoute,
        SubmitCodeRoute,
        SubmitOrderRoute,
        TwoFactorEventsRoute,
        VerifyPricesRoute,
    },
};

pub async fn get_request<F>(user_id: Option<i64>, path: &str, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let req = with_user(TestRequest::get().uri(path), user_id);
    send(req, configure).await
}

pub async fn post_request<F>(user_id: Option<i64>, path: &str, body: Option<Value>, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let mut req = with_user(TestRequest::post().uri(path), user_id);
    if let Some(body) = body {
        req = req.set_json(body);
    }
    send(req, configure).await
}

fn with_user(req: TestRequest, user_id: Option<i64>) -> TestRequest {
    match user_id {
        Some(id) => req.insert_header((USER_ID_HEADER, id.to_string())),
        None => req,
    }
}

async fn send<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}

pub fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Response is not JSON ({e}): {body}"))
}

/// Every `/api` route, served by the test engine. Jobs land in the engine's recording scheduler.
pub fn engine_routes(engine: &TestEngine) -> impl FnOnce(&mut ServiceConfig) {
    let ctx = engine.ctx.clone();
    let bus = engine.bus.clone();
    move |cfg| {
        cfg.app_data(web::Data::new(OrderApi::new(ctx.db.clone())))
            .app_data(web::Data::new(PlacementApi::new(ctx.clone())))
            .app_data(web::Data::new(PriceVerificationApi::new(ctx.clone())))
            .app_data(web::Data::new(TwoFactorApi::new(ctx)))
            .app_data(web::Data::new(bus))
            .service(
                web::scope("/api")
                    .service(OrderStatusRoute::<SqliteDatabase>::new())
                    .service(CancelOrderRoute::<SqliteDatabase>::new())
                    .service(SubmitOrderRoute::<SqliteDatabase>::new())
                    .service(VerifyPricesRoute::<SqliteDatabase>::new())
                    .service(SkipVerificationRoute::<SqliteDatabase>::new())
                    .service(RefreshPricesRoute::<SqliteDatabase>::new())
                    .service(SubmitCodeRoute::<SqliteDatabase>::new())
                    .service(CancelChallengeRoute::<SqliteDatabase>::new())
                    .service(PendingChallengesRoute::<SqliteDatabase>::new())
                    .service(TwoFactorEventsRoute::new()),
            );
    }
}
