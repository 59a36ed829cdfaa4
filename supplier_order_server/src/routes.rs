//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Every `/api` handler takes the caller from the `sog_user_id` header ([`SogUserId`]) and checks that the order or
//! challenge belongs to them before doing anything else. Someone else's order is reported as not found.
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Placement and price verification talk to supplier websites and can
//! take minutes, so the handlers only queue them and return `202 Accepted`. Clients follow progress with the status
//! endpoint and the two-factor event stream.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use supplier_order_engine::{
    code_result_message,
    db_types::OrderId,
    messaging::{BroadcastBus, ServerMessage},
    order_objects::{OrderStatusView, PlacementOptions},
    CatalogManagement,
    ChallengeManagement,
    OrderApi,
    OrderManagement,
    PlacementApi,
    PriceVerificationApi,
    SupplierOrderDatabase,
    TwoFactorApi,
    TwoFactorError,
    ValidationLog,
};

use crate::{
    data_objects::{CancelChallengeParams, QueuedJob, SkipVerificationParams, SubmitCodeParams},
    errors::ServerError,
    helpers::{sse_stream, SogUserId},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
                impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name);
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(order_status => Get "/orders/{id}/status" impl OrderManagement);
/// The order status polling endpoint. `processing` is true while a placement attempt holds the order.
pub async fn order_status<B: OrderManagement>(
    user: SogUserId,
    path: web::Path<i64>,
    api: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    trace!("💻️ Status request for order {order_id} from user {}", user.0);
    let status = api.order_status(user.0, &order_id).await?;
    Ok(HttpResponse::Ok().json(status))
}

route!(order_validations => Get "/orders/{id}/validations" impl OrderManagement, ValidationLog);
/// Every validation finding logged against the order, oldest first.
pub async fn order_validations<B: OrderManagement + ValidationLog>(
    user: SogUserId,
    path: web::Path<i64>,
    api: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    trace!("💻️ Validation history request for order {order_id} from user {}", user.0);
    let validations = api.validations(user.0, &order_id).await?;
    Ok(HttpResponse::Ok().json(validations))
}

route!(cancel_order => Post "/orders/{id}/cancel" impl OrderManagement);
/// Cancels an order that has not been submitted. The supplier is never contacted.
pub async fn cancel_order<B: OrderManagement>(
    user: SogUserId,
    path: web::Path<i64>,
    api: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ Cancel request for order {order_id} from user {}", user.0);
    let order = api.cancel_order(user.0, &order_id).await?;
    info!("💻️ Order {order_id} cancelled by user {}", user.0);
    Ok(HttpResponse::Ok().json(OrderStatusView::from(&order)))
}

route!(submit_order => Post "/orders/{id}/submit" impl SupplierOrderDatabase);
/// Queues the order for placement. The body is optional; both flags default to `false`.
pub async fn submit_order<B: SupplierOrderDatabase>(
    user: SogUserId,
    path: web::Path<i64>,
    body: Option<web::Json<PlacementOptions>>,
    orders: web::Data<OrderApi<B>>,
    placement: web::Data<PlacementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let options = body.map(|b| b.into_inner()).unwrap_or_default();
    debug!("💻️ Submit request for order {order_id} from user {} with {options:?}", user.0);
    orders.order_for_user(user.0, &order_id).await?;
    let job = placement.schedule_placement(&order_id, options).await?;
    Ok(HttpResponse::Accepted().json(QueuedJob::new(format!("Order {order_id} has been queued for placement"), job)))
}

route!(verify_prices => Post "/orders/{id}/verify_prices" impl SupplierOrderDatabase);
pub async fn verify_prices<B: SupplierOrderDatabase>(
    user: SogUserId,
    path: web::Path<i64>,
    orders: web::Data<OrderApi<B>>,
    prices: web::Data<PriceVerificationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ Price verification request for order {order_id} from user {}", user.0);
    orders.order_for_user(user.0, &order_id).await?;
    let job = prices.schedule_verification(&order_id).await?;
    Ok(HttpResponse::Accepted().json(QueuedJob::new(format!("Prices for order {order_id} will be checked"), job)))
}

route!(skip_verification => Post "/orders/{id}/skip_verification" impl SupplierOrderDatabase);
/// Lets the user place an order whose price check failed, using the cached prices.
pub async fn skip_verification<B: SupplierOrderDatabase>(
    user: SogUserId,
    path: web::Path<i64>,
    body: Option<web::Json<SkipVerificationParams>>,
    orders: web::Data<OrderApi<B>>,
    prices: web::Data<PriceVerificationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let reason = body.and_then(|b| b.into_inner().reason).unwrap_or_else(|| "requested by the user".to_string());
    debug!("💻️ Skip verification request for order {order_id} from user {}", user.0);
    orders.order_for_user(user.0, &order_id).await?;
    let outcome = prices.skip_verification(&order_id, &reason).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

//----------------------------------------------   Prices  ----------------------------------------------------
route!(refresh_prices => Post "/prices/refresh" impl SupplierOrderDatabase);
/// Queues a bulk price refresh across every supplier the user has open orders with.
pub async fn refresh_prices<B: SupplierOrderDatabase>(
    user: SogUserId,
    prices: web::Data<PriceVerificationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ Price refresh request from user {}", user.0);
    let job = prices.schedule_quick_refresh(user.0)?;
    Ok(HttpResponse::Accepted().json(QueuedJob::new("Prices will be refreshed", job)))
}

//----------------------------------------------   Two-factor  ------------------------------------------------
route!(submit_code => Post "/2fa/submit_code" impl ChallengeManagement, CatalogManagement);
/// The `submit_code` client action. Wrong, expired and exhausted codes are answered with a `code_result` message
/// rather than an error status, so that the client can show the attempts left.
pub async fn submit_code<B: ChallengeManagement + CatalogManagement>(
    user: SogUserId,
    body: web::Json<SubmitCodeParams>,
    api: web::Data<TwoFactorApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let SubmitCodeParams { session_token, code } = body.into_inner();
    debug!("💻️ Code submitted by user {}", user.0);
    let result = api.submit_code(user.0, &session_token, &code).await;
    match result {
        Err(e @ (TwoFactorError::ChallengeNotFound | TwoFactorError::Store(_))) => Err(e.into()),
        result => Ok(HttpResponse::Ok().json(code_result_message(&result))),
    }
}

route!(cancel_challenge => Post "/2fa/cancel" impl ChallengeManagement, CatalogManagement);
pub async fn cancel_challenge<B: ChallengeManagement + CatalogManagement>(
    user: SogUserId,
    body: web::Json<CancelChallengeParams>,
    api: web::Data<TwoFactorApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let CancelChallengeParams { session_token } = body.into_inner();
    debug!("💻️ Challenge cancellation from user {}", user.0);
    api.cancel(user.0, &session_token).await?;
    Ok(HttpResponse::Ok().json(ServerMessage::Cancelled { session_token }))
}

route!(pending_challenges => Get "/2fa/pending" impl ChallengeManagement, CatalogManagement);
/// The user's open challenges, for clients that connect to the event stream after a prompt was sent.
pub async fn pending_challenges<B: ChallengeManagement + CatalogManagement>(
    user: SogUserId,
    api: web::Data<TwoFactorApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Pending challenges request from user {}", user.0);
    let challenges = api.pending_challenges(user.0).await?;
    Ok(HttpResponse::Ok().json(challenges))
}

route!(two_factor_events => Get "/2fa/events");
/// Server-Sent Events stream of the caller's two-factor channel.
pub async fn two_factor_events(user: SogUserId, bus: web::Data<BroadcastBus>) -> HttpResponse {
    debug!("💻️ User {} subscribed to the two-factor channel", user.0);
    let receiver = bus.subscribe(user.0);
    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(sse_stream(receiver))
}
