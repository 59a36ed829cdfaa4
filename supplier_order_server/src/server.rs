use std::{rc::Rc, sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use supplier_order_engine::{
    adapters::AdapterRegistry,
    events::EventHandlers,
    messaging::BroadcastBus,
    task_queue::TaskQueue,
    EngineContext,
    EngineJobRunner,
    OrderApi,
    PlacementApi,
    PriceVerificationApi,
    SqliteDatabase,
    TwoFactorApi,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    notifications::notification_hooks,
    routes::{
        health,
        CancelChallengeRoute,
        CancelOrderRoute,
        OrderStatusRoute,
        OrderValidationsRoute,
        PendingChallengesRoute,
        RefreshPricesRoute,
        SkipVerificationRoute,
        SubmitCodeRoute,
        SubmitOrderRoute,
        TwoFactorEventsRoute,
        VerifyPricesRoute,
    },
    sweep_worker::start_sweep_worker,
};

const EVENT_BUFFER_SIZE: usize = 128;

/// Wires up the engine and runs the server until it is shut down.
///
/// Must be called from within the actix runtime: the task queue runs on the main thread's local task set.
pub async fn run_server(config: ServerConfig, adapters: AdapterRegistry) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if adapters.is_empty() {
        warn!("🚀️ No supplier adapters are registered. Every placement will fail until one is.");
    } else {
        info!("🚀️ {} supplier adapters registered", adapters.len());
    }

    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, notification_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let bus = BroadcastBus::default();
    let (queue, handle) = TaskQueue::new();
    let ctx = EngineContext::new(db, Arc::new(adapters), Arc::new(handle), Arc::new(bus.clone()))
        .with_producers(producers)
        .with_config(config.engine.clone())
        .with_locks(queue.locks());
    actix_web::rt::spawn(queue.run(Rc::new(EngineJobRunner::new(ctx.clone()))));
    let _sweeper = start_sweep_worker(TwoFactorApi::new(ctx.clone()), config.sweep_interval);

    let srv = create_server_instance(config, ctx, bus)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    ctx: EngineContext<SqliteDatabase>,
    bus: BroadcastBus,
) -> Result<Server, ServerError> {
    let log_format = if config.use_x_forwarded_for { "%t (%D ms) %s %{r}a %U" } else { "%t (%D ms) %s %a %U" };
    let srv = HttpServer::new(move || {
        let orders_api = OrderApi::new(ctx.db.clone());
        let placement_api = PlacementApi::new(ctx.clone());
        let prices_api = PriceVerificationApi::new(ctx.clone());
        let two_factor_api = TwoFactorApi::new(ctx.clone());
        let app = App::new()
            .wrap(Logger::new(log_format).log_target("sog::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(placement_api))
            .app_data(web::Data::new(prices_api))
            .app_data(web::Data::new(two_factor_api))
            .app_data(web::Data::new(bus.clone()));
        let api_scope = web::scope("/api")
            .service(OrderStatusRoute::<SqliteDatabase>::new())
            .service(OrderValidationsRoute::<SqliteDatabase>::new())
            .service(CancelOrderRoute::<SqliteDatabase>::new())
            .service(SubmitOrderRoute::<SqliteDatabase>::new())
            .service(VerifyPricesRoute::<SqliteDatabase>::new())
            .service(SkipVerificationRoute::<SqliteDatabase>::new())
            .service(RefreshPricesRoute::<SqliteDatabase>::new())
            .service(SubmitCodeRoute::<SqliteDatabase>::new())
            .service(CancelChallengeRoute::<SqliteDatabase>::new())
            .service(PendingChallengesRoute::<SqliteDatabase>::new())
            .service(TwoFactorEventsRoute::new());
        app.service(health).service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
