//! # SOG server
//! This module hosts the HTTP surface of the supplier order gateway. It is responsible for:
//! * Queueing order placements and price checks on the engine's task queue.
//! * The order status polling endpoint.
//! * The two-factor channel: client actions arrive as POSTs and server messages leave as Server-Sent Events.
//! * Expiring stale two-factor challenges in the background.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/orders/{id}/submit`, `/cancel`, `/verify_prices`, `/skip_verification` (POST)
//! * `/api/orders/{id}/status`, `/validations` (GET)
//! * `/api/prices/refresh` (POST)
//! * `/api/2fa/submit_code`, `/api/2fa/cancel` (POST), `/api/2fa/pending`, `/api/2fa/events` (GET)
//!
//! Every `/api` route expects the caller's user id in the `sog_user_id` header.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod notifications;
pub mod routes;
pub mod server;
pub mod sweep_worker;

#[cfg(test)]
mod endpoint_tests;
