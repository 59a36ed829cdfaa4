//! # Supplier order engine public API
//!
//! The `soe_api` module exposes the programmatic API of the engine. As with the database traits, each API is generic
//! over the backend and only asks for the traits it needs.
//!
//! * [`order_api`] builds and tracks orders.
//! * [`validation_engine`] runs the static pre-placement checks.
//! * [`preflight`] runs the live checks against the supplier immediately before checkout.
//! * [`placement_api`] is the placement state machine.
//! * [`price_verification_api`] is the review-time price check, including quick refresh and batch verification.
//! * [`two_factor_api`] manages two-factor challenges.
//! * [`job_runner`] executes task queue jobs against the APIs above.
//!
//! All but the order API need an [`EngineContext`], which bundles the database with the adapter factory, the job
//! scheduler, the message bus and the event producers.
mod context;
pub mod errors;
pub mod job_runner;
pub mod order_api;
pub mod order_objects;
pub mod placement_api;
pub mod preflight;
pub mod price_verification_api;
mod session;
pub mod two_factor_api;
pub mod validation_engine;

pub use context::EngineContext;
pub use job_runner::EngineJobRunner;
pub use order_api::OrderApi;
pub use placement_api::PlacementApi;
pub use preflight::PreflightVerifier;
pub use price_verification_api::PriceVerificationApi;
pub use two_factor_api::{code_result_message, ChallengeRequest, TwoFactorApi};
pub use validation_engine::ValidationEngine;
