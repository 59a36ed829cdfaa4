//! Supplier Order Engine
//!
//! The supplier order engine takes a buyer's draft purchase order and gets it placed with a supplier whose only
//! interface is its website. This library contains the core logic of that pipeline. It is supplier-agnostic: the
//! website automation lives behind the [`adapters::SupplierAdapter`] trait.
//!
//! The library is divided into the following sections:
//! 1. Database management and control ([`mod@traits`] and, for the SQLite backend, [`mod@sqlite`]). You should never
//!    need to access the database directly. Instead, use the public APIs. The exception is the data types used in the
//!    database. These are defined in the [`mod@db_types`] module and are public.
//! 2. The engine public API. [`OrderApi`] builds and tracks orders. [`ValidationEngine`] and [`PreflightVerifier`] run
//!    the static and live pre-placement checks. [`PlacementApi`] drives the placement state machine.
//!    [`PriceVerificationApi`] checks prices while the user reviews their orders. [`TwoFactorApi`] manages the
//!    challenges that suspend an operation until the user enters a code.
//! 3. The [`mod@task_queue`], which runs every pipeline stage as a job with retries, and never runs two jobs for the
//!    same supplier credential at once.
//!
//! The engine also emits events when orders are submitted, fail or are held, and when challenges open and close.
//! A simple actor framework ([`mod@events`]) is used so that you can easily hook into these events and perform custom
//! actions, such as sending notifications. Messages meant for the user's browser go through a [`messaging::MessageBus`].
pub mod adapters;
pub mod config;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod messaging;
mod soe_api;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod task_queue;
pub mod traits;

#[cfg(all(any(feature = "test_utils", test), feature = "sqlite"))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use soe_api::{
    code_result_message,
    errors::{OrderApiError, PlacementError, PriceVerificationError, TwoFactorError, ValidationError},
    order_objects,
    ChallengeRequest,
    EngineContext,
    EngineJobRunner,
    OrderApi,
    PlacementApi,
    PreflightVerifier,
    PriceVerificationApi,
    TwoFactorApi,
    ValidationEngine,
};
pub use traits::{
    CatalogManagement,
    ChallengeManagement,
    OrderManagement,
    StoreError,
    SupplierOrderDatabase,
    ValidationLog,
};
