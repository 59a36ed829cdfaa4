//! # Database management and control.
//!
//! This module defines the contracts that supplier order database *backends* must satisfy.
//!
//! * [`OrderManagement`] reads and mutates orders and their line items, and applies state transitions.
//! * [`ValidationLog`] is the append-only audit log of validation errors and warnings.
//! * [`CatalogManagement`] gives access to suppliers, products and user credentials.
//! * [`ChallengeManagement`] persists two-factor challenges.
//! * [`SupplierOrderDatabase`] ties them together.
mod catalog_management;
mod challenge_management;
mod order_management;
mod store_error;
mod supplier_order_database;
mod validation_log;

pub use catalog_management::CatalogManagement;
pub use challenge_management::ChallengeManagement;
pub use order_management::OrderManagement;
pub use store_error::StoreError;
pub use supplier_order_database::SupplierOrderDatabase;
pub use validation_log::ValidationLog;
