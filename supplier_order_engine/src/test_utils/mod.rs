//! Helpers for tests: throwaway databases, a scriptable fake supplier and a pre-wired engine.
mod fake_adapter;
mod fixtures;
pub mod prepare_env;

pub use fake_adapter::{AdapterCall, Capability, FakeAdapter, FakeAdapterFactory, FakeSupplier};
pub use fixtures::TestEngine;
