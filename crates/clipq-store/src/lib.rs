//! Job table access.
//!
//! This crate provides:
//! - The [`JobStore`] contract (claim, update, compare-and-set, stale listing)
//! - A PostgREST client for the hosted table
//! - An in-memory table for tests and local runs
//! - Retried reads and request metrics

pub mod client;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod retry;
pub mod store;

pub use client::{mask_secret, RestJobStore, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryJobStore, StoreStats};
pub use retry::RetryConfig;
pub use store::JobStore;
