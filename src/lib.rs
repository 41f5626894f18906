//! Resilient document-store calls and a store-backed result cache.
//!
//! - [`resilience`]: retry wrapper with failure classification, capped
//!   exponential backoff and a retry budget shared across nested calls
//! - [`cache`]: single-slot memoizer stored in a TTL-indexed collection
//! - [`store`]: the document-store contract plus an in-memory store

pub mod cache;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod store;

pub use cache::{memoize, CacheSettings, Memoized};
pub use config::GuardConfig;
pub use resilience::{CallSite, Classify, FailureClass, HostInfo, OpId, RetryContext, RetryPolicy};
pub use store::{DocumentStore, InMemoryStore, StoreError};
