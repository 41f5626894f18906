//! Backing document store subsystem.
//!
//! # Data Flow
//! ```text
//! guarded call / memoizer
//!     → DocumentStore (trait, async)
//!         → InMemoryStore (DashMap collections, TTL indexes)
//!         → FaultyStore<S> (injected driver failures, then delegate)
//!     ← StoreError (classified by resilience::classify)
//! ```
//!
//! # Design Decisions
//! - Collections are addressed by `Namespace` (database + collection)
//! - Documents are JSON maps; `_id` is assigned on insert when absent
//! - Expiry is the store's job: TTL indexes purge on read and from an
//!   optional background monitor, never from the caller

pub mod clock;
pub mod error;
pub mod faulty;
pub mod memory;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StoreError, StoreResult};
pub use faulty::FaultyStore;
pub use memory::{InMemoryStore, StoreIdentity};

/// A stored document.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Field holding a document's primary key.
pub const ID_FIELD: &str = "_id";

/// Fully qualified collection address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Operations a document store must provide.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// List the collection names in a database.
    async fn collection_names(&self, database: &str) -> StoreResult<Vec<String>>;

    /// Create an empty collection. Fails if it already exists.
    async fn create_collection(&self, ns: &Namespace) -> StoreResult<()>;

    /// Expire documents once `field` (epoch millis) is older than `expire_after`.
    async fn create_ttl_index(
        &self,
        ns: &Namespace,
        field: &str,
        expire_after: Duration,
    ) -> StoreResult<()>;

    /// Return any one live document of the collection.
    async fn find_one(&self, ns: &Namespace) -> StoreResult<Option<Document>>;

    /// Remove every document of the collection, returning how many were removed.
    async fn delete_many(&self, ns: &Namespace) -> StoreResult<u64>;

    /// Insert a document, returning its `_id`.
    async fn insert_one(&self, ns: &Namespace, doc: Document) -> StoreResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_display() {
        let ns = Namespace::new("memoize_db", "memoize_list_abc");
        assert_eq!(ns.to_string(), "memoize_db.memoize_list_abc");
    }
}
