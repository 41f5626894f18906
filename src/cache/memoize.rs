//! Single-slot memoizer backed by a TTL collection.
//!
//! # Responsibilities
//! - Create the cache collection and its TTL index once, at wrap time
//! - Serve the stored value while it lives; compute and store it otherwise
//!
//! # Design Decisions
//! - One slot per wrapped operation. Arguments are not part of the key:
//!   every call, whatever its arguments (including none), shares the slot
//! - Expiry is left to the store's TTL index
//! - On a miss the slot is cleared and then written. The two steps are not
//!   atomic: concurrent misses all compute, and the last insert wins

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::cache::naming::collection_name;
use crate::config::CacheConfig;
use crate::observability::metrics;
use crate::resilience::retries::OpId;
use crate::store::{Clock, Document, DocumentStore, Namespace, StoreError, StoreResult, SystemClock};

/// Field carrying the entry's creation time (epoch millis); TTL-indexed.
pub const DATE_FIELD: &str = "date";

/// Field carrying the cached value.
pub const VALUE_FIELD: &str = "cached_data";

/// Where and for how long values are cached.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub database: String,
    pub prefix: String,
    pub ttl: Duration,
}

impl From<&CacheConfig> for CacheSettings {
    fn from(config: &CacheConfig) -> Self {
        Self {
            database: config.database.clone(),
            prefix: config.prefix.clone(),
            ttl: config.ttl(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

/// An operation whose result is cached in the store.
pub struct Memoized<F> {
    store: Arc<dyn DocumentStore>,
    namespace: Namespace,
    clock: Arc<dyn Clock>,
    op: OpId,
    operation: F,
}

/// Wrap `operation` in a store-backed cache. See [`Memoized::new`].
pub async fn memoize<F>(
    store: Arc<dyn DocumentStore>,
    settings: &CacheSettings,
    op: OpId,
    operation: F,
) -> StoreResult<Memoized<F>> {
    Memoized::new(store, settings, op, operation).await
}

impl<F> Memoized<F> {
    /// Prepare the cache collection and wrap `operation`.
    pub async fn new(
        store: Arc<dyn DocumentStore>,
        settings: &CacheSettings,
        op: OpId,
        operation: F,
    ) -> StoreResult<Self> {
        Self::with_clock(store, settings, op, operation, Arc::new(SystemClock)).await
    }

    /// As [`Memoized::new`], stamping entries with `clock`.
    pub async fn with_clock(
        store: Arc<dyn DocumentStore>,
        settings: &CacheSettings,
        op: OpId,
        operation: F,
        clock: Arc<dyn Clock>,
    ) -> StoreResult<Self> {
        let namespace = Namespace::new(&settings.database, collection_name(&settings.prefix, &op));

        let existing = store.collection_names(&namespace.database).await?;
        if !existing.contains(&namespace.collection) {
            match store.create_collection(&namespace).await {
                Ok(()) => {
                    store
                        .create_ttl_index(&namespace, DATE_FIELD, settings.ttl)
                        .await?;
                    tracing::info!(
                        collection = %namespace,
                        ttl_secs = settings.ttl.as_secs(),
                        "Created cache collection"
                    );
                }
                // Someone else created it between the listing and now.
                Err(StoreError::OperationFailure { code: 48, .. }) => {
                    tracing::debug!(collection = %namespace, "Cache collection already exists");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Self {
            store,
            namespace,
            clock,
            op,
            operation,
        })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn op(&self) -> OpId {
        self.op
    }

    /// Empty the slot so the next call recomputes.
    pub async fn invalidate(&self) -> StoreResult<u64> {
        let removed = self.store.delete_many(&self.namespace).await?;
        tracing::debug!(collection = %self.namespace, removed, "Cache invalidated");
        Ok(removed)
    }

    /// Return the cached value, or compute, store and return a fresh one.
    ///
    /// `args` is passed to the operation on a miss and otherwise ignored.
    pub async fn call<A, T, E, Fut>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize + DeserializeOwned,
        E: From<StoreError>,
    {
        if let Some(value) = self.lookup::<T>().await? {
            metrics::record_cache_lookup(&self.namespace.collection, true);
            tracing::debug!(collection = %self.namespace, "Cache hit");
            return Ok(value);
        }
        metrics::record_cache_lookup(&self.namespace.collection, false);

        let value = (self.operation)(args).await?;
        let encoded = serde_json::to_value(&value).map_err(StoreError::from)?;

        self.store.delete_many(&self.namespace).await?;
        let mut entry = Document::new();
        entry.insert(DATE_FIELD.to_string(), Value::from(self.clock.now_millis()));
        entry.insert(VALUE_FIELD.to_string(), encoded);
        self.store.insert_one(&self.namespace, entry).await?;

        tracing::debug!(collection = %self.namespace, operation = self.op.name, "Cache refreshed");
        Ok(value)
    }

    async fn lookup<T: DeserializeOwned>(&self) -> StoreResult<Option<T>> {
        let Some(mut entry) = self.store.find_one(&self.namespace).await? else {
            return Ok(None);
        };
        match entry.remove(VALUE_FIELD) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => {
                tracing::warn!(collection = %self.namespace, "Cache entry without value, recomputing");
                Ok(None)
            }
        }
    }
}

impl<F> std::fmt::Debug for Memoized<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memoized")
            .field("namespace", &self.namespace)
            .field("op", &self.op)
            .finish()
    }
}
