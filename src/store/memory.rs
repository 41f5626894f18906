//! In-memory document store.
//!
//! # Responsibilities
//! - Hold collections per namespace with insertion order preserved
//! - Enforce unique `_id`
//! - Apply TTL indexes (lazily on read, or from a background monitor)
//! - Expose the connection identity for diagnostics

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use crate::resilience::host::HostInfo;
use crate::store::clock::{Clock, SystemClock};
use crate::store::error::{StoreError, StoreResult};
use crate::store::{Document, DocumentStore, Namespace, ID_FIELD};

/// Who the store handle claims to be connected to.
#[derive(Debug, Clone, Default)]
pub struct StoreIdentity {
    /// Owning library name.
    pub library: Option<String>,
    /// Cluster members as `host:port`.
    pub nodes: Vec<String>,
    /// Primary host string.
    pub host: Option<String>,
}

#[derive(Debug, Clone)]
struct TtlIndex {
    field: String,
    expire_after: Duration,
}

#[derive(Debug, Default)]
struct Collection {
    docs: Vec<Document>,
    ttl: Option<TtlIndex>,
}

impl Collection {
    /// Drop expired documents. Returns how many were removed.
    fn purge(&mut self, now_millis: u64) -> usize {
        let Some(ttl) = &self.ttl else {
            return 0;
        };
        let expire_ms = u64::try_from(ttl.expire_after.as_millis()).unwrap_or(u64::MAX);
        let before = self.docs.len();
        self.docs.retain(|doc| match doc.get(&ttl.field).and_then(Value::as_u64) {
            Some(stamp) => stamp.saturating_add(expire_ms) > now_millis,
            // Documents without a numeric timestamp never expire.
            None => true,
        });
        before - self.docs.len()
    }
}

/// A `DocumentStore` kept entirely in process memory.
pub struct InMemoryStore {
    collections: DashMap<Namespace, Collection>,
    clock: Arc<dyn Clock>,
    identity: StoreIdentity,
}

impl InMemoryStore {
    /// Create an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store that expires documents against `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            collections: DashMap::new(),
            clock,
            identity: StoreIdentity::default(),
        }
    }

    /// Attach a connection identity reported through [`HostInfo`].
    pub fn with_identity(mut self, identity: StoreIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Number of live documents in a collection.
    pub fn count(&self, ns: &Namespace) -> usize {
        let now = self.clock.now_millis();
        match self.collections.get_mut(ns) {
            Some(mut coll) => {
                coll.purge(now);
                coll.docs.len()
            }
            None => 0,
        }
    }

    /// Run one TTL pass over every collection.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        self.collections
            .iter_mut()
            .map(|mut entry| entry.value_mut().purge(now))
            .sum()
    }

    /// Periodically purge expired documents until shutdown.
    pub fn spawn_ttl_monitor(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            tracing::info!(interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX), "TTL monitor starting");
            let mut ticker = time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = store.purge_expired();
                        if removed > 0 {
                            tracing::debug!(removed, "TTL monitor purged expired documents");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("TTL monitor received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("collections", &self.collections.len())
            .field("identity", &self.identity)
            .finish()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn collection_names(&self, database: &str) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = self
            .collections
            .iter()
            .filter(|entry| entry.key().database == database)
            .map(|entry| entry.key().collection.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn create_collection(&self, ns: &Namespace) -> StoreResult<()> {
        use dashmap::mapref::entry::Entry;

        match self.collections.entry(ns.clone()) {
            Entry::Occupied(_) => Err(StoreError::OperationFailure {
                code: 48,
                message: format!("collection {} already exists", ns),
            }),
            Entry::Vacant(slot) => {
                slot.insert(Collection::default());
                Ok(())
            }
        }
    }

    async fn create_ttl_index(
        &self,
        ns: &Namespace,
        field: &str,
        expire_after: Duration,
    ) -> StoreResult<()> {
        let mut coll = self.collections.entry(ns.clone()).or_default();
        if let Some(existing) = &coll.ttl {
            if existing.field == field && existing.expire_after != expire_after {
                return Err(StoreError::OperationFailure {
                    code: 85,
                    message: format!(
                        "index on {} already exists with expireAfterSeconds {}",
                        field,
                        existing.expire_after.as_secs()
                    ),
                });
            }
        }
        coll.ttl = Some(TtlIndex {
            field: field.to_string(),
            expire_after,
        });
        Ok(())
    }

    async fn find_one(&self, ns: &Namespace) -> StoreResult<Option<Document>> {
        let now = self.clock.now_millis();
        Ok(self.collections.get_mut(ns).and_then(|mut coll| {
            coll.purge(now);
            coll.docs.first().cloned()
        }))
    }

    async fn delete_many(&self, ns: &Namespace) -> StoreResult<u64> {
        Ok(self
            .collections
            .get_mut(ns)
            .map(|mut coll| {
                let removed = coll.docs.len() as u64;
                coll.docs.clear();
                removed
            })
            .unwrap_or(0))
    }

    async fn insert_one(&self, ns: &Namespace, mut doc: Document) -> StoreResult<String> {
        let id = match doc.get(ID_FIELD) {
            Some(Value::String(id)) => id.clone(),
            Some(other) => {
                return Err(StoreError::InvalidDocument(format!(
                    "_id must be a string, got {}",
                    other
                )))
            }
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
                id
            }
        };

        let now = self.clock.now_millis();
        let mut coll = self.collections.entry(ns.clone()).or_default();
        coll.purge(now);
        let taken = coll
            .docs
            .iter()
            .any(|existing| existing.get(ID_FIELD).and_then(Value::as_str) == Some(id.as_str()));
        if taken {
            return Err(StoreError::DuplicateKey {
                namespace: ns.to_string(),
                key: format!("{{ _id: \"{}\" }}", id),
            });
        }
        coll.docs.push(doc);
        Ok(id)
    }
}

impl HostInfo for InMemoryStore {
    fn library_name(&self) -> Option<String> {
        self.identity.library.clone()
    }

    fn cluster_nodes(&self) -> Option<Vec<String>> {
        if self.identity.nodes.is_empty() {
            None
        } else {
            Some(self.identity.nodes.clone())
        }
    }

    fn primary_host(&self) -> Option<String> {
        self.identity.host.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::clock::ManualClock;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_insert_find_delete() {
        let store = InMemoryStore::new();
        let ns = Namespace::new("db", "things");

        assert!(store.find_one(&ns).await.unwrap().is_none());

        let id = store.insert_one(&ns, doc(json!({"a": 1}))).await.unwrap();
        let found = store.find_one(&ns).await.unwrap().unwrap();
        assert_eq!(found.get("_id").and_then(Value::as_str), Some(id.as_str()));
        assert_eq!(found.get("a"), Some(&json!(1)));

        store.insert_one(&ns, doc(json!({"a": 2}))).await.unwrap();
        assert_eq!(store.delete_many(&ns).await.unwrap(), 2);
        assert_eq!(store.count(&ns), 0);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = InMemoryStore::new();
        let ns = Namespace::new("db", "things");
        store.insert_one(&ns, doc(json!({"_id": "x"}))).await.unwrap();

        let err = store.insert_one(&ns, doc(json!({"_id": "x"}))).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));

        let err = store.insert_one(&ns, doc(json!({"_id": 7}))).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn test_create_collection_twice_fails() {
        let store = InMemoryStore::new();
        let ns = Namespace::new("db", "c");
        store.create_collection(&ns).await.unwrap();
        let err = store.create_collection(&ns).await.unwrap_err();
        assert!(matches!(err, StoreError::OperationFailure { code: 48, .. }));

        store.create_collection(&Namespace::new("other", "d")).await.unwrap();
        assert_eq!(store.collection_names("db").await.unwrap(), vec!["c".to_string()]);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let clock = ManualClock::new(1_000_000);
        let store = InMemoryStore::with_clock(Arc::new(clock.clone()));
        let ns = Namespace::new("db", "ttl");
        store
            .create_ttl_index(&ns, "date", Duration::from_secs(60))
            .await
            .unwrap();

        store
            .insert_one(&ns, doc(json!({"date": clock.now_millis()})))
            .await
            .unwrap();
        store.insert_one(&ns, doc(json!({"note": "undated"}))).await.unwrap();

        clock.advance(Duration::from_secs(59));
        assert_eq!(store.count(&ns), 2);

        clock.advance(Duration::from_secs(1));
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.count(&ns), 1);
    }

    #[tokio::test]
    async fn test_ttl_beyond_u64_millis_never_expires() {
        let clock = ManualClock::new(1_000_000);
        let store = InMemoryStore::with_clock(Arc::new(clock.clone()));
        let ns = Namespace::new("db", "forever");
        // 2^64 + 384 ms: wraps to 384 ms if narrowed instead of saturated.
        store
            .create_ttl_index(&ns, "date", Duration::from_secs(18_446_744_073_709_552))
            .await
            .unwrap();
        store
            .insert_one(&ns, doc(json!({"date": clock.now_millis()})))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(3_600));
        assert_eq!(store.count(&ns), 1);
    }

    #[tokio::test]
    async fn test_conflicting_ttl_index() {
        let store = InMemoryStore::new();
        let ns = Namespace::new("db", "ttl");
        store.create_ttl_index(&ns, "date", Duration::from_secs(60)).await.unwrap();
        store.create_ttl_index(&ns, "date", Duration::from_secs(60)).await.unwrap();

        let err = store
            .create_ttl_index(&ns, "date", Duration::from_secs(30))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::OperationFailure { code: 85, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_monitor_stops_on_shutdown() {
        let clock = ManualClock::new(0);
        let store = Arc::new(InMemoryStore::with_clock(Arc::new(clock.clone())));
        let ns = Namespace::new("db", "ttl");
        store.create_ttl_index(&ns, "date", Duration::from_secs(1)).await.unwrap();
        store.insert_one(&ns, doc(json!({"date": 0}))).await.unwrap();

        let (tx, rx) = broadcast::channel(1);
        let handle = store.spawn_ttl_monitor(Duration::from_millis(100), rx);

        clock.advance(Duration::from_secs(5));
        time::sleep(Duration::from_millis(250)).await;
        assert_eq!(store.collections.get(&ns).map(|c| c.docs.len()), Some(0));

        tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[test]
    fn test_host_info_from_identity() {
        let store = InMemoryStore::new().with_identity(StoreIdentity {
            library: Some("user.prices".into()),
            nodes: vec!["db1:27017".into(), "db2:27017".into()],
            host: Some("db1".into()),
        });
        assert_eq!(store.library_name().as_deref(), Some("user.prices"));
        assert_eq!(store.cluster_nodes().map(|n| n.len()), Some(2));
        assert_eq!(store.primary_host().as_deref(), Some("db1"));

        let bare = InMemoryStore::new();
        assert!(bare.cluster_nodes().is_none());
    }
}
