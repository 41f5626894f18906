//! Fault injection around any document store.
//!
//! Queued failures are returned, one per operation, before the wrapped
//! store is consulted. Used by the `simulate` command and by tests that
//! need a driver which drops connections on cue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::resilience::host::HostInfo;
use crate::store::error::{StoreError, StoreResult};
use crate::store::{Document, DocumentStore, Namespace};

/// A store that fails on demand.
pub struct FaultyStore<S> {
    inner: S,
    faults: Mutex<VecDeque<StoreError>>,
    calls: AtomicU64,
}

impl<S: DocumentStore> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Mutex::new(VecDeque::new()),
            calls: AtomicU64::new(0),
        }
    }

    /// Queue a failure for the next operation that finds the queue non-empty.
    pub fn inject(&self, error: StoreError) {
        self.faults
            .lock()
            .expect("fault queue mutex poisoned")
            .push_back(error);
    }

    /// Queue `count` transient failures.
    pub fn inject_transient(&self, count: usize) {
        for i in 0..count {
            let error = if i % 2 == 0 {
                StoreError::auto_reconnect(format!("connection reset by peer (fault {})", i + 1))
            } else {
                StoreError::operation_failure(format!("not primary (fault {})", i + 1))
            };
            self.inject(error);
        }
    }

    /// Failures still queued.
    pub fn pending_faults(&self) -> usize {
        self.faults.lock().expect("fault queue mutex poisoned").len()
    }

    /// Total operations attempted, failed or not.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn next_fault(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fault = self
            .faults
            .lock()
            .expect("fault queue mutex poisoned")
            .pop_front();
        match fault {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for FaultyStore<S> {
    async fn collection_names(&self, database: &str) -> StoreResult<Vec<String>> {
        self.next_fault()?;
        self.inner.collection_names(database).await
    }

    async fn create_collection(&self, ns: &Namespace) -> StoreResult<()> {
        self.next_fault()?;
        self.inner.create_collection(ns).await
    }

    async fn create_ttl_index(
        &self,
        ns: &Namespace,
        field: &str,
        expire_after: Duration,
    ) -> StoreResult<()> {
        self.next_fault()?;
        self.inner.create_ttl_index(ns, field, expire_after).await
    }

    async fn find_one(&self, ns: &Namespace) -> StoreResult<Option<Document>> {
        self.next_fault()?;
        self.inner.find_one(ns).await
    }

    async fn delete_many(&self, ns: &Namespace) -> StoreResult<u64> {
        self.next_fault()?;
        self.inner.delete_many(ns).await
    }

    async fn insert_one(&self, ns: &Namespace, doc: Document) -> StoreResult<String> {
        self.next_fault()?;
        self.inner.insert_one(ns, doc).await
    }
}

impl<S: HostInfo> HostInfo for FaultyStore<S> {
    fn library_name(&self) -> Option<String> {
        self.inner.library_name()
    }

    fn cluster_nodes(&self) -> Option<Vec<String>> {
        self.inner.cluster_nodes()
    }

    fn primary_host(&self) -> Option<String> {
        self.inner.primary_host()
    }
}
