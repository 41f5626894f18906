//! Retry logic for guarded store calls.
//!
//! # Responsibilities
//! - Classify each failure (permanent, transient, unclassified)
//! - Retry transient failures with capped exponential backoff
//! - Share one retry budget across a nested call chain
//! - Report retries and terminal failures with the handle's identity
//!
//! # Design Decisions
//! - The caller always gets the original error back, never a wrapper
//! - Permanent failures are raised on first sight, without sleeping
//! - Unclassified failures are raised at once; they are only reported when
//!   the call site lives in one of the configured namespaces
//! - Config is read per failure, so a reload applies to loops in flight

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::{GuardConfig, RetryConfig};
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::classify::{Classify, FailureClass};
use crate::resilience::context::RetryContext;
use crate::resilience::host::{HostDescriptor, HostInfo};
use crate::resilience::sink::{Disposition, FailureReport, FailureSink, MetricsSink};

/// Identifies a guarded operation: its name and the module it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpId {
    pub name: &'static str,
    pub module: &'static str,
}

impl OpId {
    pub const fn new(name: &'static str, module: &'static str) -> Self {
        Self { name, module }
    }

    /// True if any `::`-separated segment of the module path equals `namespace`.
    pub fn in_namespace(&self, namespace: &str) -> bool {
        self.module.split("::").any(|segment| segment == namespace)
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.module, self.name)
    }
}

/// Build an [`OpId`] for `name` in the calling module.
#[macro_export]
macro_rules! op_id {
    ($name:expr) => {
        $crate::resilience::retries::OpId::new($name, module_path!())
    };
}

/// A guarded operation plus the store handle it runs against, if any.
#[derive(Clone, Copy)]
pub struct CallSite<'a> {
    op: OpId,
    host: Option<&'a dyn HostInfo>,
}

impl<'a> CallSite<'a> {
    pub fn new(op: OpId) -> Self {
        Self { op, host: None }
    }

    /// Report failures with this handle's identity.
    pub fn with_host(mut self, host: &'a dyn HostInfo) -> Self {
        self.host = Some(host);
        self
    }

    pub fn op(&self) -> OpId {
        self.op
    }

    pub fn describe_host(&self) -> HostDescriptor {
        HostDescriptor::describe(self.host)
    }
}

impl fmt::Debug for CallSite<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSite")
            .field("op", &self.op)
            .field("has_host", &self.host.is_some())
            .finish()
    }
}

/// Runs store operations under the retry policy.
///
/// Cheap to clone; clones share config and sink.
#[derive(Clone)]
pub struct RetryPolicy {
    config: Arc<ArcSwap<RetryConfig>>,
    sink: Arc<dyn FailureSink>,
}

impl RetryPolicy {
    /// Create a policy that reports to [`MetricsSink`].
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            sink: Arc::new(MetricsSink),
        }
    }

    /// Replace the diagnostics sink.
    pub fn with_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Current retry configuration.
    pub fn config(&self) -> Arc<RetryConfig> {
        self.config.load_full()
    }

    /// Swap in a new configuration. Loops in flight pick it up on their
    /// next failure.
    pub fn apply(&self, config: RetryConfig) {
        tracing::info!(
            max_retries = config.max_retries,
            base_delay_ms = config.base_delay_ms,
            max_multiplier = config.max_multiplier,
            "Retry configuration updated"
        );
        self.config.store(Arc::new(config));
    }

    /// Apply the retry section of every config received on `updates`,
    /// until shutdown or until the sender goes away.
    pub fn follow(
        &self,
        mut updates: mpsc::UnboundedReceiver<GuardConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let policy = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = updates.recv() => match update {
                        Some(config) => policy.apply(config.retries),
                        None => break,
                    },
                    _ = shutdown.recv() => break,
                }
            }
            tracing::debug!("Retry config follower stopped");
        })
    }

    /// Run `op` as the top of a new call chain.
    pub async fn run<T, E, F, Fut>(&self, site: &CallSite<'_>, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        let context = RetryContext::new();
        self.run_in(&context, site, op).await
    }

    /// Run `op` inside the call chain of `context`.
    ///
    /// If the chain is not running yet this call opens it and resets it on
    /// exit; otherwise it shares the chain's retry count and leaves the
    /// reset to whoever opened it.
    #[tracing::instrument(
        level = "trace",
        skip_all,
        fields(operation = site.op().name)
    )]
    pub async fn run_in<T, E, F, Fut>(
        &self,
        context: &RetryContext,
        site: &CallSite<'_>,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        let chain = context.enter();
        tracing::trace!(
            chain_owner = chain.is_owner(),
            retry_count = context.retry_count(),
            "Guarded call started"
        );

        loop {
            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let config = self.config.load_full();
            let operation = site.op().name;

            match error.failure_class() {
                FailureClass::Permanent => {
                    let retry_count = context.retry_count();
                    let host = site.describe_host();
                    tracing::error!(
                        operation,
                        retry_count,
                        error = %error,
                        host = %host,
                        "Permanent store failure, raising"
                    );
                    self.report(site, &error, FailureClass::Permanent, Disposition::Raised, retry_count, &host);
                    return Err(error);
                }
                FailureClass::Transient => {
                    let retry_count = context.record_transient();
                    metrics::record_retry(operation);
                    let host = site.describe_host();

                    if retry_count > config.max_retries {
                        tracing::error!(
                            operation,
                            retry_count,
                            error = %error,
                            host = %host,
                            "Too many retries, raising"
                        );
                        self.report(site, &error, FailureClass::Transient, Disposition::Exhausted, retry_count, &host);
                        return Err(error);
                    }

                    if retry_count > config.warn_after {
                        tracing::warn!(operation, retry_count, error = %error, host = %host, "Store operation failed, retrying");
                    } else {
                        tracing::debug!(operation, retry_count, error = %error, host = %host, "Store operation failed, retrying");
                    }
                    self.report(site, &error, FailureClass::Transient, Disposition::Retrying, retry_count, &host);

                    let delay = calculate_backoff(retry_count, &config);
                    metrics::record_backoff(delay);
                    tokio::time::sleep(delay).await;
                }
                FailureClass::Unclassified => {
                    let always_log = config
                        .log_namespaces
                        .iter()
                        .any(|namespace| site.op().in_namespace(namespace));
                    if always_log {
                        let host = site.describe_host();
                        self.report(
                            site,
                            &error,
                            FailureClass::Unclassified,
                            Disposition::Unhandled,
                            context.retry_count(),
                            &host,
                        );
                    }
                    return Err(error);
                }
            }
        }
    }

    fn report(
        &self,
        site: &CallSite<'_>,
        error: &dyn fmt::Display,
        class: FailureClass,
        disposition: Disposition,
        retry_count: u32,
        host: &HostDescriptor,
    ) {
        self.sink.report(&FailureReport {
            operation: site.op.name,
            module: site.op.module,
            error,
            class,
            disposition,
            retry_count,
            host,
        });
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config.load_full())
            .field("sink", &"<sink>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    type Recorded = Arc<Mutex<Vec<(Disposition, u32)>>>;

    fn recording_policy(config: RetryConfig) -> (RetryPolicy, Recorded) {
        let recorded: Recorded = Arc::default();
        let sink_log = recorded.clone();
        let policy = RetryPolicy::new(config).with_sink(Arc::new(move |r: &FailureReport<'_>| {
            sink_log.lock().unwrap().push((r.disposition, r.retry_count));
        }));
        (policy, recorded)
    }

    #[test]
    fn test_op_id_namespace() {
        let id = op_id!("list_symbols");
        assert_eq!(id.name, "list_symbols");
        assert!(id.in_namespace("store_guard"));
        assert!(id.in_namespace("retries"));
        assert!(!id.in_namespace("store"));
        assert!(id.to_string().ends_with("::list_symbols"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_first_attempt() {
        let (policy, recorded) = recording_policy(RetryConfig::default());
        let calls = AtomicU32::new(0);

        let result: Result<u32, StoreError> = policy
            .run(&CallSite::new(op_id!("read")), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(7) }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(recorded.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_is_not_retried() {
        let (policy, recorded) = recording_policy(RetryConfig::default());
        let calls = AtomicU32::new(0);

        let result: Result<(), StoreError> = policy
            .run(&CallSite::new(op_id!("write")), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(StoreError::DuplicateKey {
                        namespace: "db.c".into(),
                        key: "{ _id: 1 }".into(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(StoreError::DuplicateKey { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(recorded.lock().unwrap().as_slice(), &[(Disposition::Raised, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unclassified_reported_only_in_namespace() {
        let (policy, recorded) = recording_policy(RetryConfig::default());

        let outside = CallSite::new(OpId::new("lookup", "other_crate::reader"));
        let result: Result<(), StoreError> = policy
            .run(&outside, || async { Err(StoreError::NamespaceNotFound("db.c".into())) })
            .await;
        assert!(matches!(result, Err(StoreError::NamespaceNotFound(_))));
        assert!(recorded.lock().unwrap().is_empty());

        let inside = CallSite::new(op_id!("lookup"));
        let result: Result<(), StoreError> = policy
            .run(&inside, || async { Err(StoreError::NamespaceNotFound("db.c".into())) })
            .await;
        assert!(result.is_err());
        assert_eq!(recorded.lock().unwrap().as_slice(), &[(Disposition::Unhandled, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_warn_threshold_does_not_change_outcome() {
        let config = RetryConfig {
            warn_after: 0,
            ..RetryConfig::default()
        };
        let (policy, recorded) = recording_policy(config);
        let calls = AtomicU32::new(0);

        let result: Result<&str, StoreError> = policy
            .run(&CallSite::new(op_id!("read")), || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(StoreError::auto_reconnect("reset"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(
            recorded.lock().unwrap().as_slice(),
            &[(Disposition::Retrying, 1), (Disposition::Retrying, 2)]
        );
    }

    #[tokio::test]
    async fn test_follow_applies_updates() {
        let policy = RetryPolicy::default();
        let (tx, rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = policy.follow(rx, shutdown_rx);

        let mut update = GuardConfig::default();
        update.retries.max_retries = 4;
        tx.send(update).unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(policy.config().max_retries, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_changes_ceiling() {
        let (policy, _) = recording_policy(RetryConfig::default());
        policy.apply(RetryConfig {
            max_retries: 1,
            ..RetryConfig::default()
        });
        assert_eq!(policy.config().max_retries, 1);

        let calls = AtomicU32::new(0);
        let result: Result<(), StoreError> = policy
            .run(&CallSite::new(op_id!("read")), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(StoreError::operation_failure("busy")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
