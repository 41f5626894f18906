//! Metrics emitted by guarded calls and the memoizer.
//!
//! # Metrics
//! - `store_guard_retries_total` (counter): transient failures by operation
//! - `store_guard_failures_total` (counter): reported failures by operation, class, disposition
//! - `store_guard_backoff_seconds` (histogram): sleeps between attempts
//! - `store_guard_cache_lookups_total` (counter): memoizer lookups by collection, result
//!
//! No recorder is installed here; without one every call is a no-op.

use std::time::Duration;

use crate::resilience::classify::FailureClass;
use crate::resilience::sink::Disposition;

pub fn record_retry(operation: &str) {
    metrics::counter!("store_guard_retries_total", "operation" => operation.to_string())
        .increment(1);
}

pub fn record_failure(operation: &str, class: FailureClass, disposition: Disposition) {
    metrics::counter!(
        "store_guard_failures_total",
        "operation" => operation.to_string(),
        "class" => class.as_str(),
        "disposition" => disposition.as_str()
    )
    .increment(1);
}

pub fn record_backoff(delay: Duration) {
    metrics::histogram!("store_guard_backoff_seconds").record(delay.as_secs_f64());
}

pub fn record_cache_lookup(collection: &str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!(
        "store_guard_cache_lookups_total",
        "collection" => collection.to_string(),
        "result" => result
    )
    .increment(1);
}
