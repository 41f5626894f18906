//! Shared utilities for the integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use store_guard::config::RetryConfig;
use store_guard::resilience::{Disposition, FailureClass, FailureReport, FailureSink};
use store_guard::{RetryPolicy, StoreError};

/// One report as seen by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub operation: String,
    pub class: FailureClass,
    pub disposition: Disposition,
    pub retry_count: u32,
    pub error: String,
    pub host: String,
}

/// Sink that keeps every report for later assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    reports: Arc<Mutex<Vec<Recorded>>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn reports(&self) -> Vec<Recorded> {
        self.reports.lock().unwrap().clone()
    }

    pub fn dispositions(&self) -> Vec<(Disposition, u32)> {
        self.reports()
            .into_iter()
            .map(|r| (r.disposition, r.retry_count))
            .collect()
    }
}

impl FailureSink for RecordingSink {
    fn report(&self, report: &FailureReport<'_>) {
        self.reports.lock().unwrap().push(Recorded {
            operation: report.operation.to_string(),
            class: report.class,
            disposition: report.disposition,
            retry_count: report.retry_count,
            error: report.error.to_string(),
            host: report.host.to_string(),
        });
    }
}

/// Policy with default settings reporting to `sink`.
#[allow(dead_code)]
pub fn policy_with(config: RetryConfig, sink: &RecordingSink) -> RetryPolicy {
    RetryPolicy::new(config).with_sink(Arc::new(sink.clone()))
}

/// An operation that fails with the queued errors in order, then succeeds
/// with the number of the attempt.
#[derive(Debug, Default)]
pub struct Script {
    failures: Mutex<VecDeque<StoreError>>,
    calls: AtomicU32,
}

#[allow(dead_code)]
impl Script {
    pub fn new(failures: Vec<StoreError>) -> Self {
        Self {
            failures: Mutex::new(failures.into()),
            calls: AtomicU32::new(0),
        }
    }

    /// `count` transient failures, numbered 1.. through the error code.
    pub fn transient(count: u32) -> Self {
        Self::new(
            (1..=count)
                .map(|n| StoreError::OperationFailure {
                    code: n as i32,
                    message: format!("transient #{}", n),
                })
                .collect(),
        )
    }

    pub async fn attempt(&self) -> Result<u32, StoreError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(call),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}
