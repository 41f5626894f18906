//! Diagnostics sinks for guarded-call failures.

use std::fmt;

use crate::observability::metrics;
use crate::resilience::classify::FailureClass;
use crate::resilience::host::HostDescriptor;

/// What the policy did with a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Transient failure, another attempt follows.
    Retrying,
    /// Transient failure past the ceiling, returned to the caller.
    Exhausted,
    /// Permanent failure, returned to the caller.
    Raised,
    /// Unclassified failure from an always-log namespace, returned to the caller.
    Unhandled,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Retrying => "retrying",
            Disposition::Exhausted => "exhausted",
            Disposition::Raised => "raised",
            Disposition::Unhandled => "unhandled",
        }
    }
}

/// One reported failure of a guarded call.
#[derive(Clone, Copy)]
pub struct FailureReport<'a> {
    pub operation: &'a str,
    pub module: &'a str,
    pub error: &'a dyn fmt::Display,
    pub class: FailureClass,
    pub disposition: Disposition,
    /// The chain's retry count when the failure was handled.
    pub retry_count: u32,
    pub host: &'a HostDescriptor,
}

impl fmt::Debug for FailureReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureReport")
            .field("operation", &self.operation)
            .field("module", &self.module)
            .field("error", &format_args!("{}", self.error))
            .field("class", &self.class)
            .field("disposition", &self.disposition)
            .field("retry_count", &self.retry_count)
            .field("host", &self.host)
            .finish()
    }
}

/// Receives every retry and every terminal failure of guarded calls.
pub trait FailureSink: Send + Sync {
    fn report(&self, report: &FailureReport<'_>);
}

impl<F> FailureSink for F
where
    F: Fn(&FailureReport<'_>) + Send + Sync,
{
    fn report(&self, report: &FailureReport<'_>) {
        self(report)
    }
}

/// Counts failures by operation, class and disposition.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSink;

impl FailureSink for MetricsSink {
    fn report(&self, report: &FailureReport<'_>) {
        metrics::record_failure(report.operation, report.class, report.disposition);
    }
}

/// Discards reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl FailureSink for NoopSink {
    fn report(&self, _report: &FailureReport<'_>) {}
}
