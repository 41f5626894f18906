//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Guarded store call:
//!     → retries.rs (run the operation, classify the failure)
//!     → classify.rs (permanent / transient / unclassified)
//!     → context.rs (count transient failures across the call chain)
//!     → backoff.rs (sleep before the next attempt)
//!     → sink.rs (report retries and terminal failures, with host.rs identity)
//! ```
//!
//! # Design Decisions
//! - Retry state belongs to a call chain, not to the process
//! - Nested guarded calls share the outer chain's budget and backoff exponent
//! - Only store conditions known to clear on their own are retried
//! - The original error is always what the caller sees

pub mod backoff;
pub mod classify;
pub mod context;
pub mod host;
pub mod retries;
pub mod sink;

pub use classify::{Classify, FailureClass};
pub use context::RetryContext;
pub use host::{HostDescriptor, HostInfo};
pub use retries::{CallSite, OpId, RetryPolicy};
pub use sink::{Disposition, FailureReport, FailureSink, MetricsSink, NoopSink};
