//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! resilience / cache produce:
//!     → tracing events (debug/warn/error per failure class)
//!     → metrics.rs (retry, failure, backoff, cache lookup counters)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, filtered by RUST_LOG or config)
//!     → whatever metrics recorder the embedding process installs
//! ```
//!
//! # Design Decisions
//! - Structured fields, never preformatted messages
//! - The library never installs a metrics exporter

pub mod logging;
pub mod metrics;
