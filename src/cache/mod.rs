//! Store-backed result cache.
//!
//! # Data Flow
//! ```text
//! Memoized::new (once)
//!     → naming.rs (collection name from prefix, operation, module digest)
//!     → DocumentStore: create collection + TTL index on `date` if missing
//!
//! Memoized::call (every call)
//!     → find_one → hit: return cached_data
//!     → miss: run operation → delete_many → insert_one { date, cached_data }
//! ```
//!
//! # Design Decisions
//! - Single slot per operation, shared by all argument values
//! - The store expires entries; the memoizer never checks ages itself

pub mod memoize;
pub mod naming;

pub use memoize::{memoize, CacheSettings, Memoized};
pub use naming::collection_name;
