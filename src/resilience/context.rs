//! Retry state shared by one call chain.
//!
//! A chain starts at the first guarded call made with a fresh context and
//! includes every nested guarded call that is handed a clone of it. All of
//! them increment the same counter, so nested retries draw on the same
//! ceiling and push the same backoff exponent as the outer call. Only the
//! invocation that opened the chain resets it.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct ChainState {
    in_retry: AtomicBool,
    retry_count: AtomicU32,
}

/// Handle to a call chain's retry state. Clones share the state.
#[derive(Debug, Clone, Default)]
pub struct RetryContext {
    state: Arc<ChainState>,
}

impl RetryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a guarded call of this chain is running.
    pub fn in_retry(&self) -> bool {
        self.state.in_retry.load(Ordering::SeqCst)
    }

    /// Transient failures seen so far by the whole chain.
    pub fn retry_count(&self) -> u32 {
        self.state.retry_count.load(Ordering::SeqCst)
    }

    /// Join the chain, taking ownership of it if nobody holds it yet.
    pub(crate) fn enter(&self) -> ChainGuard {
        let owner = self
            .state
            .in_retry
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        ChainGuard {
            context: self.clone(),
            owner,
        }
    }

    /// Count one transient failure, returning the new total.
    pub(crate) fn record_transient(&self) -> u32 {
        self.state.retry_count.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Leaves the chain on drop; the owner resets it.
#[derive(Debug)]
pub(crate) struct ChainGuard {
    context: RetryContext,
    owner: bool,
}

impl ChainGuard {
    pub(crate) fn is_owner(&self) -> bool {
        self.owner
    }
}

impl Drop for ChainGuard {
    fn drop(&mut self) {
        if self.owner {
            self.context.state.retry_count.store(0, Ordering::SeqCst);
            self.context.state.in_retry.store(false, Ordering::SeqCst);
        }
    }
}
