// crates/nods-core/src/context.rs
// ============================================================================
// Module: Query Context
// Description: Per-request deadline, cancellation, and rule depth.
// Purpose: Propagate inbound cancellation to outbound provider calls.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A [`QueryContext`] travels with every provider call. Clones share the
//! cancellation flag, so cancelling the request context cancels every nested
//! rule lookup. Remote providers derive their timeouts from
//! [`QueryContext::remaining`], and the caching decorator refuses to store
//! results produced after cancellation.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

/// Request-scoped context shared by all lookups of one query.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    /// Optional absolute deadline.
    deadline: Option<Instant>,
    /// Shared cancellation flag.
    cancelled: Arc<AtomicBool>,
    /// Number of rule re-entries above this lookup.
    depth: usize,
}

impl QueryContext {
    /// Creates a context without deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context that expires after `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(timeout),
            ..Self::default()
        }
    }

    /// Cancels this context and every clone of it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancelled or past the deadline.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Returns the time left before the deadline, if one is set.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns the smaller of `fallback` and the remaining time.
    #[must_use]
    pub fn timeout_or(&self, fallback: Duration) -> Duration {
        self.remaining().map_or(fallback, |left| left.min(fallback))
    }

    /// Returns the rule re-entry depth.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Returns a clone one rule level deeper, sharing cancellation.
    #[must_use]
    pub fn nested(&self) -> Self {
        Self {
            deadline: self.deadline,
            cancelled: Arc::clone(&self.cancelled),
            depth: self.depth.saturating_add(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::QueryContext;

    /// Tests that cancellation is shared by nested clones.
    #[test]
    fn nested_contexts_share_cancellation() {
        let ctx = QueryContext::new();
        let nested = ctx.nested().nested();
        assert_eq!(nested.depth(), 2);
        assert!(!nested.is_cancelled());
        ctx.cancel();
        assert!(nested.is_cancelled());
    }

    /// Tests that an elapsed deadline reads as cancelled.
    #[test]
    fn zero_timeout_is_immediately_cancelled() {
        let ctx = QueryContext::with_timeout(Duration::ZERO);
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.timeout_or(Duration::from_secs(5)), Duration::ZERO);
    }
}
