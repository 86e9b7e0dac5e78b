//! Generic keyed registry for pending, possibly-deferred decisions (§4.6):
//! human-in-the-loop approvals and elicitation requests both fit this
//! shape — an id, some context about what's being decided, a deadline,
//! and exactly one eventual settlement. The approval- and
//! elicitation-specific sugar lives in [`approvals`] and [`elicitations`].

pub mod approvals;
pub mod elicitations;

use std::sync::{Arc, Weak};
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::promise::{Promise, PromiseHandle};
use crate::scheduler::Scheduler;

struct Entry<Ctx, Resp: Clone + Send + Sync + 'static> {
    ctx: Ctx,
    promise: Promise<Resp>,
}

/// A table of outstanding decisions keyed by id, each backed by the
/// shared [`Scheduler`] rather than its own timer.
pub struct Registry<Ctx: Clone + Send + Sync + 'static, Resp: Clone + Send + Sync + 'static> {
    entries: DashMap<String, Entry<Ctx, Resp>>,
    scheduler: Scheduler,
    expiry_reason: String,
}

impl<Ctx: Clone + Send + Sync + 'static, Resp: Clone + Send + Sync + 'static> Registry<Ctx, Resp> {
    /// Builds a registry and starts its background expiry task. `expiry_reason`
    /// is the rejection reason used when an entry's deadline elapses
    /// unclaimed.
    #[must_use]
    pub fn new(expiry_reason: impl Into<String>) -> Arc<Self> {
        let (expired_tx, mut expired_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(Self {
            entries: DashMap::new(),
            scheduler: Scheduler::spawn(expired_tx),
            expiry_reason: expiry_reason.into(),
        });

        let weak: Weak<Self> = Arc::downgrade(&registry);
        tokio::spawn(async move {
            while let Some(id) = expired_rx.recv().await {
                let Some(registry) = weak.upgrade() else { break };
                registry.timeout(&id);
            }
        });

        registry
    }

    /// Registers a new pending decision and returns a handle the caller
    /// can await independently of whoever eventually completes it.
    pub fn store(&self, id: String, ctx: Ctx, deadline: Instant) -> PromiseHandle<Resp> {
        let (promise, handle) = Promise::new();
        self.scheduler.schedule(id.clone(), deadline);
        self.entries.insert(id, Entry { ctx, promise });
        handle
    }

    /// Looks up the context that was stored for `id`, if still pending.
    #[must_use]
    pub fn context(&self, id: &str) -> Option<Ctx> {
        self.entries.get(id).map(|entry| entry.ctx.clone())
    }

    /// Settles `id` with a resolved value. Returns `false` if no such
    /// entry exists or it already settled.
    pub fn complete(&self, id: &str, value: Resp) -> bool {
        let Some((_, entry)) = self.entries.remove(id) else {
            return false;
        };
        self.scheduler.cancel(id);
        entry.promise.resolve(value)
    }

    /// Settles `id` with a rejection (explicit deny, or caller-driven
    /// cancellation). Returns `false` if no such entry exists.
    pub fn cancel(&self, id: &str, reason: impl Into<String>) -> bool {
        let Some((_, entry)) = self.entries.remove(id) else {
            return false;
        };
        self.scheduler.cancel(id);
        entry.promise.reject(reason.into())
    }

    fn timeout(&self, id: &str) {
        if let Some((_, entry)) = self.entries.remove(id) {
            entry.promise.timeout();
        }
    }

    /// Number of entries still pending.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry currently has no pending entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rejects every pending entry with the registry's configured expiry
    /// reason and clears the table. Called when the owning coordinator
    /// stops.
    pub fn shutdown(&self) {
        let ids: Vec<String> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            self.cancel(&id, self.expiry_reason.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn store_then_complete_resolves_handle() {
        let registry: Arc<Registry<String, i32>> = Registry::new("timed out");
        let handle = registry.store("a".into(), "ctx".into(), Instant::now() + Duration::from_secs(5));
        assert!(registry.complete("a", 7));
        assert_eq!(handle.wait().await, crate::promise::Outcome::Resolved(7));
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn unclaimed_entry_times_out() {
        let registry: Arc<Registry<String, i32>> = Registry::new("expired");
        let handle = registry.store("a".into(), "ctx".into(), Instant::now() + Duration::from_millis(20));
        assert_eq!(handle.wait().await, crate::promise::Outcome::TimedOut);
    }

    #[tokio::test]
    async fn shutdown_rejects_all_pending() {
        let registry: Arc<Registry<String, i32>> = Registry::new("shutting down");
        let handle = registry.store("a".into(), "ctx".into(), Instant::now() + Duration::from_secs(5));
        registry.shutdown();
        assert_eq!(
            handle.wait().await,
            crate::promise::Outcome::Rejected("shutting down".into())
        );
    }

    #[test]
    fn context_lookup_reflects_pending_state() {
        let registry: Arc<Registry<String, i32>> = Registry::new("timed out");
        let _handle = registry.store("a".into(), "payload".into(), Instant::now() + Duration::from_secs(5));
        assert_eq!(registry.context("a"), Some("payload".to_string()));
        assert_eq!(registry.context("missing"), None);
    }
}
