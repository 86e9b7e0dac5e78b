//! Human-in-the-loop tool-call approvals (§4.6). A deferred approval
//! decision is registered under an id the coordinator handed back to the
//! caller; the decision itself often arrives later from outside the
//! coordinator's own task (a CLI prompt, a chat UI) so in addition to the
//! instance-level `approve`/`deny`, completed ids are tracked in a
//! process-global index keyed by id so a bare id is enough to route the
//! decision back to the registry that owns it.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use dashmap::DashMap;
use serde_json::Value;

use super::Registry;
use crate::promise::PromiseHandle;

/// What's being approved: a `tools/call` invocation.
#[derive(Debug, Clone)]
pub struct ApprovalContext {
    pub tool_name: String,
    pub arguments: Option<HashMap<String, Value>>,
}

/// The human's decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved,
    Denied(String),
}

type Inner = Registry<ApprovalContext, ApprovalOutcome>;

/// Approval registry for one coordinator instance.
pub struct ApprovalRegistry {
    inner: Arc<Inner>,
}

fn global_index() -> &'static DashMap<String, Arc<ApprovalRegistry>> {
    static INDEX: OnceLock<DashMap<String, Arc<ApprovalRegistry>>> = OnceLock::new();
    INDEX.get_or_init(DashMap::new)
}

impl ApprovalRegistry {
    /// Builds a fresh, empty approval registry.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self { inner: Registry::new("Approval timed out") })
    }

    /// Registers a deferred approval and publishes it to the global index
    /// so [`approve`]/[`deny`] can complete it by id alone.
    pub fn defer(
        self: &Arc<Self>,
        id: String,
        ctx: ApprovalContext,
        deadline: Instant,
    ) -> PromiseHandle<ApprovalOutcome> {
        let handle = self.inner.store(id.clone(), ctx, deadline);
        global_index().insert(id, self.clone());
        handle
    }

    /// Approves a pending request owned by this registry.
    pub fn approve(&self, id: &str) -> bool {
        global_index().remove(id);
        self.inner.complete(id, ApprovalOutcome::Approved)
    }

    /// Denies a pending request owned by this registry.
    pub fn deny(&self, id: &str, reason: impl Into<String>) -> bool {
        global_index().remove(id);
        self.inner.complete(id, ApprovalOutcome::Denied(reason.into()))
    }

    /// Context of a still-pending approval, if any.
    #[must_use]
    pub fn context(&self, id: &str) -> Option<ApprovalContext> {
        self.inner.context(id)
    }

    /// Rejects every pending approval; called on coordinator shutdown.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

/// Approves a pending approval anywhere in the process, by id alone.
/// Returns `false` if no registry has an entry under that id (already
/// decided, expired, or never existed).
pub fn approve(id: &str) -> bool {
    let Some((_, registry)) = global_index().remove(id) else {
        return false;
    };
    registry.inner.complete(id, ApprovalOutcome::Approved)
}

/// Denies a pending approval anywhere in the process, by id alone.
pub fn deny(id: &str, reason: impl Into<String>) -> bool {
    let Some((_, registry)) = global_index().remove(id) else {
        return false;
    };
    registry.inner.complete(id, ApprovalOutcome::Denied(reason.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn instance_approve_resolves_handle() {
        let registry = ApprovalRegistry::new();
        let handle = registry.defer(
            "a1".into(),
            ApprovalContext { tool_name: "delete_file".into(), arguments: None },
            Instant::now() + Duration::from_secs(5),
        );
        assert!(registry.approve("a1"));
        assert_eq!(handle.wait().await, crate::promise::Outcome::Resolved(ApprovalOutcome::Approved));
    }

    #[tokio::test]
    async fn global_deny_routes_to_owning_registry() {
        let registry = ApprovalRegistry::new();
        let handle = registry.defer(
            "global-1".into(),
            ApprovalContext { tool_name: "rm_rf".into(), arguments: None },
            Instant::now() + Duration::from_secs(5),
        );
        assert!(deny("global-1", "operator declined"));
        assert_eq!(
            handle.wait().await,
            crate::promise::Outcome::Resolved(ApprovalOutcome::Denied("operator declined".into()))
        );
    }

    #[test]
    fn unknown_id_approve_is_false() {
        assert!(!approve("does-not-exist"));
    }
}
