//! The unified handler shape (§9's collapsing of the old per-handler hook
//! DSL — `before_execute`/`after_execute`/`guard`/`option`/`async_execution`
//! — into one trait and one tagged-union result).
//!
//! A single [`Handler<Req, Resp>`] trait, returning a single [`Decision<T>`],
//! covers sampling, elicitation, and human-in-the-loop tool-call approval:
//! every one of those is "given some context, either produce a value right
//! away, refuse, or hand back a ticket the caller can redeem later."

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use mcp_protocol::types::elicitation::{ElicitRequest, ElicitResult};
use mcp_protocol::types::logging::LoggingMessageNotification;
use mcp_protocol::types::progress::ProgressNotification;
use mcp_protocol::types::resources::ResourceUpdatedNotification;
use mcp_protocol::types::sampling::{CreateMessageRequest, CreateMessageResult};
use serde_json::Value;

/// Outcome of asking a [`Handler`] to decide on some `Req`.
#[derive(Debug, Clone)]
pub enum Decision<T> {
    /// Produced a value synchronously.
    Accepted(T),
    /// Refused, with a human-readable reason.
    Denied(String),
    /// Neither yet: the decision will arrive later under `id`, and must
    /// do so within `timeout` or it is treated as denied.
    Deferred {
        /// Identifies this pending decision to whoever completes it later
        /// (an approval registry entry, an elicitation registry entry).
        id: String,
        /// How long to wait before timing the deferral out.
        timeout: Duration,
    },
}

/// One async decision point: given `Req`, decide on a `Resp`.
///
/// Implemented by application code and handed to the coordinator as
/// `Arc<dyn Handler<Req, Resp>>` for sampling, elicitation, and
/// human-in-the-loop tool-call gating.
#[async_trait]
pub trait Handler<Req, Resp>: Send + Sync {
    /// Makes the decision. Called once per occurrence of `Req`; may defer.
    async fn execute(&self, ctx: Req) -> Decision<Resp>;
}

/// Context a human-in-the-loop handler decides over: which tool, with
/// what arguments.
#[derive(Debug, Clone)]
pub struct ToolCallContext {
    /// Tool name being invoked.
    pub tool_name: String,
    /// Arguments the server will see if approved.
    pub arguments: Option<HashMap<String, Value>>,
}

/// Sampling decision handler: answers `sampling/createMessage`.
pub type SamplingHandler = dyn Handler<CreateMessageRequest, CreateMessageResult>;

/// Elicitation decision handler: answers `elicitation/create`.
pub type ElicitationHandler = dyn Handler<ElicitRequest, ElicitResult>;

/// Human-in-the-loop handler gating `tools/call`. `()` carries no payload:
/// approval is binary, the interesting data is in [`Decision::Denied`]'s
/// reason or [`Decision::Deferred`]'s id.
pub type HitlHandler = dyn Handler<ToolCallContext, ()>;

/// Passive notification sink. Every method defaults to a no-op so callers
/// only override the notification families they care about, matching how
/// sparse most integrations' interest in the full notification surface is.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// `notifications/progress`.
    async fn on_progress(&self, _notification: ProgressNotification) {}
    /// `notifications/message`.
    async fn on_log(&self, _notification: LoggingMessageNotification) {}
    /// `notifications/resources/updated`.
    async fn on_resource_updated(&self, _notification: ResourceUpdatedNotification) {}
    /// `notifications/resources/list_changed`.
    async fn on_resources_list_changed(&self) {}
    /// `notifications/tools/list_changed`.
    async fn on_tools_list_changed(&self) {}
    /// `notifications/prompts/list_changed`.
    async fn on_prompts_list_changed(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysAccept;

    #[async_trait]
    impl Handler<u32, u32> for AlwaysAccept {
        async fn execute(&self, ctx: u32) -> Decision<u32> {
            Decision::Accepted(ctx * 2)
        }
    }

    struct AlwaysDefer;

    #[async_trait]
    impl Handler<ToolCallContext, ()> for AlwaysDefer {
        async fn execute(&self, _ctx: ToolCallContext) -> Decision<()> {
            Decision::Deferred { id: "ticket-1".into(), timeout: Duration::from_secs(30) }
        }
    }

    #[tokio::test]
    async fn accepted_decision_carries_value() {
        let handler = AlwaysAccept;
        match handler.execute(21).await {
            Decision::Accepted(value) => assert_eq!(value, 42),
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[tokio::test]
    async fn deferred_decision_carries_id_and_timeout() {
        let handler = AlwaysDefer;
        let ctx = ToolCallContext { tool_name: "delete_file".into(), arguments: None };
        match handler.execute(ctx).await {
            Decision::Deferred { id, timeout } => {
                assert_eq!(id, "ticket-1");
                assert_eq!(timeout, Duration::from_secs(30));
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }
}
