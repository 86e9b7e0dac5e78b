//! The [`Coordinator`]: the single actor owning one MCP session (§4.5).
//!
//! Grounded on `turbomcp-client::client::core::Client` for the overall
//! shape (capability auto-detection from registered handlers, a
//! `process_message`-style dispatch for server-initiated traffic) but
//! restructured around the workspace's own [`Transport`] contract, which
//! pushes inbound envelopes onto a channel rather than exposing a
//! `receive()` the caller polls. That difference means the coordinator
//! drives its own background task reading [`InboundReceiver`] instead of
//! a user-facing `process_message()` loop.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use mcp_protocol::envelope::RequestId;
use mcp_protocol::types::elicitation::ElicitRequest;
use mcp_protocol::types::logging::SetLevelRequest;
use mcp_protocol::types::roots::{ListRootsResult, Root};
use mcp_protocol::types::sampling::CreateMessageRequest;
use mcp_protocol::types::{
    CallToolRequest, CallToolResult, CompleteRequest, CompleteResult, GetPromptRequest,
    GetPromptResult, Implementation, InitializeRequest, InitializeResult, ListPromptsRequest,
    ListPromptsResult, ListResourceTemplatesRequest, ListResourceTemplatesResult,
    ListResourcesRequest, ListResourcesResult, ListToolsRequest, ListToolsResult, LogLevel,
    ReadResourceRequest, ReadResourceResult, ServerCapabilities, SubscribeRequest, Tool,
};
use mcp_protocol::{methods, Message, McpError, McpResult, DEFAULT_REQUEST_TIMEOUT_MS};
use mcp_transport_traits::{InboundReceiver, Transport};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Notify;
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::cancellable::CancellableOperation;
use crate::dispatch::{Decision, ElicitationHandler, HitlHandler, NotificationSink, SamplingHandler, ToolCallContext};
use crate::error::{from_transport_error, from_transport_error_untargeted};
use crate::promise::Outcome;
use crate::registry::approvals::{ApprovalContext, ApprovalOutcome, ApprovalRegistry};
use crate::registry::elicitations::ElicitationRegistry;

fn id_to_value(id: &RequestId) -> Value {
    match id {
        RequestId::Number(n) => json!(n),
        RequestId::String(s) => json!(s),
    }
}

fn value_to_id(value: &Value) -> Option<RequestId> {
    match value {
        Value::Number(n) => n.as_i64().map(RequestId::Number),
        Value::String(s) => Some(RequestId::String(s.clone())),
        _ => None,
    }
}

fn denied_tool_result(reason: impl Into<String>) -> CallToolResult {
    use mcp_protocol::types::content::{ContentBlock, TextContent};
    CallToolResult {
        content: vec![ContentBlock::Text(TextContent { text: reason.into(), annotations: None })],
        is_error: Some(true),
        structured_content: None,
    }
}

/// Builds a [`Coordinator`] before it is started. Mirrors the teacher's
/// fluent `Client::with_capabilities`-style construction, but produces an
/// `Arc` since the running coordinator owns background tasks that need
/// shared ownership of its state.
pub struct CoordinatorBuilder {
    transport: Box<dyn Transport>,
    inbound_rx: InboundReceiver,
    client_info: Implementation,
    roots: Vec<Root>,
    logging_level: Option<LogLevel>,
    request_timeout: Duration,
    sampling_handler: Option<Arc<SamplingHandler>>,
    elicitation_handler: Option<Arc<ElicitationHandler>>,
    hitl_handler: Option<Arc<HitlHandler>>,
    notifications: Option<Arc<dyn NotificationSink>>,
}

impl CoordinatorBuilder {
    /// Starts a builder around an already-constructed transport and its
    /// paired inbound channel.
    #[must_use]
    pub fn new(transport: Box<dyn Transport>, inbound_rx: InboundReceiver, client_info: Implementation) -> Self {
        Self {
            transport,
            inbound_rx,
            client_info,
            roots: Vec::new(),
            logging_level: None,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            sampling_handler: None,
            elicitation_handler: None,
            hitl_handler: None,
            notifications: None,
        }
    }

    /// Advertises these filesystem roots and answers `roots/list` with them.
    #[must_use]
    pub fn with_roots(mut self, roots: Vec<Root>) -> Self {
        self.roots = roots;
        self
    }

    /// Registers a handler for server-initiated `sampling/createMessage`.
    #[must_use]
    pub fn with_sampling_handler(mut self, handler: Arc<SamplingHandler>) -> Self {
        self.sampling_handler = Some(handler);
        self
    }

    /// Registers a handler for server-initiated `elicitation/create`.
    #[must_use]
    pub fn with_elicitation_handler(mut self, handler: Arc<ElicitationHandler>) -> Self {
        self.elicitation_handler = Some(handler);
        self
    }

    /// Registers a human-in-the-loop approval gate for `tools/call`.
    #[must_use]
    pub fn with_hitl_handler(mut self, handler: Arc<HitlHandler>) -> Self {
        self.hitl_handler = Some(handler);
        self
    }

    /// Registers a sink for passive server→client notifications.
    #[must_use]
    pub fn with_notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notifications = Some(sink);
        self
    }

    /// Overrides the per-request timeout (default 30 s, see
    /// [`mcp_protocol::DEFAULT_REQUEST_TIMEOUT_MS`]).
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the logging level to request via `logging/setLevel` right
    /// after `start()` completes the handshake.
    #[must_use]
    pub fn with_logging_level(mut self, level: LogLevel) -> Self {
        self.logging_level = Some(level);
        self
    }

    /// Finishes construction. The coordinator is not yet started; call
    /// [`Coordinator::start`] to open the transport and run `initialize`.
    #[must_use]
    pub fn build(self) -> Arc<Coordinator> {
        Arc::new(Coordinator {
            transport: self.transport,
            client_info: self.client_info,
            protocol_version: StdMutex::new(None),
            server_capabilities: StdMutex::new(None),
            roots: self.roots,
            logging_level: self.logging_level,
            sampling_handler: self.sampling_handler,
            elicitation_handler: self.elicitation_handler,
            hitl_handler: self.hitl_handler,
            notifications: self.notifications,
            approvals: ApprovalRegistry::new(),
            elicitations: ElicitationRegistry::new(),
            server_requests: DashMap::new(),
            next_id: AtomicI64::new(1),
            request_timeout: self.request_timeout,
            initialized: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            inbound_rx: TokioMutex::new(Some(self.inbound_rx)),
            inbound_task: TokioMutex::new(None),
            shutdown: Notify::new(),
        })
    }
}

/// The central actor owning one MCP session: one transport, one
/// negotiated protocol version, and the handler registries that answer
/// server-initiated traffic.
pub struct Coordinator {
    transport: Box<dyn Transport>,
    client_info: Implementation,
    protocol_version: StdMutex<Option<String>>,
    server_capabilities: StdMutex<Option<ServerCapabilities>>,
    roots: Vec<Root>,
    logging_level: Option<LogLevel>,
    sampling_handler: Option<Arc<SamplingHandler>>,
    elicitation_handler: Option<Arc<ElicitationHandler>>,
    hitl_handler: Option<Arc<HitlHandler>>,
    notifications: Option<Arc<dyn NotificationSink>>,
    approvals: Arc<ApprovalRegistry>,
    elicitations: Arc<ElicitationRegistry>,
    server_requests: DashMap<RequestId, Arc<CancellableOperation>>,
    next_id: AtomicI64,
    request_timeout: Duration,
    initialized: AtomicBool,
    stopped: AtomicBool,
    inbound_rx: TokioMutex<Option<InboundReceiver>>,
    inbound_task: TokioMutex<Option<JoinHandle<()>>>,
    shutdown: Notify,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("protocol_version", &self.protocol_version.lock().unwrap())
            .field("initialized", &self.initialized.load(Ordering::Relaxed))
            .finish()
    }
}

impl Coordinator {
    fn allocate_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn ensure_initialized(&self) -> McpResult<()> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(McpError::transport("coordinator not initialized; call start() first"))
        }
    }

    fn build_client_capabilities(&self) -> mcp_protocol::types::ClientCapabilities {
        let mut caps = mcp_protocol::types::ClientCapabilities::none();
        if !self.roots.is_empty() {
            caps = caps.with_roots(false);
        }
        if self.sampling_handler.is_some() {
            caps = caps.with_sampling();
        }
        if self.elicitation_handler.is_some() {
            caps = caps.with_elicitation();
        }
        caps
    }

    /// Currently negotiated protocol version, if `start()` has completed.
    #[must_use]
    pub fn protocol_version(&self) -> Option<String> {
        self.protocol_version.lock().unwrap().clone()
    }

    /// Capabilities the server advertised, if `start()` has completed.
    #[must_use]
    pub fn server_capabilities(&self) -> Option<ServerCapabilities> {
        self.server_capabilities.lock().unwrap().clone()
    }

    /// Opens the transport, runs the `initialize` handshake, and starts
    /// the background loop that dispatches server-initiated traffic.
    pub async fn start(self: &Arc<Self>) -> McpResult<InitializeResult> {
        self.transport.start().await.map_err(from_transport_error_untargeted)?;

        let params = InitializeRequest {
            protocol_version: mcp_protocol::PROTOCOL_VERSION.to_string(),
            capabilities: self.build_client_capabilities(),
            client_info: self.client_info.clone(),
        };
        let id = self.allocate_id();
        let body = json!({
            "jsonrpc": "2.0",
            "id": id_to_value(&id),
            "method": methods::INITIALIZE,
            "params": serde_json::to_value(&params)?,
        });
        let message = self.call(body, id).await?;
        let result: InitializeResult = serde_json::from_value(message.result().cloned().unwrap_or(Value::Null))?;

        if !mcp_protocol::SUPPORTED_PROTOCOL_VERSIONS.contains(&result.protocol_version.as_str()) {
            return Err(McpError::UnsupportedProtocolVersion {
                server: result.protocol_version,
                supported: mcp_protocol::SUPPORTED_PROTOCOL_VERSIONS.to_vec(),
            });
        }

        *self.protocol_version.lock().unwrap() = Some(result.protocol_version.clone());
        *self.server_capabilities.lock().unwrap() = Some(result.capabilities.clone());
        self.transport.set_protocol_version(&result.protocol_version);
        self.initialized.store(true, Ordering::Release);

        let initialized_notice = json!({"jsonrpc": "2.0", "method": methods::INITIALIZED});
        self.transport
            .request(initialized_notice, false)
            .await
            .map_err(from_transport_error_untargeted)?;

        if let Some(level) = self.logging_level {
            self.set_logging(level).await?;
        }

        self.spawn_inbound_loop();

        debug!(
            protocol_version = %result.protocol_version,
            server = %result.server_info.name,
            "coordinator started"
        );
        Ok(result)
    }

    /// Stops dispatching, cancels pending server-initiated handlers,
    /// rejects any deferred approvals/elicitations, and closes the
    /// transport.
    pub async fn stop(self: &Arc<Self>) -> McpResult<()> {
        self.stopped.store(true, Ordering::Release);
        self.initialized.store(false, Ordering::Release);
        self.shutdown.notify_waiters();

        if let Some(handle) = self.inbound_task.lock().await.take() {
            handle.abort();
        }
        for entry in self.server_requests.iter() {
            entry.value().cancel();
        }
        self.server_requests.clear();
        self.approvals.shutdown();
        self.elicitations.shutdown();

        self.transport.close().await.map_err(from_transport_error_untargeted)
    }

    /// Stops, discards the negotiated session, and starts again.
    pub async fn restart(self: &Arc<Self>) -> McpResult<InitializeResult> {
        debug!("restarting coordinator, discarding previous session");
        self.stop().await?;
        *self.protocol_version.lock().unwrap() = None;
        *self.server_capabilities.lock().unwrap() = None;
        self.stopped.store(false, Ordering::Release);
        self.start().await
    }

    /// Sends one JSON-RPC body. Allocates an id if `body` doesn't already
    /// carry one and `wait` is true. Fire-and-forget (`wait = false`)
    /// bodies are sent as-is.
    pub async fn request(&self, mut body: Value, wait: bool) -> McpResult<Option<Message>> {
        if !wait {
            self.transport
                .request(body, false)
                .await
                .map_err(from_transport_error_untargeted)?;
            return Ok(None);
        }

        let id = match body.get("id") {
            Some(v) => value_to_id(v).ok_or_else(|| McpError::invalid_format("id must be a string or number"))?,
            None => {
                let id = self.allocate_id();
                body["id"] = id_to_value(&id);
                id
            }
        };
        self.call(body, id).await.map(Some)
    }

    async fn call(&self, body: Value, id: RequestId) -> McpResult<Message> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(McpError::transport("coordinator is stopped"));
        }

        let op = CancellableOperation::new();
        op.start();

        tokio::select! {
            biased;
            () = self.shutdown.notified() => {
                op.cancel();
                Err(McpError::transport("coordinator is shutting down"))
            }
            () = tokio::time::sleep(self.request_timeout) => {
                op.cancel();
                self.emit_cancelled(&id, "Request timed out").await;
                Err(McpError::Timeout { request_id: id })
            }
            result = self.transport.request(body, true) => {
                op.complete();
                match result {
                    Ok(Some(message)) => match message.raise_error() {
                        Some(err) => Err(err),
                        None => Ok(message),
                    },
                    Ok(None) => Err(McpError::transport("no response received for a waited request")),
                    Err(err) => Err(from_transport_error(err, &id)),
                }
            }
        }
    }

    async fn emit_cancelled(&self, id: &RequestId, reason: &str) {
        let body = json!({
            "jsonrpc": "2.0",
            "method": methods::NOTIFICATIONS_CANCELLED,
            "params": {"requestId": id_to_value(id), "reason": reason},
        });
        if let Err(err) = self.transport.request(body, false).await {
            warn!(?err, request_id = %id, "failed to send notifications/cancelled");
        }
    }

    async fn send_request<P: Serialize>(&self, method: &str, params: Option<&P>) -> McpResult<Message> {
        self.ensure_initialized()?;
        let id = self.allocate_id();
        let mut body = json!({"jsonrpc": "2.0", "id": id_to_value(&id), "method": method});
        if let Some(p) = params {
            body["params"] = serde_json::to_value(p)?;
        }
        self.call(body, id).await
    }

    async fn paginate<T, Req, Res>(
        &self,
        method: &str,
        mut make_request: impl FnMut(Option<String>) -> Req,
        mut items_of: impl FnMut(Res) -> (Vec<T>, Option<String>),
    ) -> McpResult<Vec<T>>
    where
        Req: Serialize,
        Res: serde::de::DeserializeOwned,
    {
        let mut out = Vec::new();
        let mut cursor = None;
        loop {
            let params = make_request(cursor.take());
            let message = self.send_request(method, Some(&params)).await?;
            let result: Res = serde_json::from_value(message.result().cloned().unwrap_or(Value::Null))?;
            let (mut page, next) = items_of(result);
            out.append(&mut page);
            match next {
                Some(next_cursor) => cursor = Some(next_cursor),
                None => break,
            }
        }
        Ok(out)
    }

    /// Lists every tool across all pages.
    pub async fn tool_list(&self) -> McpResult<Vec<Tool>> {
        self.paginate(
            methods::TOOLS_LIST,
            |cursor| ListToolsRequest { cursor },
            |result: ListToolsResult| (result.tools, result.next_cursor),
        )
        .await
    }

    /// Invokes a tool, gated by the human-in-the-loop handler if one is
    /// configured.
    pub async fn execute_tool(
        &self,
        name: &str,
        arguments: Option<std::collections::HashMap<String, Value>>,
    ) -> McpResult<CallToolResult> {
        if let Some(handler) = &self.hitl_handler {
            let ctx = ToolCallContext { tool_name: name.to_string(), arguments: arguments.clone() };
            match handler.execute(ctx).await {
                Decision::Accepted(()) => {}
                Decision::Denied(reason) => {
                    return Ok(denied_tool_result(format!("Tool call denied: {reason}")));
                }
                Decision::Deferred { id, timeout } => {
                    let ctx = ApprovalContext { tool_name: name.to_string(), arguments: arguments.clone() };
                    let deadline = Instant::now() + timeout.min(self.request_timeout);
                    let handle = self.approvals.defer(id, ctx, deadline);
                    match handle.wait().await {
                        Outcome::Resolved(ApprovalOutcome::Approved) => {}
                        Outcome::Resolved(ApprovalOutcome::Denied(reason)) => {
                            return Ok(denied_tool_result(format!("Tool call denied: {reason}")));
                        }
                        Outcome::Rejected(reason) => {
                            return Ok(denied_tool_result(format!("Tool call denied: {reason}")));
                        }
                        Outcome::Cancelled => {
                            return Ok(denied_tool_result("Tool call approval was cancelled"));
                        }
                        Outcome::TimedOut => {
                            return Ok(denied_tool_result("Approval timed out"));
                        }
                    }
                }
            }
        }

        let params = CallToolRequest { name: name.to_string(), arguments };
        let message = self.send_request(methods::TOOLS_CALL, Some(&params)).await?;
        Ok(serde_json::from_value(message.result().cloned().unwrap_or(Value::Null))?)
    }

    /// Lists every resource across all pages.
    pub async fn resource_list(&self) -> McpResult<Vec<mcp_protocol::types::Resource>> {
        self.paginate(
            methods::RESOURCES_LIST,
            |cursor| ListResourcesRequest { cursor },
            |result: ListResourcesResult| (result.resources, result.next_cursor),
        )
        .await
    }

    /// Reads one resource's contents.
    pub async fn resource_read(&self, uri: &str) -> McpResult<ReadResourceResult> {
        let params = ReadResourceRequest { uri: uri.to_string() };
        let message = self.send_request(methods::RESOURCES_READ, Some(&params)).await?;
        Ok(serde_json::from_value(message.result().cloned().unwrap_or(Value::Null))?)
    }

    /// Lists every resource template across all pages.
    pub async fn resource_template_list(&self) -> McpResult<Vec<mcp_protocol::types::ResourceTemplate>> {
        self.paginate(
            methods::RESOURCES_TEMPLATES_LIST,
            |cursor| ListResourceTemplatesRequest { cursor },
            |result: ListResourceTemplatesResult| (result.resource_templates, result.next_cursor),
        )
        .await
    }

    /// Subscribes to update notifications for one resource.
    pub async fn resources_subscribe(&self, uri: &str) -> McpResult<()> {
        let params = SubscribeRequest { uri: uri.to_string() };
        self.send_request(methods::RESOURCES_SUBSCRIBE, Some(&params)).await?;
        Ok(())
    }

    /// Lists every prompt across all pages.
    pub async fn prompt_list(&self) -> McpResult<Vec<mcp_protocol::types::Prompt>> {
        self.paginate(
            methods::PROMPTS_LIST,
            |cursor| ListPromptsRequest { cursor },
            |result: ListPromptsResult| (result.prompts, result.next_cursor),
        )
        .await
    }

    /// Renders a named prompt with the given arguments.
    pub async fn execute_prompt(
        &self,
        name: &str,
        arguments: Option<std::collections::HashMap<String, String>>,
    ) -> McpResult<GetPromptResult> {
        let params = GetPromptRequest { name: name.to_string(), arguments };
        let message = self.send_request(methods::PROMPTS_GET, Some(&params)).await?;
        Ok(serde_json::from_value(message.result().cloned().unwrap_or(Value::Null))?)
    }

    /// Requests argument-completion suggestions.
    pub async fn completion_complete(&self, request: CompleteRequest) -> McpResult<CompleteResult> {
        let message = self.send_request(methods::COMPLETION_COMPLETE, Some(&request)).await?;
        Ok(serde_json::from_value(message.result().cloned().unwrap_or(Value::Null))?)
    }

    /// Sets the server's logging verbosity.
    pub async fn set_logging(&self, level: LogLevel) -> McpResult<()> {
        let params = SetLevelRequest { level };
        self.send_request(methods::LOGGING_SET_LEVEL, Some(&params)).await?;
        Ok(())
    }

    /// Emits `notifications/cancelled` for `request_id` with `reason`.
    /// Exposed publicly so callers abandoning a `request()` call outside
    /// the coordinator's own timeout path can still notify the server.
    pub async fn cancelled_notification(&self, request_id: &RequestId, reason: &str) {
        self.emit_cancelled(request_id, reason).await;
    }

    async fn send_result_response<T: Serialize>(&self, id: &RequestId, result: &T) {
        let value = match serde_json::to_value(result) {
            Ok(v) => v,
            Err(err) => {
                warn!(%err, "failed to serialize server-initiated-request response");
                return self.send_error_response(id, -32603, err.to_string()).await;
            }
        };
        let envelope = mcp_protocol::envelope::ResponseEnvelope::success(id.clone(), value);
        self.send_envelope(envelope).await;
    }

    async fn send_error_response(&self, id: &RequestId, code: i32, message: String) {
        let error = mcp_protocol::envelope::JsonRpcError::new(code, message);
        let envelope = mcp_protocol::envelope::ResponseEnvelope::failure(id.clone(), error);
        self.send_envelope(envelope).await;
    }

    async fn send_envelope(&self, envelope: mcp_protocol::envelope::ResponseEnvelope) {
        let body = match serde_json::to_value(&envelope) {
            Ok(v) => v,
            Err(err) => {
                warn!(%err, "failed to serialize response envelope");
                return;
            }
        };
        if let Err(err) = self.transport.request(body, false).await {
            warn!(?err, "failed to deliver server-initiated-request response");
        }
    }

    /// Answers a `ping` the coordinator did not already auto-dispatch.
    pub async fn ping_response(&self, id: &RequestId) {
        self.send_result_response(id, &json!({})).await;
    }

    /// Answers a `roots/list` request with the configured roots, or an
    /// error if none are configured.
    pub async fn roots_list_response(&self, id: &RequestId) {
        if self.roots.is_empty() {
            self.send_error_response(id, -32000, "Roots are not enabled".to_string()).await;
        } else {
            let result = ListRootsResult { roots: self.roots.clone() };
            self.send_result_response(id, &result).await;
        }
    }

    /// Answers a `sampling/createMessage` request via the registered
    /// sampling handler, or an error if none is configured.
    pub async fn sampling_create_message_response(&self, id: &RequestId, request: CreateMessageRequest) {
        let Some(handler) = &self.sampling_handler else {
            self.send_error_response(id, -32000, "Sampling is not enabled".to_string()).await;
            return;
        };
        match handler.execute(request).await {
            Decision::Accepted(result) => self.send_result_response(id, &result).await,
            Decision::Denied(reason) => self.send_error_response(id, -1, reason).await,
            Decision::Deferred { .. } => {
                self.send_error_response(id, -32000, "Deferred sampling responses are not supported".to_string())
                    .await;
            }
        }
    }

    /// Answers an `elicitation/create` request, deferring to the
    /// elicitation registry when the handler defers.
    pub async fn elicitation_response(&self, id: &RequestId, request: ElicitRequest) {
        let Some(handler) = &self.elicitation_handler else {
            self.send_error_response(id, -32000, "Elicitation is not enabled".to_string()).await;
            return;
        };
        match handler.execute(request.clone()).await {
            Decision::Accepted(result) => self.send_result_response(id, &result).await,
            Decision::Denied(reason) => self.send_error_response(id, -32800, reason).await,
            Decision::Deferred { id: ticket, timeout } => {
                let deadline = Instant::now() + timeout.min(self.request_timeout);
                let handle = self.elicitations.defer(ticket, request, deadline);
                match handle.wait().await {
                    Outcome::Resolved(result) => self.send_result_response(id, &result).await,
                    Outcome::Rejected(reason) => self.send_error_response(id, -32800, reason).await,
                    Outcome::Cancelled => {
                        self.send_error_response(id, -32800, "elicitation cancelled".to_string()).await;
                    }
                    Outcome::TimedOut => {
                        self.send_error_response(id, -32801, "Elicitation timed out".to_string()).await;
                    }
                }
            }
        }
    }

    /// Answers an arbitrary server-initiated request with an explicit
    /// error, e.g. when a caller wants to reject unrecognized methods
    /// itself rather than let the default dispatch's `-32601` apply.
    pub async fn error_response(&self, id: &RequestId, code: i32, message: impl Into<String>) {
        self.send_error_response(id, code, message.into()).await;
    }

    fn spawn_inbound_loop(self: &Arc<Self>) {
        let Some(rx) = self.inbound_rx.try_lock().ok().and_then(|mut guard| guard.take()) else {
            warn!("inbound loop already running or receiver missing");
            return;
        };
        let coordinator = Arc::clone(self);
        let handle = tokio::spawn(async move { coordinator.run_inbound_loop(rx).await });
        // `inbound_task` is only ever populated here, under a fresh `start()`.
        let task_slot = Arc::clone(self);
        tokio::spawn(async move {
            *task_slot.inbound_task.lock().await = Some(handle);
        });
    }

    async fn run_inbound_loop(self: Arc<Self>, mut rx: InboundReceiver) {
        while let Some(message) = rx.recv().await {
            if message.response() {
                trace!(id = ?message.id(), "dropped unmatched response");
                continue;
            }
            if message.notification() {
                self.handle_notification(message).await;
                continue;
            }
            if message.request() {
                let coordinator = Arc::clone(&self);
                tokio::spawn(async move { coordinator.handle_server_request(message).await });
            }
        }
        debug!("inbound channel closed, dispatch loop exiting");
    }

    async fn handle_notification(&self, message: Message) {
        let Some(method) = message.method() else { return };
        if method == methods::NOTIFICATIONS_CANCELLED {
            self.handle_cancelled_notification(&message);
            return;
        }
        let Some(sink) = &self.notifications else { return };
        let params = message.params().cloned().unwrap_or(Value::Null);
        match method {
            methods::NOTIFICATIONS_PROGRESS => {
                if let Ok(n) = serde_json::from_value(params) {
                    sink.on_progress(n).await;
                }
            }
            methods::NOTIFICATIONS_MESSAGE => {
                if let Ok(n) = serde_json::from_value(params) {
                    sink.on_log(n).await;
                }
            }
            methods::NOTIFICATIONS_RESOURCES_UPDATED => {
                if let Ok(n) = serde_json::from_value(params) {
                    sink.on_resource_updated(n).await;
                }
            }
            methods::NOTIFICATIONS_RESOURCES_LIST_CHANGED => sink.on_resources_list_changed().await,
            methods::NOTIFICATIONS_TOOLS_LIST_CHANGED => sink.on_tools_list_changed().await,
            methods::NOTIFICATIONS_PROMPTS_LIST_CHANGED => sink.on_prompts_list_changed().await,
            other => trace!(method = %other, "unhandled notification method"),
        }
    }

    fn handle_cancelled_notification(&self, message: &Message) {
        #[derive(serde::Deserialize)]
        struct CancelledParams {
            #[serde(rename = "requestId")]
            request_id: RequestId,
        }
        let Some(params) = message.params().cloned() else { return };
        let Ok(parsed) = serde_json::from_value::<CancelledParams>(params) else { return };
        if let Some((_, op)) = self.server_requests.remove(&parsed.request_id) {
            op.cancel();
        }
    }

    async fn handle_server_request(self: Arc<Self>, message: Message) {
        let Some(id) = message.id().cloned() else { return };
        let op = Arc::new(CancellableOperation::new());
        op.start();
        self.server_requests.insert(id.clone(), op.clone());

        tokio::select! {
            () = op.wait_for_cancel() => {
                // The server has already abandoned this request id; replying
                // to it would violate the cancellation contract.
                op.finalize_cancelled();
            }
            () = self.dispatch_server_request(&id, &message) => {
                op.complete();
            }
        }

        self.server_requests.remove(&id);
    }

    async fn dispatch_server_request(&self, id: &RequestId, message: &Message) {
        match message.method() {
            Some(methods::PING) => self.ping_response(id).await,
            Some(methods::ROOTS_LIST) => self.roots_list_response(id).await,
            Some(methods::SAMPLING_CREATE_MESSAGE) => {
                match message.params().cloned().map(serde_json::from_value::<CreateMessageRequest>) {
                    Some(Ok(params)) => self.sampling_create_message_response(id, params).await,
                    Some(Err(err)) => {
                        self.send_error_response(id, -32602, format!("invalid createMessage params: {err}")).await;
                    }
                    None => self.send_error_response(id, -32602, "missing params".to_string()).await,
                }
            }
            Some(methods::ELICITATION_CREATE) => {
                match message.params().cloned().map(serde_json::from_value::<ElicitRequest>) {
                    Some(Ok(params)) => self.elicitation_response(id, params).await,
                    Some(Err(err)) => {
                        self.send_error_response(id, -32602, format!("invalid elicitation params: {err}")).await;
                    }
                    None => self.send_error_response(id, -32602, "missing params".to_string()).await,
                }
            }
            Some(other) => {
                self.send_error_response(id, -32601, format!("method not found: {other}")).await;
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_transport_traits::{inbound_channel, BoxFuture, TransportError, TransportResult, TransportState};
    use std::sync::atomic::AtomicU32;

    #[derive(Debug)]
    struct StubTransport {
        state: StdMutex<TransportState>,
        responses: StdMutex<Vec<Value>>,
        sent: StdMutex<Vec<Value>>,
        calls: AtomicU32,
    }

    impl StubTransport {
        fn new(responses: Vec<Value>) -> Self {
            Self {
                state: StdMutex::new(TransportState::Idle),
                responses: StdMutex::new(responses),
                sent: StdMutex::new(Vec::new()),
                calls: AtomicU32::new(0),
            }
        }
    }

    impl Transport for StubTransport {
        fn start(&self) -> BoxFuture<'_, TransportResult<()>> {
            Box::pin(async move {
                *self.state.lock().unwrap() = TransportState::Running;
                Ok(())
            })
        }
        fn close(&self) -> BoxFuture<'_, TransportResult<()>> {
            Box::pin(async move {
                *self.state.lock().unwrap() = TransportState::Closed;
                Ok(())
            })
        }
        fn request(&self, body: Value, wait_for_response: bool) -> BoxFuture<'_, TransportResult<Option<Message>>> {
            Box::pin(async move {
                self.sent.lock().unwrap().push(body.clone());
                if !wait_for_response {
                    return Ok(None);
                }
                self.calls.fetch_add(1, Ordering::Relaxed);
                let mut responses = self.responses.lock().unwrap();
                if responses.is_empty() {
                    return Err(TransportError::Io("no stubbed response".into()));
                }
                let response = responses.remove(0);
                let envelope = mcp_protocol::envelope::validate(&response).unwrap();
                Ok(Some(Message::new(envelope, None)))
            })
        }
        fn state(&self) -> TransportState {
            self.state.lock().unwrap().clone()
        }
        fn set_protocol_version(&self, _version: &str) {}
    }

    fn init_response(id: i64) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "protocolVersion": mcp_protocol::PROTOCOL_VERSION,
                "capabilities": {},
                "serverInfo": {"name": "stub-server", "version": "0.1.0"},
            }
        })
    }

    #[tokio::test]
    async fn start_negotiates_protocol_version() {
        let transport = Box::new(StubTransport::new(vec![init_response(1)]));
        let (_tx, rx) = inbound_channel();
        let coordinator = CoordinatorBuilder::new(transport, rx, Implementation::new("test-client", "0.1.0")).build();

        let result = coordinator.start().await.unwrap();
        assert_eq!(result.protocol_version, mcp_protocol::PROTOCOL_VERSION);
        assert_eq!(coordinator.protocol_version().as_deref(), Some(mcp_protocol::PROTOCOL_VERSION));
    }

    #[tokio::test]
    async fn start_rejects_unsupported_protocol_version() {
        let bad_response = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "protocolVersion": "1999-01-01",
                "capabilities": {},
                "serverInfo": {"name": "stub-server", "version": "0.1.0"},
            }
        });
        let transport = Box::new(StubTransport::new(vec![bad_response]));
        let (_tx, rx) = inbound_channel();
        let coordinator = CoordinatorBuilder::new(transport, rx, Implementation::new("test-client", "0.1.0")).build();

        let err = coordinator.start().await.unwrap_err();
        assert!(matches!(err, McpError::UnsupportedProtocolVersion { .. }));
    }

    #[tokio::test]
    async fn request_before_start_is_rejected() {
        let transport = Box::new(StubTransport::new(vec![]));
        let (_tx, rx) = inbound_channel();
        let coordinator = CoordinatorBuilder::new(transport, rx, Implementation::new("test-client", "0.1.0")).build();

        let err = coordinator.tool_list().await.unwrap_err();
        assert!(matches!(err, McpError::Transport(_)));
    }

    #[tokio::test]
    async fn tool_list_paginates_until_cursor_exhausted() {
        let page1 = json!({
            "jsonrpc": "2.0", "id": 2,
            "result": {"tools": [{"name": "a", "inputSchema": {"type": "object"}}], "nextCursor": "page2"}
        });
        let page2 = json!({
            "jsonrpc": "2.0", "id": 3,
            "result": {"tools": [{"name": "b", "inputSchema": {"type": "object"}}]}
        });
        let transport = Box::new(StubTransport::new(vec![init_response(1), page1, page2]));
        let (_tx, rx) = inbound_channel();
        let coordinator = CoordinatorBuilder::new(transport, rx, Implementation::new("test-client", "0.1.0")).build();
        coordinator.start().await.unwrap();

        let tools = coordinator.tool_list().await.unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "a");
        assert_eq!(tools[1].name, "b");
    }

    #[tokio::test]
    async fn hitl_denial_short_circuits_tool_call() {
        struct AlwaysDeny;
        #[async_trait::async_trait]
        impl crate::dispatch::Handler<ToolCallContext, ()> for AlwaysDeny {
            async fn execute(&self, _ctx: ToolCallContext) -> Decision<()> {
                Decision::Denied("not allowed".into())
            }
        }

        let transport = Box::new(StubTransport::new(vec![init_response(1)]));
        let (_tx, rx) = inbound_channel();
        let coordinator = CoordinatorBuilder::new(transport, rx, Implementation::new("test-client", "0.1.0"))
            .with_hitl_handler(Arc::new(AlwaysDeny))
            .build();
        coordinator.start().await.unwrap();

        let result = coordinator.execute_tool("dangerous_tool", None).await.unwrap();
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn stop_closes_transport_and_blocks_further_requests() {
        let transport = Box::new(StubTransport::new(vec![init_response(1)]));
        let (_tx, rx) = inbound_channel();
        let coordinator = CoordinatorBuilder::new(transport, rx, Implementation::new("test-client", "0.1.0")).build();
        coordinator.start().await.unwrap();
        coordinator.stop().await.unwrap();

        let err = coordinator.tool_list().await.unwrap_err();
        assert!(matches!(err, McpError::Transport(_)));
    }
}
