//! Streamable HTTP transport (§4.3.3): a single endpoint handling both
//! directions, with optional SSE upgrade on POST responses, a long-lived GET
//! stream for server-initiated pushes, session-id stickiness, and OAuth
//! integration on `401`.

use crate::rate_limit::TokenBucket;
use crate::sse_codec::SseDecoder;
use futures::StreamExt;
use mcp_auth::OAuthProvider;
use mcp_protocol::envelope::RequestId;
use mcp_protocol::{DEFAULT_REQUEST_TIMEOUT_MS, Message};
use mcp_transport_traits::{
    BoxFuture, InboundSender, ReconnectionConfig, StreamableHttpConfig, Transport, TransportError,
    TransportResult, TransportState,
};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex as TokioMutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

type PendingMap = Arc<StdMutex<HashMap<RequestId, oneshot::Sender<Message>>>>;
type SharedState = Arc<StdMutex<TransportState>>;

/// Stable per-instance identifier sent as `X-CLIENT-ID` on every request
/// (§6), so server-side rate limiting/telemetry can distinguish one client
/// process from another across reconnects.
fn generate_client_id() -> String {
    Uuid::new_v4().to_string()
}

pub struct StreamableHttpTransport {
    config: StreamableHttpConfig,
    state: SharedState,
    http: reqwest::Client,
    session_id: Arc<StdMutex<Option<String>>>,
    protocol_version: StdMutex<Option<String>>,
    client_id: String,
    pending: PendingMap,
    inbound_tx: InboundSender,
    last_event_id: Arc<StdMutex<Option<String>>>,
    get_stream_task: TokioMutex<Option<JoinHandle<()>>>,
    shutting_down: Arc<AtomicBool>,
    rate_limiter: Option<TokenBucket>,
    oauth: Option<Arc<OAuthProvider>>,
    owning_pid: u32,
}

impl std::fmt::Debug for StreamableHttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamableHttpTransport")
            .field("url", &self.config.url)
            .field("state", &self.state.lock().unwrap())
            .field("session_id", &self.session_id.lock().unwrap())
            .finish()
    }
}

impl StreamableHttpTransport {
    #[must_use]
    pub fn new(config: StreamableHttpConfig, inbound_tx: InboundSender) -> Self {
        Self::with_oauth(config, inbound_tx, None)
    }

    #[must_use]
    pub fn with_oauth(
        config: StreamableHttpConfig,
        inbound_tx: InboundSender,
        oauth: Option<Arc<OAuthProvider>>,
    ) -> Self {
        let rate_limiter = config.rate_limit.map(TokenBucket::new);
        let session_id = config.session_id.clone();
        Self {
            config,
            state: Arc::new(StdMutex::new(TransportState::Idle)),
            http: reqwest::Client::new(),
            session_id: Arc::new(StdMutex::new(session_id)),
            protocol_version: StdMutex::new(None),
            client_id: generate_client_id(),
            pending: Arc::new(StdMutex::new(HashMap::new())),
            inbound_tx,
            last_event_id: Arc::new(StdMutex::new(None)),
            get_stream_task: TokioMutex::new(None),
            shutting_down: Arc::new(AtomicBool::new(false)),
            rate_limiter,
            oauth,
            owning_pid: std::process::id(),
        }
    }

    fn set_state(&self, state: TransportState) {
        *self.state.lock().unwrap() = state;
    }

    fn forked_since_construction(&self) -> bool {
        self.owning_pid != std::process::id()
    }

    fn request_timeout(&self) -> Duration {
        self.config
            .request_timeout
            .unwrap_or_else(|| Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS))
    }

    fn common_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut builder = builder.header("X-CLIENT-ID", &self.client_id);
        if let Some(session_id) = self.session_id.lock().unwrap().clone() {
            builder = builder.header("mcp-session-id", session_id);
        }
        if let Some(version) = self.protocol_version.lock().unwrap().clone() {
            builder = builder.header("mcp-protocol-version", version);
        }
        for (key, value) in &self.config.headers {
            builder = builder.header(key, value);
        }
        builder
    }

    async fn with_auth_header(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let Some(oauth) = &self.oauth else { return builder };
        match oauth.access_token(&self.config.url).await {
            Some(token) => builder.header("Authorization", token.authorization_header()),
            None => builder,
        }
    }

    async fn post_once(
        &self,
        body: &serde_json::Value,
    ) -> TransportResult<reqwest::Response> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire().await;
        }
        let builder = self
            .http
            .post(&self.config.url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .json(body);
        let builder = self.common_headers(builder);
        let builder = self.with_auth_header(builder).await;
        builder.send().await.map_err(|e| TransportError::Io(e.to_string()))
    }

    /// POSTs `body`, following §4.3.3's status-code handling including the
    /// single-retry 401 dance.
    async fn post_with_retry(&self, body: &serde_json::Value) -> TransportResult<reqwest::Response> {
        let response = self.post_once(body).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(oauth) = &self.oauth else {
            return Err(TransportError::AuthenticationChallenge {
                www_authenticate: header_value(&response, "www-authenticate"),
                resource_metadata_url: None,
            });
        };
        if !oauth.retry_allowed(&self.config.url) {
            return Err(TransportError::AuthenticationChallenge {
                www_authenticate: header_value(&response, "www-authenticate"),
                resource_metadata_url: None,
            });
        }

        let www_authenticate = header_value(&response, "www-authenticate");
        let resource_metadata_url = header_value(&response, "mcp-resource-metadata-url");
        let resource_metadata_url =
            if resource_metadata_url.is_empty() { None } else { Some(resource_metadata_url.as_str()) };

        oauth.mark_retry_attempted(&self.config.url);
        let recovered = oauth
            .handle_authentication_challenge(&self.config.url, &www_authenticate, resource_metadata_url)
            .await
            .unwrap_or(false);

        if !recovered {
            return Err(TransportError::AuthenticationChallenge {
                www_authenticate,
                resource_metadata_url: resource_metadata_url.map(str::to_string),
            });
        }

        let retried = self.post_once(body).await?;
        oauth.clear_retry_guard(&self.config.url);

        if retried.status() == StatusCode::UNAUTHORIZED {
            return Err(TransportError::AuthenticationChallenge {
                www_authenticate: header_value(&retried, "www-authenticate"),
                resource_metadata_url: {
                    let url = header_value(&retried, "mcp-resource-metadata-url");
                    if url.is_empty() { None } else { Some(url) }
                },
            });
        }

        Ok(retried)
    }
}

fn header_value(response: &reqwest::Response, name: &str) -> String {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn run_get_stream(
    url: String,
    headers: HashMap<String, String>,
    http: reqwest::Client,
    last_event_id: Arc<StdMutex<Option<String>>>,
    pending: PendingMap,
    inbound_tx: InboundSender,
    shutting_down: Arc<AtomicBool>,
    reconnection: ReconnectionConfig,
) {
    let mut attempt: u32 = 0;

    while !shutting_down.load(Ordering::Relaxed) {
        let mut request = http.get(&url).header("Accept", "text/event-stream");
        if let Some(id) = last_event_id.lock().unwrap().clone() {
            request = request.header("Last-Event-ID", id);
        }
        for (key, value) in &headers {
            request = request.header(key, value);
        }

        let response = match request.send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) if resp.status() == StatusCode::METHOD_NOT_ALLOWED => {
                debug!(target: "mcp_transport", "server does not support the GET SSE upgrade");
                return;
            }
            Ok(resp) => {
                warn!(target: "mcp_transport", status = %resp.status(), "get stream connect failed");
                if attempt >= reconnection.max_retries {
                    warn!(target: "mcp_transport", "exhausted reconnection attempts, giving up");
                    return;
                }
                tokio::time::sleep(reconnection.delay_for_attempt(attempt)).await;
                attempt += 1;
                continue;
            }
            Err(err) => {
                warn!(target: "mcp_transport", %err, "get stream connect error");
                if attempt >= reconnection.max_retries {
                    warn!(target: "mcp_transport", "exhausted reconnection attempts, giving up");
                    return;
                }
                tokio::time::sleep(reconnection.delay_for_attempt(attempt)).await;
                attempt += 1;
                continue;
            }
        };

        // A connection that lives long enough to carry events resets the
        // backoff counter; only a tight fail-reconnect-fail loop climbs it.
        attempt = 0;

        let mut decoder = SseDecoder::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let Ok(chunk) = chunk else { break };
            for event in decoder.push(&chunk) {
                if event.event.as_deref() == Some("stop") {
                    return;
                }
                if let Some(id) = &event.id {
                    *last_event_id.lock().unwrap() = Some(id.clone());
                }
                crate::dispatch_sse_payload(&event.data, &pending, &inbound_tx).await;
            }
        }

        if shutting_down.load(Ordering::Relaxed) {
            return;
        }
        if attempt >= reconnection.max_retries {
            warn!(target: "mcp_transport", "exhausted reconnection attempts, giving up");
            return;
        }
        tokio::time::sleep(reconnection.delay_for_attempt(attempt)).await;
        attempt += 1;
    }
}

impl Transport for StreamableHttpTransport {
    fn start(&self) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            if self.state().alive() {
                return Ok(());
            }
            if self.forked_since_construction() {
                return Err(TransportError::Closed(
                    "transport constructed in a different process; reconstruct after fork".into(),
                ));
            }

            self.shutting_down.store(false, Ordering::Relaxed);
            self.set_state(TransportState::Starting);

            let get_future = run_get_stream(
                self.config.url.clone(),
                self.config.headers.clone(),
                self.http.clone(),
                self.last_event_id.clone(),
                self.pending.clone(),
                self.inbound_tx.clone(),
                self.shutting_down.clone(),
                self.config.reconnection,
            );
            *self.get_stream_task.lock().await = Some(tokio::spawn(get_future));

            self.set_state(TransportState::Running);
            Ok(())
        })
    }

    fn close(&self) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            self.shutting_down.store(true, Ordering::Relaxed);
            self.set_state(TransportState::Closing);

            // §4.3.3 "Client-pool hygiene": give the SSE worker 5 s to join
            // before forcing termination.
            if let Some(handle) = self.get_stream_task.lock().await.take() {
                if tokio::time::timeout(Duration::from_secs(5), &mut (&handle))
                    .await
                    .is_err()
                {
                    handle.abort();
                }
            }

            let session_id = self.session_id.lock().unwrap().clone();
            if let Some(session_id) = session_id {
                let mut builder = self.http.delete(&self.config.url).header("mcp-session-id", session_id);
                builder = self.common_headers(builder);
                // 200/204/404/405 are all acceptable outcomes of explicit
                // session termination; failures here don't block shutdown.
                let _ = builder.send().await;
            }

            for (_, tx) in self.pending.lock().unwrap().drain() {
                drop(tx);
            }

            self.set_state(TransportState::Closed);
            Ok(())
        })
    }

    fn request(
        &self,
        body: serde_json::Value,
        wait_for_response: bool,
    ) -> BoxFuture<'_, TransportResult<Option<Message>>> {
        Box::pin(async move {
            if !self.state().alive() {
                return Err(TransportError::NotRunning);
            }

            let mut receiver = None;
            let id = crate::request_id_from_value(&body);
            if wait_for_response {
                let id = id
                    .clone()
                    .ok_or_else(|| TransportError::Io("request body has no id".to_string()))?;
                let (tx, rx) = oneshot::channel();
                self.pending.lock().unwrap().insert(id, tx);
                receiver = Some(rx);
            }

            let response = self.post_with_retry(&body).await?;
            let status = response.status();

            match status {
                StatusCode::NOT_FOUND => {
                    *self.session_id.lock().unwrap() = None;
                    return Err(TransportError::SessionExpired);
                }
                StatusCode::METHOD_NOT_ALLOWED | StatusCode::CONFLICT => {
                    // Acceptable where the endpoint is optional, or a stream
                    // already exists for this session (benign).
                }
                status if status.is_client_error() || status.is_server_error() => {
                    let message = response.text().await.unwrap_or_default();
                    return Err(TransportError::Http { status: status.as_u16(), message });
                }
                _ => {}
            }

            if let Some(session_header) = response.headers().get("mcp-session-id") {
                if let Ok(value) = session_header.to_str() {
                    *self.session_id.lock().unwrap() = Some(value.to_string());
                }
            }

            if status == StatusCode::ACCEPTED {
                return Ok(None);
            }

            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();

            if content_type.starts_with("text/event-stream") {
                let mut decoder = SseDecoder::new();
                let mut stream = response.bytes_stream();
                while let Some(chunk) = stream.next().await {
                    let Ok(chunk) = chunk else { break };
                    for event in decoder.push(&chunk) {
                        if event.event.as_deref() == Some("stop") {
                            break;
                        }
                        if let Some(event_id) = &event.id {
                            *self.last_event_id.lock().unwrap() = Some(event_id.clone());
                        }
                        crate::dispatch_sse_payload(&event.data, &self.pending, &self.inbound_tx).await;
                    }
                }
            } else if content_type.starts_with("application/json") {
                let value: serde_json::Value =
                    response.json().await.map_err(|e| TransportError::Io(e.to_string()))?;
                if let Ok(envelope) = mcp_protocol::envelope::validate(&value) {
                    let message = Message::new(envelope, self.session_id.lock().unwrap().clone());
                    if message.response() {
                        if let Some(msg_id) = message.id().cloned() {
                            if let Some(tx) = self.pending.lock().unwrap().remove(&msg_id) {
                                let _ = tx.send(message);
                            }
                        }
                    } else {
                        let _ = self.inbound_tx.send(message).await;
                    }
                }
            }

            let Some(rx) = receiver else { return Ok(None) };
            match tokio::time::timeout(self.request_timeout(), rx).await {
                Ok(Ok(message)) => Ok(Some(message)),
                Ok(Err(_)) => {
                    Err(TransportError::Closed("transport shut down while waiting".into()))
                }
                Err(_) => Err(TransportError::Timeout),
            }
        })
    }

    fn state(&self) -> TransportState {
        self.state.lock().unwrap().clone()
    }

    fn set_protocol_version(&self, version: &str) {
        *self.protocol_version.lock().unwrap() = Some(version.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn inline_json_response_resolves_waiter() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(405)).mount(&server).await;
        Mock::given(method("POST")).respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .insert_header("mcp-session-id", "sess-1")
                .set_body_json(serde_json::json!({
                    "jsonrpc": "2.0", "id": 1, "result": {"tools": []}
                })),
        ).mount(&server).await;

        let (tx, _rx) = mcp_transport_traits::inbound_channel();
        let transport = StreamableHttpTransport::new(StreamableHttpConfig::new(server.uri()), tx);
        transport.start().await.unwrap();

        let body = serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});
        let result = transport.request(body, true).await.unwrap();
        assert!(result.is_some());
        assert_eq!(transport.session_id.lock().unwrap().as_deref(), Some("sess-1"));
    }

    #[tokio::test]
    async fn not_found_clears_session_and_raises_session_expired() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(405)).mount(&server).await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

        let (tx, _rx) = mcp_transport_traits::inbound_channel();
        let mut config = StreamableHttpConfig::new(server.uri());
        config.session_id = Some("stale".to_string());
        let transport = StreamableHttpTransport::new(config, tx);
        transport.start().await.unwrap();

        let body = serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});
        let result = transport.request(body, true).await;
        assert!(matches!(result, Err(TransportError::SessionExpired)));
        assert!(transport.session_id.lock().unwrap().is_none());
    }
}
