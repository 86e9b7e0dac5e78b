//! Legacy two-endpoint SSE transport (§4.3.2): a long-lived `GET /sse`
//! delivers an `endpoint` event naming the URL POSTs go to, and all
//! responses — including replies to those POSTs — arrive on the SSE stream,
//! correlated by id exactly like [`mcp_stdio::StdioTransport`] correlates
//! stdout lines.

use crate::sse_codec::SseDecoder;
use futures::StreamExt;
use mcp_protocol::envelope::RequestId;
use mcp_protocol::{DEFAULT_REQUEST_TIMEOUT_MS, Message};
use mcp_transport_traits::{
    BoxFuture, InboundSender, SseConfig, Transport, TransportError, TransportResult,
    TransportState,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex as TokioMutex, Notify, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type PendingMap = Arc<StdMutex<HashMap<RequestId, oneshot::Sender<Message>>>>;
type SharedState = Arc<StdMutex<TransportState>>;

/// Delay between reconnection attempts on stream disconnect (§4.3.2).
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// How long `start` waits for the `endpoint` event before giving up.
const ENDPOINT_WAIT: Duration = Duration::from_secs(10);

pub struct LegacySseTransport {
    config: SseConfig,
    state: SharedState,
    http: reqwest::Client,
    endpoint: Arc<StdMutex<Option<String>>>,
    endpoint_ready: Arc<Notify>,
    pending: PendingMap,
    inbound_tx: InboundSender,
    sse_task: TokioMutex<Option<JoinHandle<()>>>,
    shutting_down: Arc<AtomicBool>,
    protocol_version: StdMutex<Option<String>>,
    owning_pid: u32,
}

impl std::fmt::Debug for LegacySseTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacySseTransport")
            .field("url", &self.config.url)
            .field("state", &self.state.lock().unwrap())
            .finish()
    }
}

impl LegacySseTransport {
    #[must_use]
    pub fn new(config: SseConfig, inbound_tx: InboundSender) -> Self {
        Self {
            config,
            state: Arc::new(StdMutex::new(TransportState::Idle)),
            http: reqwest::Client::new(),
            endpoint: Arc::new(StdMutex::new(None)),
            endpoint_ready: Arc::new(Notify::new()),
            pending: Arc::new(StdMutex::new(HashMap::new())),
            inbound_tx,
            sse_task: TokioMutex::new(None),
            shutting_down: Arc::new(AtomicBool::new(false)),
            protocol_version: StdMutex::new(None),
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

    fn resolve_endpoint(&self, raw: &str) -> String {
        match url::Url::parse(raw) {
            Ok(url) => url.into(),
            Err(_) => match url::Url::parse(&self.config.url).and_then(|base| base.join(raw)) {
                Ok(joined) => joined.into(),
                Err(_) => raw.to_string(),
            },
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_sse_loop(
    sse_url: String,
    headers: HashMap<String, String>,
    http: reqwest::Client,
    state: SharedState,
    endpoint: Arc<StdMutex<Option<String>>>,
    endpoint_ready: Arc<Notify>,
    pending: PendingMap,
    inbound_tx: InboundSender,
    shutting_down: Arc<AtomicBool>,
) {
    while !shutting_down.load(Ordering::Relaxed) {
        let mut request = http.get(&sse_url).header("Accept", "text/event-stream");
        for (key, value) in &headers {
            request = request.header(key, value);
        }

        let response = match request.send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                warn!(target: "mcp_transport", status = %resp.status(), "sse connect failed");
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
            Err(err) => {
                warn!(target: "mcp_transport", %err, "sse connect error");
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        };

        *state.lock().unwrap() = TransportState::Running;
        let mut decoder = SseDecoder::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(target: "mcp_transport", %err, "sse stream read error");
                    break;
                }
            };

            for event in decoder.push(&chunk) {
                match event.event.as_deref() {
                    Some("endpoint") => {
                        *endpoint.lock().unwrap() = Some(event.data.clone());
                        endpoint_ready.notify_waiters();
                        debug!(target: "mcp_transport", endpoint = %event.data, "received endpoint event");
                    }
                    _ => crate::dispatch_sse_payload(&event.data, &pending, &inbound_tx).await,
                }
            }
        }

        if shutting_down.load(Ordering::Relaxed) {
            break;
        }
        warn!(target: "mcp_transport", "sse stream disconnected, reconnecting");
        tokio::time::sleep(RECONNECT_DELAY).await;
    }

    *state.lock().unwrap() = TransportState::Closed;
}

impl Transport for LegacySseTransport {
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

            let sse_url = format!("{}/sse", self.config.url.trim_end_matches('/'));
            let loop_future = run_sse_loop(
                sse_url,
                self.config.headers.clone(),
                self.http.clone(),
                self.state.clone(),
                self.endpoint.clone(),
                self.endpoint_ready.clone(),
                self.pending.clone(),
                self.inbound_tx.clone(),
                self.shutting_down.clone(),
            );
            *self.sse_task.lock().await = Some(tokio::spawn(loop_future));

            match tokio::time::timeout(ENDPOINT_WAIT, self.endpoint_ready.notified()).await {
                Ok(()) => Ok(()),
                Err(_) => Err(TransportError::Timeout),
            }
        })
    }

    fn close(&self) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            self.shutting_down.store(true, Ordering::Relaxed);
            self.set_state(TransportState::Closing);
            if let Some(handle) = self.sse_task.lock().await.take() {
                handle.abort();
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
            let endpoint = self
                .endpoint
                .lock()
                .unwrap()
                .clone()
                .ok_or(TransportError::NotRunning)?;
            let endpoint = self.resolve_endpoint(&endpoint);

            let mut receiver = None;
            if wait_for_response {
                let id = crate::request_id_from_value(&body)
                    .ok_or_else(|| TransportError::Io("request body has no id".to_string()))?;
                let (tx, rx) = oneshot::channel();
                self.pending.lock().unwrap().insert(id, tx);
                receiver = Some(rx);
            }

            let mut req = self.http.post(&endpoint).json(&body);
            for (key, value) in &self.config.headers {
                req = req.header(key, value);
            }
            let response = req
                .send()
                .await
                .map_err(|e| TransportError::Http { status: 0, message: e.to_string() })?;
            if !response.status().is_success() {
                return Err(TransportError::Http {
                    status: response.status().as_u16(),
                    message: response.text().await.unwrap_or_default(),
                });
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
    async fn start_waits_for_endpoint_event_then_posts_there() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_raw("event: endpoint\ndata: /rpc\n\n", "text/event-stream"),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rpc"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let (tx, _rx) = mcp_transport_traits::inbound_channel();
        let transport = LegacySseTransport::new(SseConfig::new(server.uri()), tx);
        transport.start().await.unwrap();
        assert!(transport.alive());

        let body = serde_json::json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        let result = transport.request(body, false).await.unwrap();
        assert!(result.is_none());

        transport.close().await.unwrap();
    }
}
