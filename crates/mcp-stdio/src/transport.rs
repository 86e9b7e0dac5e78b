//! [`StdioTransport`]: newline-delimited JSON over a child process's
//! stdin/stdout (§4.3.1).
//!
//! Grounded on `turbomcp-stdio::transport`'s interior-mutability split:
//! `std::sync::Mutex` guards state that's read/written without crossing an
//! `.await` point; `tokio::sync::Mutex` guards the I/O halves and the
//! background task handles, which do. Process death surfaces as a
//! `Failed` state transition the reader task writes directly (it holds the
//! same `Arc<Mutex<TransportState>>` as `self`), observed by `alive()`
//! immediately and by `request()`'s next I/O attempt as a closed pipe.

use mcp_protocol::envelope::RequestId;
use mcp_protocol::{DEFAULT_REQUEST_TIMEOUT_MS, Message};
use mcp_transport_traits::{
    BoxFuture, InboundSender, StdioConfig, Transport, TransportError, TransportResult,
    TransportState,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{Mutex as TokioMutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

type PendingMap = Arc<StdMutex<HashMap<RequestId, oneshot::Sender<Message>>>>;
type SharedState = Arc<StdMutex<TransportState>>;

/// Spawns and frames a stdio MCP server child process.
pub struct StdioTransport {
    config: StdioConfig,
    state: SharedState,
    protocol_version: StdMutex<Option<String>>,
    child: TokioMutex<Option<Child>>,
    stdin: TokioMutex<Option<ChildStdin>>,
    pending: PendingMap,
    inbound_tx: InboundSender,
    reader_task: TokioMutex<Option<JoinHandle<()>>>,
    stderr_task: TokioMutex<Option<JoinHandle<()>>>,
    owning_pid: u32,
    shutting_down: AtomicBool,
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("command", &self.config.command)
            .field("state", &self.state.lock().unwrap())
            .finish()
    }
}

impl StdioTransport {
    /// Builds a transport for `config`, not yet started. `inbound_tx` is
    /// the channel every inbound envelope (responses this transport isn't
    /// itself waiting on, plus all server-initiated requests and
    /// notifications) is forwarded to.
    #[must_use]
    pub fn new(config: StdioConfig, inbound_tx: InboundSender) -> Self {
        Self {
            config,
            state: Arc::new(StdMutex::new(TransportState::Idle)),
            protocol_version: StdMutex::new(None),
            child: TokioMutex::new(None),
            stdin: TokioMutex::new(None),
            pending: Arc::new(StdMutex::new(HashMap::new())),
            inbound_tx,
            reader_task: TokioMutex::new(None),
            stderr_task: TokioMutex::new(None),
            owning_pid: std::process::id(),
            shutting_down: AtomicBool::new(false),
        }
    }

    fn set_state(&self, state: TransportState) {
        *self.state.lock().unwrap() = state;
    }

    /// Process-fork safety (§5): a transport constructed in a parent whose
    /// pid no longer matches the current process must not be reused.
    fn forked_since_construction(&self) -> bool {
        self.owning_pid != std::process::id()
    }

    fn request_timeout(&self) -> Duration {
        self.config
            .request_timeout
            .unwrap_or_else(|| Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS))
    }
}

fn request_id_from_value(body: &Value) -> Option<RequestId> {
    match body.get("id")? {
        Value::Number(n) => n.as_i64().map(RequestId::Number),
        Value::String(s) => Some(RequestId::String(s.clone())),
        _ => None,
    }
}

async fn run_reader(
    mut lines: tokio::io::Lines<BufReader<tokio::process::ChildStdout>>,
    pending: PendingMap,
    inbound_tx: InboundSender,
    state: SharedState,
) {
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                trace!(target: "mcp_stdio", %line, "received line");
                let value: Value = match serde_json::from_str(&line) {
                    Ok(v) => v,
                    Err(err) => {
                        warn!(target: "mcp_stdio", %err, "dropped unparseable stdout line");
                        continue;
                    }
                };
                let envelope = match mcp_protocol::envelope::validate(&value) {
                    Ok(e) => e,
                    Err(err) => {
                        warn!(target: "mcp_stdio", %err, "dropped invalid envelope");
                        continue;
                    }
                };
                let message = Message::new(envelope, None);

                if message.response() {
                    if let Some(id) = message.id().cloned() {
                        let waiter = pending.lock().unwrap().remove(&id);
                        if let Some(tx) = waiter {
                            let _ = tx.send(message.clone());
                            continue;
                        }
                    }
                }

                if inbound_tx.send(message).await.is_err() {
                    debug!(target: "mcp_stdio", "inbound receiver dropped, stopping reader");
                    break;
                }
            }
            Ok(None) => {
                debug!(target: "mcp_stdio", "child stdout closed");
                break;
            }
            Err(err) => {
                warn!(target: "mcp_stdio", %err, "error reading child stdout");
                break;
            }
        }
    }
    *state.lock().unwrap() = TransportState::Failed { reason: "child process stdout closed".into() };
}

async fn run_stderr(mut lines: tokio::io::Lines<BufReader<tokio::process::ChildStderr>>) {
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "mcp_stdio::stderr", "{line}");
    }
}

impl Transport for StdioTransport {
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

            self.set_state(TransportState::Starting);

            let mut command = Command::new(&self.config.command);
            command
                .args(&self.config.args)
                .envs(&self.config.env)
                .stdin(std::process::Stdio::piped())
                .stdout(std::process::Stdio::piped())
                .stderr(std::process::Stdio::piped())
                .kill_on_drop(true);

            let mut child = command.spawn().map_err(|e| {
                self.set_state(TransportState::Failed { reason: e.to_string() });
                TransportError::Io(format!("failed to spawn {}: {e}", self.config.command))
            })?;

            let stdin = child
                .stdin
                .take()
                .ok_or_else(|| TransportError::Io("child stdin was not piped".to_string()))?;
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| TransportError::Io("child stdout was not piped".to_string()))?;
            let stderr = child
                .stderr
                .take()
                .ok_or_else(|| TransportError::Io("child stderr was not piped".to_string()))?;

            let reader = run_reader(
                BufReader::new(stdout).lines(),
                self.pending.clone(),
                self.inbound_tx.clone(),
                self.state.clone(),
            );
            let reader_handle = tokio::spawn(reader);
            let stderr_handle = tokio::spawn(run_stderr(BufReader::new(stderr).lines()));

            *self.child.lock().await = Some(child);
            *self.stdin.lock().await = Some(stdin);
            *self.reader_task.lock().await = Some(reader_handle);
            *self.stderr_task.lock().await = Some(stderr_handle);
            self.shutting_down.store(false, Ordering::Relaxed);
            self.set_state(TransportState::Running);

            Ok(())
        })
    }

    fn close(&self) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            self.shutting_down.store(true, Ordering::Relaxed);
            self.set_state(TransportState::Closing);

            if let Some(handle) = self.reader_task.lock().await.take() {
                handle.abort();
            }
            if let Some(handle) = self.stderr_task.lock().await.take() {
                handle.abort();
            }
            *self.stdin.lock().await = None;
            if let Some(mut child) = self.child.lock().await.take() {
                let _ = child.start_kill();
                let _ = child.wait().await;
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
        body: Value,
        wait_for_response: bool,
    ) -> BoxFuture<'_, TransportResult<Option<Message>>> {
        Box::pin(async move {
            if !self.state().alive() || self.shutting_down.load(Ordering::Relaxed) {
                return Err(TransportError::NotRunning);
            }

            let mut receiver = None;
            if wait_for_response {
                let id = request_id_from_value(&body)
                    .ok_or_else(|| TransportError::Io("request body has no id".to_string()))?;
                let (tx, rx) = oneshot::channel();
                self.pending.lock().unwrap().insert(id, tx);
                receiver = Some(rx);
            }

            let mut line = serde_json::to_string(&body)?;
            line.push('\n');

            {
                let mut guard = self.stdin.lock().await;
                let stdin = guard.as_mut().ok_or(TransportError::NotRunning)?;
                stdin
                    .write_all(line.as_bytes())
                    .await
                    .map_err(|e| TransportError::Closed(e.to_string()))?;
                stdin.flush().await.map_err(|e| TransportError::Closed(e.to_string()))?;
            }

            let Some(rx) = receiver else {
                return Ok(None);
            };

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

    #[test]
    fn extracts_numeric_and_string_ids() {
        assert_eq!(
            request_id_from_value(&serde_json::json!({"id": 7})),
            Some(RequestId::Number(7))
        );
        assert_eq!(
            request_id_from_value(&serde_json::json!({"id": "s1"})),
            Some(RequestId::String("s1".to_string()))
        );
        assert_eq!(request_id_from_value(&serde_json::json!({})), None);
    }

    #[tokio::test]
    async fn echo_child_round_trips_initialize() {
        let (tx, mut rx) = mcp_transport_traits::inbound_channel();
        let config = StdioConfig::new("cat");
        let transport = StdioTransport::new(config, tx);
        transport.start().await.expect("cat should spawn");
        assert!(transport.alive());

        let body = serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"});
        // `cat` echoes the line back verbatim, which happens to be a
        // well-formed request (not a response), so it is delivered on the
        // inbound channel rather than resolving `request`'s waiter.
        let result = transport.request(body.clone(), false).await.unwrap();
        assert!(result.is_none());
        let echoed = rx.recv().await.expect("cat should echo the line back");
        assert_eq!(echoed.method(), Some("initialize"));

        transport.close().await.unwrap();
        assert!(!transport.alive());
    }
}
