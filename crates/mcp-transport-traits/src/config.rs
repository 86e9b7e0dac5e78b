//! Transport configuration types, one struct per §6's recognized config key
//! set.

use std::collections::HashMap;
use std::time::Duration;

/// `{command, args?, env?, request_timeout?}` — stdio transport config.
#[derive(Debug, Clone)]
pub struct StdioConfig {
    /// Executable to spawn.
    pub command: String,
    /// Command-line arguments.
    pub args: Vec<String>,
    /// Environment variable overrides, merged onto the inherited environment.
    pub env: HashMap<String, String>,
    /// Per-request timeout; falls back to
    /// [`mcp_protocol::DEFAULT_REQUEST_TIMEOUT_MS`] when unset.
    pub request_timeout: Option<Duration>,
}

impl StdioConfig {
    /// Builds a config spawning `command` with no arguments or env overrides.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            request_timeout: None,
        }
    }

    /// Sets the child process's arguments.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an environment variable override.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// `{url, headers?, request_timeout?}` — legacy SSE transport config.
#[derive(Debug, Clone)]
pub struct SseConfig {
    /// Base URL exposing `GET /sse`.
    pub url: String,
    /// Extra headers attached to every request.
    pub headers: HashMap<String, String>,
    /// Per-request timeout.
    pub request_timeout: Option<Duration>,
}

impl SseConfig {
    /// Builds a config pointed at `url` with no extra headers.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), headers: HashMap::new(), request_timeout: None }
    }
}

/// `reconnection = {max_reconnection_delay?, initial_reconnection_delay?,
/// reconnection_delay_grow_factor?, max_retries?}` (§6).
#[derive(Debug, Clone, Copy)]
pub struct ReconnectionConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Multiplicative backoff factor applied per attempt.
    pub growth_factor: f64,
    /// Ceiling the backoff delay never exceeds.
    pub max_delay: Duration,
    /// Number of reconnection attempts before giving up.
    pub max_retries: u32,
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            growth_factor: 1.5,
            max_delay: Duration::from_millis(30_000),
            max_retries: 2,
        }
    }
}

impl ReconnectionConfig {
    /// Computes the backoff delay for the given zero-based attempt number,
    /// per spec.md §4.3.3: `min(initial * growth^attempt, max)`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.initial_delay.as_secs_f64() * self.growth_factor.powi(attempt as i32);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }
}

/// Token-bucket rate limiting, optional per §4.3.3 (default: disabled).
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Requests allowed per `interval`.
    pub capacity: u32,
    /// Window over which `capacity` replenishes.
    pub interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { capacity: 10, interval: Duration::from_secs(1) }
    }
}

/// Subset of the streamable transport's `oauth` sub-map (§6) that the
/// transport itself needs; the full provider configuration lives in
/// `mcp-auth`.
#[derive(Debug, Clone, Default)]
pub struct OAuthTransportConfig {
    /// Redirect URI the authorization code flow should request.
    pub redirect_uri: Option<String>,
    /// Space-delimited scope string requested during authorization.
    pub scope: Option<String>,
}

/// `{url, headers?, request_timeout?, sse_timeout?, version?, oauth?,
/// rate_limit?, reconnection?, session_id?}` — streamable HTTP transport
/// config (§6).
#[derive(Debug, Clone)]
pub struct StreamableHttpConfig {
    /// The single MCP endpoint URL.
    pub url: String,
    /// Extra headers attached to every request.
    pub headers: HashMap<String, String>,
    /// Per-request timeout.
    pub request_timeout: Option<Duration>,
    /// Idle timeout for the long-lived GET SSE stream.
    pub sse_timeout: Option<Duration>,
    /// Protocol version to advertise before `initialize` completes.
    pub version: Option<String>,
    /// OAuth-related transport settings.
    pub oauth: Option<OAuthTransportConfig>,
    /// Optional client-side rate limiting.
    pub rate_limit: Option<RateLimitConfig>,
    /// SSE reconnection policy.
    pub reconnection: ReconnectionConfig,
    /// A previously issued session id to resume, if the caller persisted one.
    pub session_id: Option<String>,
}

impl StreamableHttpConfig {
    /// Builds a config pointed at `url` with every optional field at its
    /// default.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            request_timeout: None,
            sse_timeout: None,
            version: None,
            oauth: None,
            rate_limit: None,
            reconnection: ReconnectionConfig::default(),
            session_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_then_caps() {
        let cfg = ReconnectionConfig::default();
        assert_eq!(cfg.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(cfg.delay_for_attempt(1), Duration::from_millis(1500));
        assert_eq!(cfg.delay_for_attempt(20), Duration::from_millis(30_000));
    }
}
