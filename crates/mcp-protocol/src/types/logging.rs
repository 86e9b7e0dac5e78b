//! `logging/setLevel` and the `notifications/message` log stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// RFC 5424 syslog severity levels, as used by `logging/setLevel`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Level 7.
    Debug,
    /// Level 6.
    Info,
    /// Level 5.
    Notice,
    /// Level 4.
    Warning,
    /// Level 3.
    Error,
    /// Level 2.
    Critical,
    /// Level 1.
    Alert,
    /// Level 0.
    Emergency,
}

/// `logging/setLevel` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetLevelRequest {
    /// Minimum severity the server should forward.
    pub level: LogLevel,
}

/// `notifications/message` params: one server log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingMessageNotification {
    /// Severity of this entry.
    pub level: LogLevel,
    /// Optional logger/component name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    /// Arbitrary structured or string payload.
    pub data: Value,
}
