//! `notifications/progress`: incremental progress on a long-running request.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `notifications/progress` params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressNotification {
    /// Echoes the `progressToken` the caller attached to its `_meta`.
    #[serde(rename = "progressToken")]
    pub progress_token: Value,
    /// Work completed so far, in whatever unit the server chose.
    pub progress: f64,
    /// Total work expected, same unit as `progress`, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    /// Optional human-readable status line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
