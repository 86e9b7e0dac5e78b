//! `roots/list`: filesystem paths the client grants the server awareness of.

use serde::{Deserialize, Serialize};

/// One root the client exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Root {
    /// `file://` URI of the root directory.
    pub uri: String,
    /// Human-readable display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// `roots/list` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRootsResult {
    /// The client's configured roots.
    pub roots: Vec<Root>,
}
