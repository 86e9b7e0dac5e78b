//! Elicitation requests (§4.6): the server asks the client to collect
//! structured input from the user against a JSON Schema. Deferred the
//! same way approvals are, but completion validates the submitted
//! content against the request's `requestedSchema` first.
//!
//! Validation here is intentionally shallow — required-key presence and
//! top-level `type` agreement for declared properties — rather than a
//! full JSON Schema implementation. Nothing else in this workspace pulls
//! in a schema-validation crate, and the protocol only asks that client
//! content "matches the requested schema" (§4.6), not that every schema
//! keyword be enforced.

use std::sync::Arc;
use std::time::Instant;

use mcp_protocol::types::elicitation::{ElicitAction, ElicitRequest, ElicitResult};
use serde_json::Value;

use super::Registry;
use crate::promise::PromiseHandle;

type Inner = Registry<ElicitRequest, ElicitResult>;

/// Elicitation registry for one coordinator instance.
pub struct ElicitationRegistry {
    inner: Arc<Inner>,
}

impl ElicitationRegistry {
    /// Builds a fresh, empty elicitation registry.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self { inner: Registry::new("Elicitation timed out") })
    }

    /// Registers a deferred elicitation request.
    pub fn defer(&self, id: String, request: ElicitRequest, deadline: Instant) -> PromiseHandle<ElicitResult> {
        self.inner.store(id, request, deadline)
    }

    /// Completes a pending elicitation. `Accept` responses are validated
    /// against the original request's schema before being accepted; a
    /// mismatch rejects the handle with a descriptive reason rather than
    /// silently forwarding malformed content to the server.
    pub fn complete(&self, id: &str, result: ElicitResult) -> Result<bool, String> {
        let Some(request) = self.inner.context(id) else {
            return Ok(false);
        };
        if result.action == ElicitAction::Accept {
            let content = result.content.as_ref().ok_or_else(|| {
                "elicitation accepted without content".to_string()
            })?;
            validate_against_schema(&request.requested_schema, content)?;
        }
        Ok(self.inner.complete(id, result))
    }

    /// Context of a still-pending elicitation, if any.
    #[must_use]
    pub fn context(&self, id: &str) -> Option<ElicitRequest> {
        self.inner.context(id)
    }

    /// Rejects every pending elicitation; called on coordinator shutdown.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

fn validate_against_schema(schema: &Value, content: &Value) -> Result<(), String> {
    let Some(schema_type) = schema.get("type").and_then(Value::as_str) else {
        return Ok(());
    };
    if schema_type == "object" {
        let Value::Object(content_map) = content else {
            return Err("content does not match schema: expected an object".to_string());
        };
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for key in required {
                let Some(key) = key.as_str() else { continue };
                if !content_map.contains_key(key) {
                    return Err(format!("content missing required field \"{key}\""));
                }
            }
        }
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (key, prop_schema) in properties {
                let Some(value) = content_map.get(key) else { continue };
                if let Some(prop_type) = prop_schema.get("type").and_then(Value::as_str) {
                    if !json_type_matches(prop_type, value) {
                        return Err(format!("field \"{key}\" does not match declared type \"{prop_type}\""));
                    }
                }
            }
        }
    } else if !json_type_matches(schema_type, content) {
        return Err(format!("content does not match schema: expected \"{schema_type}\""));
    }
    Ok(())
}

fn json_type_matches(schema_type: &str, value: &Value) -> bool {
    match schema_type {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn request(schema: Value) -> ElicitRequest {
        ElicitRequest { message: "please confirm".into(), requested_schema: schema }
    }

    #[tokio::test]
    async fn accept_matching_schema_resolves() {
        let registry = ElicitationRegistry::new();
        let schema = json!({"type": "object", "required": ["name"], "properties": {"name": {"type": "string"}}});
        let handle = registry.defer("e1".into(), request(schema), Instant::now() + Duration::from_secs(5));
        let result = ElicitResult { action: ElicitAction::Accept, content: Some(json!({"name": "ada"})) };
        assert!(registry.complete("e1", result).unwrap());
        let outcome = handle.wait().await;
        assert!(matches!(outcome, crate::promise::Outcome::Resolved(r) if r.action == ElicitAction::Accept));
    }

    #[tokio::test]
    async fn accept_missing_required_field_is_rejected() {
        let registry = ElicitationRegistry::new();
        let schema = json!({"type": "object", "required": ["name"]});
        let _handle = registry.defer("e2".into(), request(schema), Instant::now() + Duration::from_secs(5));
        let result = ElicitResult { action: ElicitAction::Accept, content: Some(json!({})) };
        assert!(registry.complete("e2", result).is_err());
    }

    #[tokio::test]
    async fn decline_bypasses_validation() {
        let registry = ElicitationRegistry::new();
        let schema = json!({"type": "object", "required": ["name"]});
        let handle = registry.defer("e3".into(), request(schema), Instant::now() + Duration::from_secs(5));
        let result = ElicitResult { action: ElicitAction::Decline, content: None };
        assert!(registry.complete("e3", result).unwrap());
        assert!(matches!(
            handle.wait().await,
            crate::promise::Outcome::Resolved(r) if r.action == ElicitAction::Decline
        ));
    }
}
