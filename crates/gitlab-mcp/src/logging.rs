//! Request logging helpers. Secrets are masked before anything is logged.

use std::time::Duration;

use serde_json::Value;

use crate::types::{JsonRpcRequest, McpError};

pub const REDACTED: &str = "***REDACTED***";

const SENSITIVE_KEYS: &[&str] = &["access_token", "token", "password", "secret"];

/// Copy of `value` with every sensitive key masked, at any depth.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, inner)| {
                    let masked = if is_sensitive(key) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact(inner)
                    };
                    (key.clone(), masked)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

fn is_sensitive(key: &str) -> bool {
    SENSITIVE_KEYS
        .iter()
        .any(|candidate| key.eq_ignore_ascii_case(candidate))
}

/// One line per JSON-RPC call.
pub fn log_rpc_call(request: &JsonRpcRequest, elapsed: Duration, error: Option<&McpError>) {
    let id = request
        .id
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".to_string());
    let duration_ms = elapsed.as_millis() as u64;

    if let Some(params) = &request.params {
        tracing::debug!(method = %request.method, %id, params = %redact(params), "rpc params");
    }

    match error {
        Some(e) => tracing::warn!(
            method = %request.method,
            %id,
            duration_ms,
            code = e.code(),
            "rpc call failed"
        ),
        None => tracing::info!(method = %request.method, %id, duration_ms, "rpc call"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redacts_nested_tool_arguments() {
        let params = json!({
            "name": "register_user",
            "arguments": {
                "chat_id": "42",
                "access_token": "glpat-secret",
                "nested": [{"Password": "hunter2"}]
            }
        });
        let masked = redact(&params);
        assert_eq!(masked["arguments"]["access_token"], REDACTED);
        assert_eq!(masked["arguments"]["nested"][0]["Password"], REDACTED);
        assert_eq!(masked["arguments"]["chat_id"], "42");
        assert!(!masked.to_string().contains("glpat-secret"));
    }
}
