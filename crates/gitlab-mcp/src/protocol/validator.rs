//! JSON-RPC envelope validation.

use serde_json::Value;

use crate::types::{JsonRpcRequest, McpError, RequestId, JSONRPC_VERSION};

/// An envelope that could not be turned into a request.
///
/// Always answered, even when the message looked like a notification.
#[derive(Debug)]
pub struct RejectedEnvelope {
    pub id: RequestId,
    pub error: McpError,
}

impl RejectedEnvelope {
    fn new(id: RequestId, message: impl Into<String>) -> Self {
        Self {
            id,
            error: McpError::InvalidRequest(message.into()),
        }
    }
}

/// Classify one decoded JSON value as a request or notification.
pub fn parse_envelope(raw: &Value) -> Result<JsonRpcRequest, RejectedEnvelope> {
    let Some(obj) = raw.as_object() else {
        return Err(RejectedEnvelope::new(
            RequestId::Null,
            "Request must be a JSON object",
        ));
    };

    let id = match obj.get("id") {
        None => None,
        Some(Value::Null) => Some(RequestId::Null),
        Some(Value::String(s)) => Some(RequestId::String(s.clone())),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(n) => Some(RequestId::Number(n)),
            None => {
                return Err(RejectedEnvelope::new(
                    RequestId::Null,
                    "id must be a string or an integer",
                ))
            }
        },
        Some(_) => {
            return Err(RejectedEnvelope::new(
                RequestId::Null,
                "id must be a string or an integer",
            ))
        }
    };
    let reply_id = id.clone().unwrap_or(RequestId::Null);

    match obj.get("jsonrpc").and_then(Value::as_str) {
        Some(JSONRPC_VERSION) => {}
        Some(other) => {
            return Err(RejectedEnvelope::new(
                reply_id,
                format!("Expected jsonrpc version \"{JSONRPC_VERSION}\", got \"{other}\""),
            ))
        }
        None => {
            return Err(RejectedEnvelope::new(
                reply_id,
                format!("Missing jsonrpc version \"{JSONRPC_VERSION}\""),
            ))
        }
    }

    let method = match obj.get("method").and_then(Value::as_str) {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => {
            return Err(RejectedEnvelope::new(
                reply_id,
                "Method name must be a non-empty string",
            ))
        }
    };

    Ok(JsonRpcRequest {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id,
        method,
        params: obj.get("params").cloned(),
    })
}
