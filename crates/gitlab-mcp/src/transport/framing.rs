//! Message framing shared by the transports.

use serde_json::Value;

use crate::types::{McpError, McpResult};

/// One decoded transport payload: a single message or a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    Single(Value),
    Batch(Vec<Value>),
}

/// Parse raw text as a JSON-RPC payload.
pub fn parse_message(text: &str) -> McpResult<IncomingMessage> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(McpError::ParseError("Empty message".to_string()));
    }

    let value: Value =
        serde_json::from_str(trimmed).map_err(|e| McpError::ParseError(e.to_string()))?;
    Ok(match value {
        Value::Null => return Err(McpError::ParseError("Empty message".to_string())),
        Value::Array(items) => IncomingMessage::Batch(items),
        other => IncomingMessage::Single(other),
    })
}

/// Parse a raw body; bytes that are not UTF-8 are a parse error.
pub fn parse_bytes(bytes: &[u8]) -> McpResult<IncomingMessage> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| McpError::ParseError(format!("Body is not valid UTF-8: {e}")))?;
    parse_message(text)
}

/// Serialize a value to a JSON line (with trailing newline).
pub fn frame_message(value: &Value) -> McpResult<String> {
    let mut json = serde_json::to_string(value).map_err(McpError::Json)?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_and_batch() {
        let single = parse_message(r#"{"jsonrpc":"2.0","method":"ping","id":1}"#).unwrap();
        assert!(matches!(single, IncomingMessage::Single(Value::Object(_))));

        let batch = parse_message(" [1, 2] \n").unwrap();
        assert_eq!(
            batch,
            IncomingMessage::Batch(vec![serde_json::json!(1), serde_json::json!(2)])
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_message("   ").unwrap_err().code(), -32700);
        assert_eq!(parse_message("{not json").unwrap_err().code(), -32700);
        assert_eq!(parse_message(" null ").unwrap_err().code(), -32700);
    }

    #[test]
    fn test_parse_bytes_rejects_invalid_utf8() {
        let body = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"\xff\xfe\"}";
        assert_eq!(parse_bytes(body).unwrap_err().code(), -32700);
        assert!(parse_bytes(b"{\"id\":1}").is_ok());
    }

    #[test]
    fn test_frame_message_appends_newline() {
        let framed = frame_message(&serde_json::json!({"a": 1})).unwrap();
        assert_eq!(framed, "{\"a\":1}\n");
    }
}
