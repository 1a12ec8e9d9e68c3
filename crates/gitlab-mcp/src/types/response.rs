//! MCP response types for tools.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub content: Vec<ToolContent>,
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn text(text: String) -> Self {
        Self {
            content: vec![ToolContent::Text { text }],
            is_error: false,
        }
    }

    pub fn json(value: &impl Serialize) -> Self {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|e| e.to_string());
        Self::text(text)
    }

    /// Domain failure: `{"success": false, "error": TAG, "message": ...}`.
    pub fn failure(tag: &str, message: impl Into<String>) -> Self {
        let payload = serde_json::json!({
            "success": false,
            "error": tag,
            "message": message.into(),
        });
        Self {
            content: vec![ToolContent::Text {
                text: serde_json::to_string_pretty(&payload).unwrap_or_default(),
            }],
            is_error: true,
        }
    }

    /// First text block parsed as JSON, if it is JSON.
    pub fn payload(&self) -> Option<Value> {
        self.content.iter().find_map(|c| match c {
            ToolContent::Text { text } => serde_json::from_str(text).ok(),
        })
    }
}

/// Externally visible part of a tool: never includes the handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolListResult {
    pub tools: Vec<ToolDefinition>,
    #[serde(default, rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_payload() {
        let result = ToolCallResult::failure("USER_NOT_REGISTERED", "Register first");
        assert!(result.is_error);
        let payload = result.payload().unwrap();
        assert_eq!(payload["error"], "USER_NOT_REGISTERED");
        assert_eq!(payload["success"], false);
    }

    #[test]
    fn test_result_wire_shape() {
        let value = serde_json::to_value(ToolCallResult::text("hi".to_string())).unwrap();
        assert_eq!(
            value,
            json!({"content": [{"type": "text", "text": "hi"}], "isError": false})
        );
    }
}
