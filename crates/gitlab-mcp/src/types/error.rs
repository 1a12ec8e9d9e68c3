//! Error types and JSON-RPC error codes for the MCP server.

use super::message::{JsonRpcResponse, RequestId};

/// Standard JSON-RPC 2.0 error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Server-specific error codes.
pub mod mcp_error_codes {
    /// Server: Unauthorized (missing or invalid bearer token).
    pub const UNAUTHORIZED: i32 = -32900;
}

/// Message sent in place of internal error details.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal error";

/// Dispatch-level errors. Each maps to one JSON-RPC error code.
///
/// Business failures never end up here; tools report those as
/// `isError: true` results.
#[derive(thiserror::Error, Debug)]
pub enum McpError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    /// Raised by a tool handler that wants a specific code on the wire.
    #[error("{message}")]
    Rpc { code: i32, message: String },

    #[error("Vault error: {0}")]
    Vault(#[from] gitlab_vault::VaultError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or invalid bearer token.
    #[error("Unauthorized")]
    Unauthorized,
}

impl McpError {
    pub fn code(&self) -> i32 {
        use error_codes::*;
        use mcp_error_codes::*;
        match self {
            McpError::ParseError(_) => PARSE_ERROR,
            McpError::InvalidRequest(_) => INVALID_REQUEST,
            McpError::MethodNotFound(_) | McpError::ToolNotFound(_) => METHOD_NOT_FOUND,
            McpError::InvalidParams(_) => INVALID_PARAMS,
            McpError::Rpc { code, .. } => *code,
            McpError::InternalError(_)
            | McpError::Vault(_)
            | McpError::Transport(_)
            | McpError::Io(_)
            | McpError::Json(_) => INTERNAL_ERROR,
            McpError::Unauthorized => UNAUTHORIZED,
        }
    }

    /// Whether details must stay in server logs.
    pub fn is_internal(&self) -> bool {
        self.code() == error_codes::INTERNAL_ERROR && !matches!(self, McpError::Rpc { .. })
    }

    /// Message safe to put on the wire.
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }

    pub fn to_response(&self, id: RequestId) -> JsonRpcResponse {
        if self.is_internal() {
            tracing::error!("Internal error for request {id}: {self}");
        }
        JsonRpcResponse::failure(id, self.code(), self.public_message())
    }
}

pub type McpResult<T> = Result<T, McpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_not_found_is_method_not_found() {
        let err = McpError::ToolNotFound("nope".to_string());
        assert_eq!(err.code(), -32601);
        assert_eq!(err.public_message(), "Tool not found: nope");
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = McpError::Vault(gitlab_vault::VaultError::DecryptionFailed);
        assert_eq!(err.code(), -32603);
        assert_eq!(err.public_message(), INTERNAL_ERROR_MESSAGE);
    }

    #[test]
    fn test_rpc_error_keeps_code_and_message() {
        let err = McpError::Rpc {
            code: -32001,
            message: "Upstream unavailable".to_string(),
        };
        assert_eq!(err.code(), -32001);
        assert_eq!(err.public_message(), "Upstream unavailable");

        let internal = McpError::Rpc {
            code: -32603,
            message: "Deliberate".to_string(),
        };
        assert_eq!(internal.public_message(), "Deliberate");
    }
}
