//! Main request dispatcher: receives JSON-RPC messages, routes to handlers.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::logging;
use crate::tools::{ToolContext, ToolRegistry};
use crate::types::*;

use super::negotiation;
use super::validator::parse_envelope;

/// The protocol handler that dispatches incoming JSON-RPC messages.
///
/// Cheap to clone; the registry is shared and immutable.
#[derive(Clone)]
pub struct ProtocolHandler {
    registry: Arc<ToolRegistry>,
    context: ToolContext,
}

impl ProtocolHandler {
    pub fn new(registry: Arc<ToolRegistry>, context: ToolContext) -> Self {
        Self { registry, context }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    /// Run one decoded message to a terminal outcome.
    pub async fn dispatch(&self, raw: Value) -> DispatchOutcome {
        let request = match parse_envelope(&raw) {
            Ok(request) => request,
            Err(rejected) => {
                tracing::warn!("Rejected envelope: {}", rejected.error);
                return DispatchOutcome::Responded(rejected.error.to_response(rejected.id));
            }
        };

        let started = Instant::now();
        let result = self.dispatch_request(&request).await;
        logging::log_rpc_call(&request, started.elapsed(), result.as_ref().err());

        match request.id {
            Some(id) => DispatchOutcome::Responded(match result {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(e) => e.to_response(id),
            }),
            None => {
                if let Err(e) = result {
                    tracing::debug!("Dropping error for notification {}: {e}", request.method);
                }
                DispatchOutcome::Suppressed
            }
        }
    }

    async fn dispatch_request(&self, request: &JsonRpcRequest) -> McpResult<Value> {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params.clone()),

            "initialized" | "notifications/initialized" => {
                tracing::info!("MCP handshake complete");
                Ok(empty_object())
            }
            "notifications/cancelled" => {
                tracing::info!("Received cancellation notification");
                Ok(empty_object())
            }

            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(request.params.clone()).await,

            "ping" => Ok(empty_object()),

            _ => Err(McpError::MethodNotFound(request.method.clone())),
        }
    }

    fn handle_initialize(&self, params: Option<Value>) -> McpResult<Value> {
        let init_params: Option<InitializeParams> = params
            .filter(|p| !p.is_null())
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;

        let result = negotiation::negotiate(init_params);
        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }

    fn handle_tools_list(&self) -> McpResult<Value> {
        let result = ToolListResult {
            tools: self.registry.enumerate(),
            next_cursor: None,
        };
        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }

    async fn handle_tools_call(&self, params: Option<Value>) -> McpResult<Value> {
        let call_params: ToolCallParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::InvalidParams(e.to_string()))?
            .ok_or_else(|| McpError::InvalidParams("Tool call params required".to_string()))?;

        let arguments = match call_params.arguments {
            None | Some(Value::Null) => empty_object(),
            Some(args @ Value::Object(_)) => args,
            Some(_) => {
                return Err(McpError::InvalidParams(
                    "Tool arguments must be an object".to_string(),
                ))
            }
        };

        let result = self
            .registry
            .call(&call_params.name, arguments, &self.context)
            .await?;

        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}
