//! HTTP transport: JSON-RPC over `POST /mcp`, plus `/health` and `/mcp/info`.

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use futures::FutureExt;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::config::secrets_match;
use crate::protocol::{BatchOutcome, ProtocolHandler};
use crate::types::{
    JsonRpcResponse, McpError, McpResult, RequestId, MCP_VERSION, SERVER_NAME, SERVER_VERSION,
};

use super::framing::{self, IncomingMessage};

struct HttpState {
    handler: ProtocolHandler,
    token: Option<String>,
}

/// Builder for the HTTP router.
pub struct HttpTransport {
    state: Arc<HttpState>,
    admin: Option<Router>,
}

impl HttpTransport {
    pub fn new(handler: ProtocolHandler) -> Self {
        Self {
            state: Arc::new(HttpState {
                handler,
                token: None,
            }),
            admin: None,
        }
    }

    /// Require `Authorization: Bearer <token>` on the `/mcp` routes.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        let handler = self.state.handler.clone();
        self.state = Arc::new(HttpState { handler, token });
        self
    }

    /// Mount the admin API under `/api`.
    pub fn with_admin(mut self, admin: Router) -> Self {
        self.admin = Some(admin);
        self
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let mcp = Router::new()
            .route("/mcp", post(handle_rpc))
            .route("/mcp/info", get(handle_info))
            .layer(middleware::from_fn_with_state(self.state.clone(), auth_layer))
            .with_state(self.state.clone());

        let mut app = Router::new().route("/health", get(handle_health)).merge(mcp);
        if let Some(admin) = &self.admin {
            app = app.nest("/api", admin.clone());
        }

        app.layer(TraceLayer::new_for_http()).layer(cors)
    }

    /// Bind and serve until Ctrl-C.
    pub async fn run(&self, addr: SocketAddr) -> McpResult<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(McpError::Io)?;
        tracing::info!("HTTP transport listening on http://{addr}");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                tokio::signal::ctrl_c().await.ok();
                tracing::info!("Shutting down HTTP transport");
            })
            .await
            .map_err(|e| McpError::Transport(e.to_string()))
    }
}

fn rpc_reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn error_reply(status: StatusCode, error: McpError) -> Response {
    rpc_reply(status, error.to_response(RequestId::Null).to_value())
}

async fn auth_layer(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    if let Some(expected) = &state.token {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| secrets_match(expected, token));

        if !authorized {
            return error_reply(StatusCode::UNAUTHORIZED, McpError::Unauthorized);
        }
    }

    next.run(request).await
}

async fn handle_rpc(State(state): State<Arc<HttpState>>, body: Bytes) -> Response {
    let message = match framing::parse_bytes(&body) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Rejected HTTP body: {e}");
            return error_reply(StatusCode::BAD_REQUEST, e);
        }
    };

    let span = tracing::debug_span!("rpc", request_id = %uuid::Uuid::new_v4());
    match AssertUnwindSafe(process(&state.handler, message).instrument(span))
        .catch_unwind()
        .await
    {
        Ok(response) => response,
        Err(_) => {
            tracing::error!("Request handler panicked");
            rpc_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                JsonRpcResponse::failure(
                    RequestId::Null,
                    crate::types::error_codes::INTERNAL_ERROR,
                    crate::types::INTERNAL_ERROR_MESSAGE,
                )
                .to_value(),
            )
        }
    }
}

async fn process(handler: &ProtocolHandler, message: IncomingMessage) -> Response {
    match message {
        IncomingMessage::Single(raw) => match handler.dispatch(raw).await.into_response() {
            Some(response) => rpc_reply(StatusCode::OK, response.to_value()),
            None => StatusCode::NO_CONTENT.into_response(),
        },
        IncomingMessage::Batch(items) => match handler.dispatch_batch(items).await {
            BatchOutcome::Responses(responses) => rpc_reply(
                StatusCode::OK,
                Value::Array(responses.iter().map(|r| r.to_value()).collect()),
            ),
            BatchOutcome::NoContent => StatusCode::NO_CONTENT.into_response(),
            BatchOutcome::Rejected(response) => {
                rpc_reply(StatusCode::BAD_REQUEST, response.to_value())
            }
        },
    }
}

async fn handle_info(State(state): State<Arc<HttpState>>) -> Json<Value> {
    Json(json!({
        "name": SERVER_NAME,
        "version": SERVER_VERSION,
        "protocolVersion": MCP_VERSION,
        "transport": "http",
        "endpoints": {
            "rpc": "POST /mcp",
            "info": "GET /mcp/info",
            "health": "GET /health",
        },
        "tools": state.handler.registry().names(),
    }))
}

async fn handle_health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": SERVER_VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
