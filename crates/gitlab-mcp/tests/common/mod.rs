//! Shared fixtures: a handler over scripted tools.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use gitlab_mcp::gitlab::GitLabClient;
use gitlab_mcp::protocol::ProtocolHandler;
use gitlab_mcp::tools::{ToolContext, ToolError, ToolHandler, ToolRegistry, ToolResult};
use gitlab_mcp::types::{McpError, ToolCallResult, ToolDefinition};
use gitlab_vault::{CredentialVault, MasterKey};

fn definition(name: &str) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: format!("Test tool {name}"),
        input_schema: json!({ "type": "object" }),
    }
}

/// Echoes its arguments back, optionally after a delay (`delay_ms`).
pub struct Echo;

#[async_trait]
impl ToolHandler for Echo {
    fn definition(&self) -> ToolDefinition {
        definition("echo")
    }

    async fn call(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        if let Some(ms) = args.get("delay_ms").and_then(Value::as_u64) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        Ok(ToolCallResult::text(args.to_string()))
    }
}

/// Always fails with a domain error.
pub struct Refuse;

#[async_trait]
impl ToolHandler for Refuse {
    fn definition(&self) -> ToolDefinition {
        definition("refuse")
    }

    async fn call(&self, _args: Value, _ctx: &ToolContext) -> ToolResult {
        Err(ToolError::failure("VALIDATION_ERROR", "nope"))
    }
}

/// Fails with a caller-chosen JSON-RPC error code.
pub struct Reject;

#[async_trait]
impl ToolHandler for Reject {
    fn definition(&self) -> ToolDefinition {
        definition("reject")
    }

    async fn call(&self, _args: Value, _ctx: &ToolContext) -> ToolResult {
        Err(ToolError::Dispatch(McpError::Rpc {
            code: -32050,
            message: "Rate limited".to_string(),
        }))
    }
}

/// Fails with an internal error whose detail must not leak.
pub struct Crash;

#[async_trait]
impl ToolHandler for Crash {
    fn definition(&self) -> ToolDefinition {
        definition("crash")
    }

    async fn call(&self, _args: Value, _ctx: &ToolContext) -> ToolResult {
        Err(ToolError::Dispatch(McpError::InternalError(
            "connection string postgres://admin:hunter2@db".to_string(),
        )))
    }
}

/// Panics inside the handler.
pub struct Explode;

#[async_trait]
impl ToolHandler for Explode {
    fn definition(&self) -> ToolDefinition {
        definition("explode")
    }

    async fn call(&self, _args: Value, _ctx: &ToolContext) -> ToolResult {
        panic!("tool exploded")
    }
}

pub fn master_key() -> MasterKey {
    MasterKey::new("test-master-key-0123456789abcdef!").unwrap()
}

pub fn context() -> ToolContext {
    ToolContext::new(
        CredentialVault::in_memory(master_key()),
        GitLabClient::new().unwrap(),
    )
}

pub fn handler() -> ProtocolHandler {
    let registry = ToolRegistry::with_handlers(vec![
        Arc::new(Echo),
        Arc::new(Refuse),
        Arc::new(Reject),
        Arc::new(Crash),
        Arc::new(Explode),
    ]);
    ProtocolHandler::new(Arc::new(registry), context())
}

pub fn request(id: Value, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
}

pub fn notification(method: &str) -> Value {
    json!({ "jsonrpc": "2.0", "method": method })
}

pub fn call(id: i64, tool: &str, arguments: Value) -> Value {
    request(json!(id), "tools/call", json!({ "name": tool, "arguments": arguments }))
}

// ─────────────────────── fake GitLab ───────────────────────

pub const GOOD_TOKEN: &str = "glpat-good-token";

mod fake_gitlab {
    use axum::{
        extract::{Path, Query},
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Json, Response},
        routing::{get, post, put},
        Router,
    };
    use serde_json::{json, Value};
    use std::collections::HashMap;

    use super::GOOD_TOKEN;

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("private-token")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|t| t == GOOD_TOKEN)
    }

    fn guard(headers: &HeaderMap, body: Value) -> Response {
        if !authorized(headers) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": "401 Unauthorized" })),
            )
                .into_response();
        }
        Json(body).into_response()
    }

    async fn user(headers: HeaderMap) -> Response {
        guard(&headers, json!({ "id": 1, "username": "alice", "name": "Alice" }))
    }

    async fn projects(headers: HeaderMap, Query(q): Query<HashMap<String, String>>) -> Response {
        let mut all = vec![
            json!({
                "id": 10, "name": "app", "path_with_namespace": "group/app",
                "web_url": "https://gitlab.test/group/app", "description": "",
                "default_branch": "main", "visibility": "internal",
                "star_count": 3, "forks_count": 1
            }),
            json!({
                "id": 11, "name": "lib", "path_with_namespace": "group/lib",
                "web_url": "https://gitlab.test/group/lib", "default_branch": "main"
            }),
        ];
        if let Some(search) = q.get("search") {
            all.retain(|p| p["name"].as_str().is_some_and(|n| n.contains(search.as_str())));
        }
        guard(&headers, Value::Array(all))
    }

    async fn project(headers: HeaderMap, Path(id): Path<String>) -> Response {
        if id != "group/app" {
            return (StatusCode::NOT_FOUND, Json(json!({ "message": "404 Project Not Found" })))
                .into_response();
        }
        guard(
            &headers,
            json!({ "id": 10, "name": "app", "path_with_namespace": id, "default_branch": "main" }),
        )
    }

    async fn pipelines(headers: HeaderMap, Query(q): Query<HashMap<String, String>>) -> Response {
        let body = if q.get("ref").map(String::as_str) == Some("main") {
            json!([{
                "id": 500, "status": "failed", "ref": "main",
                "sha": "0123456789abcdef", "web_url": "https://gitlab.test/p/500",
                "duration": 125.0
            }])
        } else {
            json!([])
        };
        guard(&headers, body)
    }

    async fn jobs(headers: HeaderMap) -> Response {
        guard(
            &headers,
            json!([
                { "stage": "build", "status": "success" },
                { "stage": "test", "status": "failed" },
                { "stage": "test", "status": "success" }
            ]),
        )
    }

    async fn create_issue(headers: HeaderMap, Json(body): Json<Value>) -> Response {
        guard(
            &headers,
            json!({
                "id": 900, "iid": 42, "title": body["title"], "state": "opened",
                "description": body["description"],
                "labels": body["labels"].as_str().map(|l| l.split(',').collect::<Vec<_>>()).unwrap_or_default(),
                "author": { "id": 1, "username": "alice" },
                "web_url": "https://gitlab.test/group/app/-/issues/42"
            }),
        )
    }

    async fn users(headers: HeaderMap, Query(q): Query<HashMap<String, String>>) -> Response {
        let body = match q.get("username").map(String::as_str) {
            Some("bob") => json!([{ "id": 7, "username": "bob", "name": "Bob" }]),
            _ => json!([]),
        };
        guard(&headers, body)
    }

    async fn update_issue(headers: HeaderMap, Json(body): Json<Value>) -> Response {
        let assignees: Vec<Value> = body["assignee_ids"]
            .as_array()
            .map(|ids| ids.iter().map(|id| json!({ "id": id, "username": "bob" })).collect())
            .unwrap_or_default();
        guard(
            &headers,
            json!({ "id": 900, "iid": 42, "title": "Bug", "assignees": assignees }),
        )
    }

    pub fn router() -> Router {
        Router::new()
            .route("/api/v4/user", get(user))
            .route("/api/v4/users", get(users))
            .route("/api/v4/projects", get(projects))
            .route("/api/v4/projects/:id", get(project))
            .route("/api/v4/projects/:id/pipelines", get(pipelines))
            .route("/api/v4/projects/:id/pipelines/:pid/jobs", get(jobs))
            .route("/api/v4/projects/:id/issues", post(create_issue))
            .route("/api/v4/projects/:id/issues/:iid", put(update_issue))
    }
}

/// Serve the fake GitLab API on an ephemeral port; returns its base URL.
pub async fn spawn_fake_gitlab() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, fake_gitlab::router()).await.unwrap();
    });
    format!("http://{addr}")
}
