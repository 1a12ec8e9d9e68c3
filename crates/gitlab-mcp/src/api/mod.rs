//! Credential administration REST API, mounted under `/api`.
//!
//! Every route requires the `X-API-Key` header. No route ever returns a
//! decrypted access token.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{post, put},
    Router,
};
use gitlab_vault::{CredentialVault, PublicRecord, VaultError};
use serde::Deserialize;
use serde_json::json;

use crate::config::secrets_match;
use crate::gitlab::{GitLabClient, GitLabError};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared state of the admin routes.
#[derive(Clone)]
pub struct ApiState {
    api_key: Arc<str>,
    vault: CredentialVault,
    gitlab: GitLabClient,
}

impl ApiState {
    pub fn new(api_key: impl Into<Arc<str>>, vault: CredentialVault, gitlab: GitLabClient) -> Self {
        Self {
            api_key: api_key.into(),
            vault,
            gitlab,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("Missing API key")]
    MissingKey,

    #[error("Invalid API key")]
    InvalidKey,

    #[error("{0}")]
    BadRequest(String),

    #[error("No configuration for chat {0}")]
    NotFound(String),

    #[error("GitLab request failed: {0}")]
    Upstream(String),

    #[error(transparent)]
    Vault(#[from] VaultError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingKey => StatusCode::UNAUTHORIZED,
            ApiError::InvalidKey => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Vault(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            ApiError::MissingKey | ApiError::InvalidKey => "UNAUTHORIZED",
            ApiError::BadRequest(_) => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Upstream(_) => "GITLAB_ERROR",
            ApiError::Vault(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Vault(e) => {
                tracing::error!("Admin API vault failure: {e}");
                crate::types::INTERNAL_ERROR_MESSAGE.to_string()
            }
            other => other.to_string(),
        };
        let body = json!({
            "success": false,
            "error": self.tag(),
            "message": message,
        });
        (self.status(), Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

type ApiResult = Result<Json<serde_json::Value>, ApiError>;

fn config_body(record: PublicRecord) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "config": record }))
}

#[derive(Debug, Deserialize)]
struct ConfigRequest {
    gitlab_url: String,
    access_token: String,
    #[serde(default)]
    watched_repos: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ReposRequest {
    watched_repos: Vec<String>,
}

/// Build the `/api` router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/chats/:chat_id/config",
            post(save_config).get(get_config).delete(delete_config),
        )
        .route("/chats/:chat_id/repos", put(update_repos))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .with_state(state)
}

async fn require_api_key(
    State(state): State<ApiState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let Some(provided) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) else {
        return ApiError::MissingKey.into_response();
    };
    if !secrets_match(&state.api_key, provided) {
        tracing::warn!("Admin API request with invalid key");
        return ApiError::InvalidKey.into_response();
    }
    next.run(request).await
}

async fn save_config(
    State(state): State<ApiState>,
    Path(chat_id): Path<String>,
    body: Result<Json<ConfigRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    if body.access_token.trim().is_empty() {
        return Err(ApiError::BadRequest("access_token must not be empty".to_string()));
    }
    let gitlab_url = body.gitlab_url.trim().trim_end_matches('/').to_string();

    let session = state
        .gitlab
        .session(&gitlab_url, &body.access_token)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    match session.current_user().await {
        Ok(user) => tracing::debug!("Admin API validated {gitlab_url} as {}", user.display_name()),
        Err(GitLabError::Api { status, .. }) => {
            return Err(ApiError::BadRequest(format!(
                "GitLab rejected the credentials (HTTP {status})"
            )))
        }
        Err(e) => return Err(ApiError::Upstream(e.to_string())),
    }

    let record = state
        .vault
        .upsert(&chat_id, &gitlab_url, &body.access_token, body.watched_repos)
        .await?;
    tracing::info!("Admin API saved configuration for chat {chat_id}");
    Ok(config_body(record))
}

async fn get_config(State(state): State<ApiState>, Path(chat_id): Path<String>) -> ApiResult {
    match state.vault.get(&chat_id).await? {
        Some(record) => Ok(config_body(record)),
        None => Err(ApiError::NotFound(chat_id)),
    }
}

async fn update_repos(
    State(state): State<ApiState>,
    Path(chat_id): Path<String>,
    body: Result<Json<ReposRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    match state.vault.update_watched(&chat_id, body.watched_repos).await? {
        Some(record) => Ok(config_body(record)),
        None => Err(ApiError::NotFound(chat_id)),
    }
}

async fn delete_config(State(state): State<ApiState>, Path(chat_id): Path<String>) -> ApiResult {
    match state.vault.delete(&chat_id).await {
        Ok(()) => Ok(Json(json!({ "success": true }))),
        Err(VaultError::NotFound(_)) => Err(ApiError::NotFound(chat_id)),
        Err(e) => Err(e.into()),
    }
}
