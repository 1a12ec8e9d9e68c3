//! MCP tool implementations.

pub mod context;
pub mod diff;
pub mod registry;

pub mod create_issue;
pub mod get_mr_details;
pub mod get_pipeline_status;
pub mod get_user_info;
pub mod list_issues;
pub mod list_merge_requests;
pub mod list_projects;
pub mod register_user;
pub mod retry_pipeline;
pub mod review_patch;
pub mod unregister_user;
pub mod update_user_credentials;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::gitlab::GitLabError;
use crate::types::{McpError, ToolCallResult, ToolDefinition};

pub use context::ToolContext;
pub use registry::{ToolProfile, ToolRegistry};

/// Machine-readable tags carried in `isError` payloads.
pub mod tags {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const USER_NOT_REGISTERED: &str = "USER_NOT_REGISTERED";
    pub const USER_ALREADY_EXISTS: &str = "USER_ALREADY_EXISTS";
    pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";
    pub const GITLAB_ERROR: &str = "GITLAB_ERROR";
    pub const NO_DIFF: &str = "NO_DIFF";
}

/// How a tool invocation can fail.
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    /// Business outcome failed; reported as an `isError: true` result.
    #[error("{tag}: {message}")]
    Failure { tag: &'static str, message: String },

    /// Surfaced as a JSON-RPC error instead of a tool result.
    #[error(transparent)]
    Dispatch(#[from] McpError),
}

impl ToolError {
    pub fn failure(tag: &'static str, message: impl Into<String>) -> Self {
        ToolError::Failure {
            tag,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::failure(tags::VALIDATION_ERROR, message)
    }
}

impl From<gitlab_vault::VaultError> for ToolError {
    fn from(e: gitlab_vault::VaultError) -> Self {
        ToolError::Dispatch(McpError::Vault(e))
    }
}

impl From<GitLabError> for ToolError {
    fn from(e: GitLabError) -> Self {
        ToolError::failure(tags::GITLAB_ERROR, e.to_string())
    }
}

pub type ToolResult = Result<ToolCallResult, ToolError>;

/// A named, schema-described action reachable through `tools/call`.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn call(&self, args: Value, ctx: &ToolContext) -> ToolResult;
}

/// Deserialize tool arguments; shape errors are `VALIDATION_ERROR`.
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::validation(format!("Invalid input: {e}")))
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), ToolError> {
    if value.trim().is_empty() {
        return Err(ToolError::validation(format!(
            "Invalid input: {field} must not be empty"
        )));
    }
    Ok(())
}

pub(crate) fn require_range(field: &str, value: u64, min: u64, max: u64) -> Result<(), ToolError> {
    if value < min || value > max {
        return Err(ToolError::validation(format!(
            "Invalid input: {field} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(())
}

pub(crate) fn require_one_of(field: &str, value: &str, allowed: &[&str]) -> Result<(), ToolError> {
    if !allowed.contains(&value) {
        return Err(ToolError::validation(format!(
            "Invalid input: {field} must be one of {}, got \"{value}\"",
            allowed.join(", ")
        )));
    }
    Ok(())
}

/// Format a GitLab failure with the action that was attempted.
pub(crate) fn gitlab_failure(action: &str, e: GitLabError) -> ToolError {
    tracing::error!("GitLab call failed while {action}: {e}");
    ToolError::failure(tags::GITLAB_ERROR, format!("Error {action}: {e}"))
}

fn default_per_page() -> u32 {
    20
}

fn default_true() -> bool {
    true
}
