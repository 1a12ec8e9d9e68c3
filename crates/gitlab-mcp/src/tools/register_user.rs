//! Tool: register_user

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::gitlab::client::parse_base_url;
use crate::types::{ToolCallResult, ToolDefinition};

use super::{parse_args, require_non_empty, tags, ToolContext, ToolError, ToolHandler, ToolResult};

#[derive(Debug, Deserialize)]
struct RegisterParams {
    chat_id: String,
    gitlab_url: String,
    access_token: String,
}

pub struct RegisterUser;

#[async_trait]
impl ToolHandler for RegisterUser {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "register_user".to_string(),
            description: "Register a new user by saving their GitLab credentials. \
                The credentials are validated against GitLab before they are stored. \
                Fails if the user already exists; use update_user_credentials instead."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "chat_id": { "type": "string", "description": "Chat ID of the user" },
                    "gitlab_url": {
                        "type": "string",
                        "description": "GitLab instance URL (e.g. https://gitlab.com)"
                    },
                    "access_token": {
                        "type": "string",
                        "description": "GitLab personal access token with read_api scope"
                    }
                },
                "required": ["chat_id", "gitlab_url", "access_token"]
            }),
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let params: RegisterParams = parse_args(args)?;
        require_non_empty("chat_id", &params.chat_id)?;
        require_non_empty("access_token", &params.access_token)?;
        parse_base_url(&params.gitlab_url)
            .map_err(|e| ToolError::validation(format!("Invalid input: {e}")))?;
        let gitlab_url = params.gitlab_url.trim().trim_end_matches('/').to_string();

        if ctx.vault().exists(&params.chat_id).await? {
            return Err(ToolError::failure(
                tags::USER_ALREADY_EXISTS,
                "User already registered. Use update_user_credentials tool to update credentials.",
            ));
        }

        let session = ctx.gitlab().session(&gitlab_url, &params.access_token)?;
        let user = session.current_user().await.map_err(|e| {
            tracing::warn!("Invalid credentials for {gitlab_url}: {e}");
            ToolError::failure(
                tags::INVALID_CREDENTIALS,
                "Could not authenticate with GitLab. Please check your URL and access token.",
            )
        })?;

        ctx.vault()
            .upsert(&params.chat_id, &gitlab_url, &params.access_token, None)
            .await?;

        tracing::info!(
            "User {} registered as {}",
            params.chat_id,
            user.display_name()
        );

        Ok(ToolCallResult::json(&json!({
            "success": true,
            "message": "User registered successfully",
            "data": {
                "chat_id": params.chat_id,
                "gitlab_url": gitlab_url,
                "gitlab_username": user.username,
                "gitlab_name": user.name,
            }
        })))
    }
}
