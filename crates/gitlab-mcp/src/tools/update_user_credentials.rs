//! Tool: update_user_credentials

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::gitlab::client::parse_base_url;
use crate::types::{ToolCallResult, ToolDefinition};

use super::{parse_args, require_non_empty, tags, ToolContext, ToolError, ToolHandler, ToolResult};

#[derive(Debug, Deserialize)]
struct UpdateParams {
    chat_id: String,
    #[serde(default)]
    gitlab_url: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

pub struct UpdateUserCredentials;

#[async_trait]
impl ToolHandler for UpdateUserCredentials {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "update_user_credentials".to_string(),
            description: "Update GitLab credentials for an existing registered user. \
                Either gitlab_url, access_token, or both may be changed; the merged \
                credentials are validated before they are stored."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "chat_id": { "type": "string", "description": "Chat ID of the user" },
                    "gitlab_url": { "type": "string", "description": "New GitLab instance URL (optional)" },
                    "access_token": { "type": "string", "description": "New GitLab personal access token (optional)" }
                },
                "required": ["chat_id"]
            }),
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let params: UpdateParams = parse_args(args)?;
        require_non_empty("chat_id", &params.chat_id)?;

        let new_url = params.gitlab_url.filter(|u| !u.trim().is_empty());
        let new_token = params.access_token.filter(|t| !t.is_empty());
        if new_url.is_none() && new_token.is_none() {
            return Err(ToolError::validation(
                "At least one of gitlab_url or access_token must be provided.",
            ));
        }
        if let Some(url) = &new_url {
            parse_base_url(url).map_err(|e| ToolError::validation(format!("Invalid input: {e}")))?;
        }

        let existing = ctx.vault().get_with_secret(&params.chat_id).await?.ok_or_else(|| {
            ToolError::failure(
                tags::USER_NOT_REGISTERED,
                "User not registered. Use register_user tool first.",
            )
        })?;

        let gitlab_url = new_url
            .as_deref()
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| existing.gitlab_url.clone());
        let access_token = new_token
            .clone()
            .unwrap_or_else(|| existing.access_token.clone());

        let session = ctx.gitlab().session(&gitlab_url, &access_token)?;
        if !session.validate().await {
            return Err(ToolError::failure(
                tags::INVALID_CREDENTIALS,
                "Could not authenticate with GitLab using the new credentials. \
                 Please check your URL and access token.",
            ));
        }

        ctx.vault()
            .upsert(
                &params.chat_id,
                &gitlab_url,
                &access_token,
                Some(existing.watched.clone()),
            )
            .await?;

        tracing::info!("Credentials updated for user {}", params.chat_id);

        Ok(ToolCallResult::json(&json!({
            "success": true,
            "message": "Credentials updated successfully",
            "data": {
                "chat_id": params.chat_id,
                "gitlab_url": gitlab_url,
                "updated_fields": {
                    "gitlab_url": new_url.is_some(),
                    "access_token": new_token.is_some(),
                }
            }
        })))
    }
}
