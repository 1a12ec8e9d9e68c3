//! Tool: get_user_info

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::types::{ToolCallResult, ToolDefinition};

use super::{parse_args, require_non_empty, ToolContext, ToolHandler, ToolResult};

#[derive(Debug, Deserialize)]
struct InfoParams {
    chat_id: String,
}

pub struct GetUserInfo;

#[async_trait]
impl ToolHandler for GetUserInfo {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_user_info".to_string(),
            description: "Check whether a user is registered and return their registration \
                info (GitLab URL, watched repositories, timestamps). Never returns the token."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "chat_id": { "type": "string", "description": "Chat ID of the user" }
                },
                "required": ["chat_id"]
            }),
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let params: InfoParams = parse_args(args)?;
        require_non_empty("chat_id", &params.chat_id)?;

        let Some(record) = ctx.vault().get(&params.chat_id).await? else {
            tracing::debug!("User {} not registered", params.chat_id);
            return Ok(ToolCallResult::json(&json!({
                "registered": false,
                "chat_id": params.chat_id,
                "message": "User not registered. Use register_user tool to register with GitLab credentials.",
            })));
        };

        Ok(ToolCallResult::json(&json!({
            "registered": true,
            "chat_id": record.caller_key,
            "gitlab_url": record.gitlab_url,
            "watched_repos": record.watched,
            "created_at": record.created_at.to_rfc3339(),
            "updated_at": record.updated_at.to_rfc3339(),
        })))
    }
}
