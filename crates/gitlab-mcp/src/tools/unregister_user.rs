//! Tool: unregister_user

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::types::{ToolCallResult, ToolDefinition};

use super::{parse_args, require_non_empty, tags, ToolContext, ToolError, ToolHandler, ToolResult};

#[derive(Debug, Deserialize)]
struct UnregisterParams {
    chat_id: String,
}

pub struct UnregisterUser;

#[async_trait]
impl ToolHandler for UnregisterUser {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "unregister_user".to_string(),
            description: "Remove a user registration and delete their stored GitLab credentials. \
                This cannot be undone."
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
        let params: UnregisterParams = parse_args(args)?;
        require_non_empty("chat_id", &params.chat_id)?;

        if !ctx.vault().exists(&params.chat_id).await? {
            return Err(ToolError::failure(
                tags::USER_NOT_REGISTERED,
                "User not registered.",
            ));
        }
        ctx.vault().delete(&params.chat_id).await?;

        tracing::info!("User {} unregistered", params.chat_id);

        Ok(ToolCallResult::json(&json!({
            "success": true,
            "message": "User unregistered successfully. All credentials have been deleted.",
            "chat_id": params.chat_id,
        })))
    }
}
