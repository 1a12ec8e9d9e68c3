//! Tool: retry_pipeline

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::types::{ToolCallResult, ToolDefinition};

use super::get_pipeline_status::short_sha;
use super::{
    gitlab_failure, parse_args, require_non_empty, tags, ToolContext, ToolError, ToolHandler,
    ToolResult,
};

#[derive(Debug, Deserialize)]
struct RetryParams {
    chat_id: String,
    project_path: String,
    #[serde(default)]
    pipeline_id: Option<u64>,
}

pub struct RetryPipeline;

#[async_trait]
impl ToolHandler for RetryPipeline {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "retry_pipeline".to_string(),
            description: "Retry the failed or canceled jobs of a pipeline. Uses the latest \
                pipeline of the project when pipeline_id is omitted."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "chat_id": { "type": "string", "description": "Chat ID of the registered user" },
                    "project_path": { "type": "string", "description": "Project path (e.g. group/project)" },
                    "pipeline_id": {
                        "type": "number",
                        "description": "Pipeline ID to retry. Defaults to the latest pipeline"
                    }
                },
                "required": ["chat_id", "project_path"]
            }),
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let params: RetryParams = parse_args(args)?;
        require_non_empty("chat_id", &params.chat_id)?;
        require_non_empty("project_path", &params.project_path)?;

        let (_, session) = ctx.session_for(&params.chat_id).await?;
        let project = params.project_path.as_str();

        let pipeline_id = match params.pipeline_id {
            Some(id) => id,
            None => session
                .list_pipelines(project, None, 1)
                .await
                .map_err(|e| gitlab_failure("retrying pipeline", e))?
                .first()
                .map(|p| p.id)
                .ok_or_else(|| {
                    ToolError::failure(
                        tags::GITLAB_ERROR,
                        format!("No pipelines found for {project}"),
                    )
                })?,
        };

        let pipeline = session
            .retry_pipeline(project, pipeline_id)
            .await
            .map_err(|e| gitlab_failure("retrying pipeline", e))?;

        let status = pipeline.status.clone().unwrap_or_else(|| "pending".to_string());
        tracing::info!(
            "Retried pipeline {pipeline_id} in {project}: new pipeline {} is {status}",
            pipeline.id
        );

        Ok(ToolCallResult::json(&json!({
            "success": true,
            "message": format!("Pipeline #{} has been retried", pipeline.id),
            "project_path": project,
            "pipeline": {
                "id": pipeline.id,
                "status": status,
                "url": pipeline.web_url,
                "ref": pipeline.git_ref,
                "commit_sha": short_sha(&pipeline),
            }
        })))
    }
}
