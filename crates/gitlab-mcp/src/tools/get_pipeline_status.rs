//! Tool: get_pipeline_status

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::gitlab::models::{Job, Pipeline};
use crate::types::{ToolCallResult, ToolDefinition};

use super::{gitlab_failure, parse_args, require_non_empty, ToolContext, ToolHandler, ToolResult};

#[derive(Debug, Deserialize)]
struct PipelineStatusParams {
    chat_id: String,
    project_path: String,
    #[serde(default)]
    branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSummary {
    pub name: String,
    pub status: String,
}

/// Collapse job statuses into one status per stage, in first-seen order.
///
/// Precedence: failed, running, pending, canceled, then skipped when every
/// job was skipped, else success.
pub fn summarize_stages(jobs: &[Job]) -> Vec<StageSummary> {
    let mut stages: Vec<(String, Vec<String>)> = Vec::new();
    for job in jobs {
        let stage = job.stage.clone().unwrap_or_else(|| "unknown".to_string());
        let status = job.status.clone().unwrap_or_else(|| "unknown".to_string());
        match stages.iter_mut().find(|(name, _)| *name == stage) {
            Some((_, statuses)) => statuses.push(status),
            None => stages.push((stage, vec![status])),
        }
    }

    stages
        .into_iter()
        .map(|(name, statuses)| {
            let has = |s: &str| statuses.iter().any(|status| status == s);
            let status = if has("failed") {
                "failed"
            } else if has("running") {
                "running"
            } else if has("pending") {
                "pending"
            } else if has("canceled") {
                "canceled"
            } else if statuses.iter().all(|s| s == "skipped") {
                "skipped"
            } else {
                "success"
            };
            StageSummary {
                name,
                status: status.to_string(),
            }
        })
        .collect()
}

pub(crate) fn duration_display(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}m {}s", total / 60, total % 60)
}

pub(crate) fn short_sha(pipeline: &Pipeline) -> String {
    pipeline
        .sha
        .as_deref()
        .unwrap_or_default()
        .chars()
        .take(8)
        .collect()
}

pub struct GetPipelineStatus;

#[async_trait]
impl ToolHandler for GetPipelineStatus {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_pipeline_status".to_string(),
            description: "Get the latest CI/CD pipeline for a branch (default branch if omitted), \
                with per-stage status."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "chat_id": { "type": "string", "description": "Chat ID of the registered user" },
                    "project_path": { "type": "string", "description": "Project path (e.g. group/project)" },
                    "branch": {
                        "type": "string",
                        "description": "Branch name. Defaults to the project default branch"
                    }
                },
                "required": ["chat_id", "project_path"]
            }),
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let params: PipelineStatusParams = parse_args(args)?;
        require_non_empty("chat_id", &params.chat_id)?;
        require_non_empty("project_path", &params.project_path)?;

        let (_, session) = ctx.session_for(&params.chat_id).await?;
        let project = params.project_path.as_str();
        let requested = params.branch.filter(|b| !b.trim().is_empty());

        let branch = match requested.clone() {
            Some(branch) => Some(branch),
            None => session
                .get_project(project)
                .await
                .map_err(|e| gitlab_failure("getting pipeline status", e))?
                .default_branch,
        };

        let no_pipeline = || -> ToolResult {
            Ok(ToolCallResult::json(&json!({
                "error": "NO_PIPELINE",
                "message": format!(
                    "No pipelines found for {project}{}",
                    requested.as_deref().map(|b| format!(":{b}")).unwrap_or_else(|| " (default branch)".to_string())
                ),
                "project_path": project,
                "branch": requested.as_deref().unwrap_or("default"),
            })))
        };

        let Some(branch) = branch else {
            tracing::warn!("No branch given and {project} has no default branch");
            return no_pipeline();
        };

        let pipelines = session
            .list_pipelines(project, Some(&branch), 1)
            .await
            .map_err(|e| gitlab_failure("getting pipeline status", e))?;
        let Some(pipeline) = pipelines.into_iter().next() else {
            tracing::info!("No pipelines found for {project}:{branch}");
            return no_pipeline();
        };

        let stages = match session.list_pipeline_jobs(project, pipeline.id).await {
            Ok(jobs) => summarize_stages(&jobs),
            Err(e) => {
                tracing::warn!("Failed to get jobs for pipeline {}: {e}", pipeline.id);
                Vec::new()
            }
        };

        let status = pipeline.status.clone().unwrap_or_else(|| "unknown".to_string());
        tracing::info!("Pipeline {} status: {status}", pipeline.id);

        Ok(ToolCallResult::json(&json!({
            "project_path": project,
            "branch": pipeline.git_ref.clone().unwrap_or_else(|| branch.clone()),
            "pipeline": {
                "id": pipeline.id,
                "status": status,
                "url": pipeline.web_url,
                "commit_sha": short_sha(&pipeline),
                "created_at": pipeline.created_at,
                "finished_at": pipeline.finished_at,
                "duration_seconds": pipeline.duration,
                "duration_display": pipeline.duration.map(duration_display),
                "stages": stages
                    .iter()
                    .map(|s| json!({ "name": s.name, "status": s.status }))
                    .collect::<Vec<_>>(),
            }
        })))
    }
}
