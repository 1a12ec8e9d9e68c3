//! Tool: list_projects

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::gitlab::client::ProjectQuery;
use crate::types::{ToolCallResult, ToolDefinition};

use super::{
    default_per_page, default_true, gitlab_failure, parse_args, require_non_empty, require_range,
    ToolContext, ToolHandler, ToolResult,
};

#[derive(Debug, Deserialize)]
struct ListProjectsParams {
    chat_id: String,
    #[serde(default)]
    search: Option<String>,
    #[serde(default = "default_true")]
    membership: bool,
    #[serde(default = "default_per_page")]
    per_page: u32,
    #[serde(default)]
    all: bool,
}

pub struct ListProjects;

#[async_trait]
impl ToolHandler for ListProjects {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "list_projects".to_string(),
            description: "List GitLab projects accessible to a registered user. Returns names, \
                URLs, descriptions, visibility and statistics."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "chat_id": {
                        "type": "string",
                        "description": "Chat ID of the registered user. Register first with register_user."
                    },
                    "search": { "type": "string", "description": "Filter projects by name" },
                    "membership": {
                        "type": "boolean",
                        "default": true,
                        "description": "Only return projects the user is a member of"
                    },
                    "per_page": {
                        "type": "number",
                        "default": 20,
                        "minimum": 1,
                        "maximum": 100,
                        "description": "Results per page (max 100)"
                    },
                    "all": {
                        "type": "boolean",
                        "default": false,
                        "description": "Fetch every page instead of the first one (may be slow)"
                    }
                },
                "required": ["chat_id"]
            }),
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let params: ListProjectsParams = parse_args(args)?;
        require_non_empty("chat_id", &params.chat_id)?;
        require_range("per_page", params.per_page.into(), 1, 100)?;

        let (record, session) = ctx.session_for(&params.chat_id).await?;
        let projects = session
            .list_projects(&ProjectQuery {
                search: params.search,
                membership: params.membership,
                per_page: params.per_page,
                all: params.all,
            })
            .await
            .map_err(|e| gitlab_failure("fetching projects", e))?;

        tracing::info!("Found {} projects for {}", projects.len(), params.chat_id);

        let projects: Vec<Value> = projects
            .iter()
            .map(|p| {
                json!({
                    "id": p.id,
                    "name": p.name,
                    "full_path": p.path_with_namespace,
                    "url": p.web_url,
                    "description": p.description.clone().filter(|d| !d.is_empty())
                        .unwrap_or_else(|| "No description".to_string()),
                    "default_branch": p.default_branch,
                    "visibility": p.visibility.clone().unwrap_or_else(|| "private".to_string()),
                    "last_activity": p.last_activity_at,
                    "stars": p.star_count,
                    "forks": p.forks_count,
                })
            })
            .collect();

        Ok(ToolCallResult::json(&json!({
            "total": projects.len(),
            "gitlab_instance": record.gitlab_url,
            "projects": projects,
        })))
    }
}
