//! Tool: list_issues

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::gitlab::client::IssueQuery;
use crate::gitlab::models::{display_names, Issue};
use crate::types::{ToolCallResult, ToolDefinition};

use super::{
    default_per_page, gitlab_failure, parse_args, require_non_empty, require_one_of,
    require_range, ToolContext, ToolHandler, ToolResult,
};

const STATES: &[&str] = &["opened", "closed", "all"];

#[derive(Debug, Deserialize)]
struct ListIssuesParams {
    chat_id: String,
    project_path: String,
    #[serde(default = "default_state")]
    state: String,
    #[serde(default)]
    assignee: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    search: Option<String>,
    #[serde(default = "default_per_page")]
    per_page: u32,
}

fn default_state() -> String {
    "opened".to_string()
}

pub(crate) fn issue_json(issue: &Issue, project_path: &str) -> Value {
    json!({
        "id": issue.id,
        "iid": issue.iid,
        "title": issue.title,
        "description": issue.description.clone().filter(|d| !d.is_empty()),
        "state": issue.state.clone().unwrap_or_else(|| "opened".to_string()),
        "author": issue.author_name(),
        "assignees": display_names(&issue.assignees),
        "labels": issue.labels,
        "url": issue.web_url.clone().unwrap_or_default(),
        "created_at": issue.created_at,
        "updated_at": issue.updated_at,
        "closed_at": issue.closed_at,
        "project_path": project_path,
    })
}

pub struct ListIssues;

#[async_trait]
impl ToolHandler for ListIssues {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "list_issues".to_string(),
            description: "List issues of a GitLab project, filtered by state, assignee, labels \
                or a search term."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "chat_id": { "type": "string", "description": "Chat ID of the registered user" },
                    "project_path": { "type": "string", "description": "Project path (e.g. group/project)" },
                    "state": {
                        "type": "string",
                        "enum": STATES,
                        "default": "opened",
                        "description": "Filter by issue state"
                    },
                    "assignee": { "type": "string", "description": "Assignee username" },
                    "labels": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Only issues carrying all of these labels"
                    },
                    "search": { "type": "string", "description": "Search in title and description" },
                    "per_page": {
                        "type": "number",
                        "default": 20,
                        "minimum": 1,
                        "maximum": 100,
                        "description": "Number of results (max 100)"
                    }
                },
                "required": ["chat_id", "project_path"]
            }),
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let params: ListIssuesParams = parse_args(args)?;
        require_non_empty("chat_id", &params.chat_id)?;
        require_non_empty("project_path", &params.project_path)?;
        require_one_of("state", &params.state, STATES)?;
        require_range("per_page", params.per_page.into(), 1, 100)?;

        let (_, session) = ctx.session_for(&params.chat_id).await?;
        let query = IssueQuery {
            project_path: params.project_path.clone(),
            state: params.state.clone(),
            assignee: params.assignee.clone().filter(|a| !a.is_empty()),
            labels: params.labels.clone(),
            search: params.search.clone().filter(|s| !s.is_empty()),
            per_page: params.per_page,
        };
        let issues = session
            .list_issues(&query)
            .await
            .map_err(|e| gitlab_failure("fetching issues", e))?;

        tracing::info!("Found {} issues for {}", issues.len(), params.project_path);

        Ok(ToolCallResult::json(&json!({
            "total": issues.len(),
            "project_path": params.project_path,
            "filters": {
                "state": params.state,
                "assignee": query.assignee,
                "labels": params.labels,
                "search": query.search,
            },
            "issues": issues
                .iter()
                .map(|issue| issue_json(issue, &params.project_path))
                .collect::<Vec<_>>(),
        })))
    }
}
