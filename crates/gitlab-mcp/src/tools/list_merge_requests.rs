//! Tool: list_merge_requests

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::gitlab::client::MergeRequestQuery;
use crate::gitlab::models::display_names;
use crate::types::{ToolCallResult, ToolDefinition};

use super::{
    default_per_page, gitlab_failure, parse_args, require_non_empty, require_one_of,
    require_range, ToolContext, ToolHandler, ToolResult,
};

const STATES: &[&str] = &["opened", "merged", "closed", "all"];
const SCOPES: &[&str] = &["created_by_me", "assigned_to_me", "all"];

#[derive(Debug, Deserialize)]
struct ListMergeRequestsParams {
    chat_id: String,
    #[serde(default)]
    project_path: Option<String>,
    #[serde(default = "default_state")]
    state: String,
    #[serde(default = "default_scope")]
    scope: String,
    #[serde(default = "default_per_page")]
    per_page: u32,
}

fn default_state() -> String {
    "opened".to_string()
}

fn default_scope() -> String {
    "created_by_me".to_string()
}

/// Scope actually sent to GitLab, plus a warning when it differs.
///
/// `all` without a project would list every public MR on the instance,
/// so it is narrowed to `created_by_me`.
pub fn effective_scope(scope: &str, project_path: Option<&str>) -> (String, Option<String>) {
    if scope == "all" && project_path.is_none() {
        return (
            "created_by_me".to_string(),
            Some(
                "scope \"all\" requires project_path; showing merge requests created by you instead"
                    .to_string(),
            ),
        );
    }
    (scope.to_string(), None)
}

pub struct ListMergeRequests;

#[async_trait]
impl ToolHandler for ListMergeRequests {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "list_merge_requests".to_string(),
            description: "List GitLab merge requests: those created by the user, assigned to \
                the user for review, or all MRs of one project."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "chat_id": { "type": "string", "description": "Chat ID of the registered user" },
                    "project_path": {
                        "type": "string",
                        "description": "Project path (e.g. group/project). Omit to list the user's MRs across projects"
                    },
                    "state": {
                        "type": "string",
                        "enum": STATES,
                        "default": "opened",
                        "description": "Filter by MR state"
                    },
                    "scope": {
                        "type": "string",
                        "enum": SCOPES,
                        "default": "created_by_me",
                        "description": "created_by_me, assigned_to_me, or all. \"all\" only applies when project_path is given"
                    },
                    "per_page": {
                        "type": "number",
                        "default": 20,
                        "minimum": 1,
                        "maximum": 100,
                        "description": "Number of results (max 100)"
                    }
                },
                "required": ["chat_id"]
            }),
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let params: ListMergeRequestsParams = parse_args(args)?;
        require_non_empty("chat_id", &params.chat_id)?;
        require_one_of("state", &params.state, STATES)?;
        require_one_of("scope", &params.scope, SCOPES)?;
        require_range("per_page", params.per_page.into(), 1, 100)?;

        let project_path = params.project_path.filter(|p| !p.trim().is_empty());
        let (scope, warning) = effective_scope(&params.scope, project_path.as_deref());
        if let Some(warning) = &warning {
            tracing::debug!("{warning}");
        }

        let (record, session) = ctx.session_for(&params.chat_id).await?;
        let merge_requests = session
            .list_merge_requests(&MergeRequestQuery {
                project_path: project_path.clone(),
                state: (params.state != "all").then(|| params.state.clone()),
                scope: scope.clone(),
                per_page: params.per_page,
            })
            .await
            .map_err(|e| gitlab_failure("fetching merge requests", e))?;

        tracing::info!("Found {} merge requests", merge_requests.len());

        let items: Vec<Value> = merge_requests
            .iter()
            .map(|mr| {
                json!({
                    "id": mr.id,
                    "iid": mr.iid,
                    "title": mr.title,
                    "state": mr.state,
                    "author": mr.author_name(),
                    "assignees": display_names(&mr.assignees),
                    "reviewers": display_names(&mr.reviewers),
                    "source_branch": mr.source_branch,
                    "target_branch": mr.target_branch,
                    "url": mr.web_url,
                    "created_at": mr.created_at,
                    "project": mr.project_reference(),
                })
            })
            .collect();

        let mut response = json!({
            "total": items.len(),
            "gitlab_url": record.gitlab_url,
            "filters": {
                "project_path": project_path.as_deref().unwrap_or("all projects"),
                "state": params.state,
                "scope": scope,
            },
            "merge_requests": items,
        });
        if let Some(warning) = warning {
            response["warnings"] = json!([warning]);
        }

        Ok(ToolCallResult::json(&response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_all_without_project_is_narrowed() {
        let (scope, warning) = effective_scope("all", None);
        assert_eq!(scope, "created_by_me");
        assert!(warning.unwrap().contains("project_path"));
    }

    #[test]
    fn test_scope_all_with_project_is_kept() {
        let (scope, warning) = effective_scope("all", Some("group/app"));
        assert_eq!(scope, "all");
        assert!(warning.is_none());

        let (scope, warning) = effective_scope("assigned_to_me", None);
        assert_eq!(scope, "assigned_to_me");
        assert!(warning.is_none());
    }
}
