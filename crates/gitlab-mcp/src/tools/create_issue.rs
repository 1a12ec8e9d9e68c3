//! Tool: create_issue

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::gitlab::client::NewIssue;
use crate::gitlab::models::Issue;
use crate::gitlab::GitLabSession;
use crate::types::{ToolCallResult, ToolDefinition};

use super::list_issues::issue_json;
use super::{gitlab_failure, parse_args, require_non_empty, ToolContext, ToolHandler, ToolResult};

#[derive(Debug, Deserialize)]
struct CreateIssueParams {
    chat_id: String,
    project_path: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    assignee: Option<String>,
}

pub struct CreateIssue;

/// Assign after creation. Returns the updated issue or a warning.
async fn try_assign(
    session: &GitLabSession,
    project: &str,
    iid: u64,
    username: &str,
) -> Result<Issue, String> {
    let user = match session.find_user(username).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(format!("User {username} not found; issue left unassigned")),
        Err(e) => {
            tracing::warn!("Failed to look up {username}: {e}");
            return Err(format!("Could not assign issue to {username}"));
        }
    };
    session.assign_issue(project, iid, user.id).await.map_err(|e| {
        tracing::warn!("Failed to assign issue #{iid} to {username}: {e}");
        format!("Could not assign issue to {username}")
    })
}

#[async_trait]
impl ToolHandler for CreateIssue {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "create_issue".to_string(),
            description: "Create a new issue in a GitLab project, optionally with labels and an \
                assignee."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "chat_id": { "type": "string", "description": "Chat ID of the registered user" },
                    "project_path": { "type": "string", "description": "Project path (e.g. group/project)" },
                    "title": { "type": "string", "description": "Issue title" },
                    "description": { "type": "string", "description": "Issue description (Markdown)" },
                    "labels": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Labels to apply"
                    },
                    "assignee": { "type": "string", "description": "Username to assign the issue to" }
                },
                "required": ["chat_id", "project_path", "title"]
            }),
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let params: CreateIssueParams = parse_args(args)?;
        require_non_empty("chat_id", &params.chat_id)?;
        require_non_empty("project_path", &params.project_path)?;
        require_non_empty("title", &params.title)?;

        let (_, session) = ctx.session_for(&params.chat_id).await?;
        let project = params.project_path.as_str();

        let new_issue = NewIssue {
            title: params.title.clone(),
            description: params.description.clone().filter(|d| !d.is_empty()),
            labels: (!params.labels.is_empty()).then(|| params.labels.join(",")),
        };
        let mut issue = session
            .create_issue(project, &new_issue)
            .await
            .map_err(|e| gitlab_failure("creating issue", e))?;

        let mut warnings = Vec::new();
        if let Some(username) = params.assignee.as_deref().filter(|a| !a.is_empty()) {
            match try_assign(&session, project, issue.iid, username).await {
                Ok(updated) => issue = updated,
                Err(warning) => warnings.push(warning),
            }
        }

        tracing::info!("Created issue #{} in {project}", issue.iid);

        let mut response = json!({
            "success": true,
            "message": format!("Issue #{} created", issue.iid),
            "issue": issue_json(&issue, project),
        });
        if !warnings.is_empty() {
            response["warnings"] = json!(warnings);
        }
        Ok(ToolCallResult::json(&response))
    }
}
