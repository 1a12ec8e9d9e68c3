//! Tool: get_mr_details

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::gitlab::models::{display_names, Approvals};
use crate::types::{ToolCallResult, ToolDefinition};

use super::diff::change_stats;
use super::{
    gitlab_failure, parse_args, require_non_empty, require_range, ToolContext, ToolHandler,
    ToolResult,
};

#[derive(Debug, Deserialize)]
struct MrDetailsParams {
    chat_id: String,
    project_path: String,
    mr_iid: u64,
    #[serde(default)]
    include_changes: bool,
}

pub struct GetMrDetails;

fn approvals_json(approvals: Option<Approvals>) -> Value {
    let Some(approvals) = approvals else {
        return json!({
            "approved": false,
            "approved_by": [],
            "approvals_required": 0,
            "approvals_left": 0,
            "display": "Approval information unavailable",
        });
    };

    let approved_by: Vec<String> = approvals
        .approved_by
        .iter()
        .map(|a| {
            a.user
                .as_ref()
                .map(|u| u.display_name())
                .unwrap_or_else(|| "unknown".to_string())
        })
        .collect();
    let approvals_left = approvals
        .approvals_required
        .saturating_sub(approved_by.len() as u64);
    let display = if approvals.approved {
        format!("Approved by {}", approved_by.join(", "))
    } else {
        format!(
            "{approvals_left} of {} approvals needed",
            approvals.approvals_required
        )
    };

    json!({
        "approved": approvals.approved,
        "approved_by": approved_by,
        "approvals_required": approvals.approvals_required,
        "approvals_left": approvals_left,
        "display": display,
    })
}

#[async_trait]
impl ToolHandler for GetMrDetails {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_mr_details".to_string(),
            description: "Get detailed information about a merge request: diff stats, approval \
                status, discussions, conflicts and more. Set include_changes=true to also \
                return the diff payload (can be large)."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "chat_id": { "type": "string", "description": "Chat ID of the registered user" },
                    "project_path": { "type": "string", "description": "Project path (e.g. group/project)" },
                    "mr_iid": {
                        "type": "number",
                        "description": "Merge request IID (the number shown in the MR URL)"
                    },
                    "include_changes": {
                        "type": "boolean",
                        "default": false,
                        "description": "Include the MR changes (diffs) in the response"
                    }
                },
                "required": ["chat_id", "project_path", "mr_iid"]
            }),
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let params: MrDetailsParams = parse_args(args)?;
        require_non_empty("chat_id", &params.chat_id)?;
        require_non_empty("project_path", &params.project_path)?;
        require_range("mr_iid", params.mr_iid, 1, u64::MAX)?;

        let (_, session) = ctx.session_for(&params.chat_id).await?;
        let project = params.project_path.as_str();

        let mr = session
            .get_merge_request(project, params.mr_iid)
            .await
            .map_err(|e| gitlab_failure("getting MR details", e))?;

        // Diff stats and approvals are best-effort.
        let changes = match session.get_merge_request_changes(project, params.mr_iid).await {
            Ok(changes) => Some(changes.changes),
            Err(e) => {
                tracing::warn!("Failed to get diff stats for {project}!{}: {e}", params.mr_iid);
                None
            }
        };
        let approvals = match session
            .get_merge_request_approvals(project, params.mr_iid)
            .await
        {
            Ok(approvals) => Some(approvals),
            Err(e) => {
                tracing::warn!("Failed to get approvals for {project}!{}: {e}", params.mr_iid);
                None
            }
        };

        tracing::info!("Retrieved MR details for {project}!{}", params.mr_iid);

        let diff_stats = changes.as_deref().map(|changes| {
            let stats = change_stats(changes);
            json!({
                "additions": stats.additions,
                "deletions": stats.deletions,
                "total": stats.additions + stats.deletions,
                "files_changed": stats.files,
                "display": format!("+{} -{} ({} files)", stats.additions, stats.deletions, stats.files),
            })
        });

        let mut response = json!({
            "project_path": params.project_path,
            "merge_request": {
                "id": mr.id,
                "iid": mr.iid,
                "title": mr.title,
                "description": mr.description.clone().filter(|d| !d.is_empty())
                    .unwrap_or_else(|| "No description".to_string()),
                "state": mr.state,
                "author": mr.author_name(),
                "assignees": display_names(&mr.assignees),
                "reviewers": display_names(&mr.reviewers),
                "source_branch": mr.source_branch,
                "target_branch": mr.target_branch,
                "url": mr.web_url,
                "created_at": mr.created_at,
                "updated_at": mr.updated_at,
                "merged_at": mr.merged_at,
                "labels": mr.labels,
                "milestone": mr.milestone.as_ref().and_then(|m| m.title.clone()),
                "work_in_progress": mr.is_draft(),
            },
            "diff_stats": diff_stats,
            "approvals": approvals_json(approvals),
            "discussions": mr.user_notes_count,
            "comments": mr.user_notes_count,
            "conflicts": mr.has_conflicts,
            "mergeable": mr.is_mergeable(),
        });
        if params.include_changes {
            response["changes"] = json!(changes.unwrap_or_default());
        }

        Ok(ToolCallResult::json(&response))
    }
}
