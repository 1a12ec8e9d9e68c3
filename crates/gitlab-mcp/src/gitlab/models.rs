//! Subset of the GitLab REST v4 payloads the tools read.
//!
//! Fields are lenient: anything GitLab may omit has a default.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserRef {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl UserRef {
    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| self.name.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

pub fn display_names(users: &[UserRef]) -> Vec<String> {
    users.iter().map(UserRef::display_name).collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub path_with_namespace: String,
    #[serde(default)]
    pub web_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub last_activity_at: Option<String>,
    #[serde(default)]
    pub star_count: u64,
    #[serde(default)]
    pub forks_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct References {
    #[serde(default)]
    pub full: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Milestone {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeRequest {
    pub id: u64,
    pub iid: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub author: Option<UserRef>,
    #[serde(default)]
    pub assignees: Vec<UserRef>,
    #[serde(default)]
    pub reviewers: Vec<UserRef>,
    #[serde(default)]
    pub source_branch: String,
    #[serde(default)]
    pub target_branch: String,
    #[serde(default)]
    pub web_url: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub merged_at: Option<String>,
    #[serde(default)]
    pub references: Option<References>,
    #[serde(default)]
    pub source_project_id: Option<u64>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub milestone: Option<Milestone>,
    #[serde(default)]
    pub user_notes_count: u64,
    #[serde(default)]
    pub has_conflicts: bool,
    #[serde(default)]
    pub merge_status: Option<String>,
    #[serde(default)]
    pub detailed_merge_status: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub work_in_progress: bool,
}

impl MergeRequest {
    pub fn author_name(&self) -> String {
        self.author
            .as_ref()
            .map(UserRef::display_name)
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// `group/project!iid` when GitLab sent references, else the project id.
    pub fn project_reference(&self) -> String {
        self.references
            .as_ref()
            .and_then(|r| r.full.clone())
            .or_else(|| self.source_project_id.map(|id| id.to_string()))
            .unwrap_or_default()
    }

    pub fn is_mergeable(&self) -> bool {
        match self.detailed_merge_status.as_deref() {
            Some(status) => status == "mergeable",
            None => self.merge_status.as_deref() == Some("can_be_merged"),
        }
    }

    pub fn is_draft(&self) -> bool {
        self.draft || self.work_in_progress
    }
}

/// One file of a merge request diff. Also accepted as tool input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub old_path: String,
    pub new_path: String,
    pub diff: String,
    #[serde(default)]
    pub new_file: bool,
    #[serde(default)]
    pub renamed_file: bool,
    #[serde(default)]
    pub deleted_file: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MergeRequestChanges {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApprovedBy {
    #[serde(default)]
    pub user: Option<UserRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Approvals {
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub approved_by: Vec<ApprovedBy>,
    #[serde(default)]
    pub approvals_required: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pipeline {
    pub id: u64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub id: u64,
    pub iid: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub author: Option<UserRef>,
    #[serde(default)]
    pub assignees: Vec<UserRef>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub closed_at: Option<String>,
}

impl Issue {
    pub fn author_name(&self) -> String {
        self.author
            .as_ref()
            .map(UserRef::display_name)
            .unwrap_or_else(|| "unknown".to_string())
    }
}
