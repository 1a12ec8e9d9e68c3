//! Thin async client for the GitLab REST v4 API.

use std::time::Duration;

use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use super::models::*;
use super::{GitLabError, GitLabResult};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_PER_PAGE: u32 = 100;
/// Upper bound for `all=true` project listing.
const MAX_PAGES: u32 = 50;
const MAX_ERROR_BODY: usize = 500;

/// Shared HTTP client. One per process; sessions borrow its pool.
#[derive(Clone)]
pub struct GitLabClient {
    http: reqwest::Client,
}

impl GitLabClient {
    pub fn new() -> GitLabResult<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> GitLabResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("gitlab-mcp/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    /// Bind the client to one instance URL and access token.
    pub fn session(&self, gitlab_url: &str, access_token: &str) -> GitLabResult<GitLabSession> {
        Ok(GitLabSession {
            http: self.http.clone(),
            base: parse_base_url(gitlab_url)?,
            token: access_token.to_string(),
        })
    }
}

/// Accepts `http(s)://host[/prefix]`; anything else is rejected.
pub fn parse_base_url(raw: &str) -> GitLabResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| GitLabError::InvalidUrl(format!("{raw}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() || url.host().is_none()
    {
        return Err(GitLabError::InvalidUrl(format!(
            "{raw}: expected an http(s) URL"
        )));
    }
    Ok(url)
}

#[derive(Debug, Clone)]
pub struct ProjectQuery {
    pub search: Option<String>,
    pub membership: bool,
    pub per_page: u32,
    pub all: bool,
}

#[derive(Debug, Clone)]
pub struct MergeRequestQuery {
    pub project_path: Option<String>,
    /// `None` lists every state.
    pub state: Option<String>,
    /// Only sent for instance-wide listing.
    pub scope: String,
    pub per_page: u32,
}

#[derive(Debug, Clone)]
pub struct IssueQuery {
    pub project_path: String,
    pub state: String,
    pub assignee: Option<String>,
    pub labels: Vec<String>,
    pub search: Option<String>,
    pub per_page: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewIssue {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Comma-separated, as GitLab expects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<String>,
}

/// Client bound to one GitLab instance and token.
pub struct GitLabSession {
    http: reqwest::Client,
    base: Url,
    token: String,
}

impl std::fmt::Debug for GitLabSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabSession")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl GitLabSession {
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub async fn current_user(&self) -> GitLabResult<UserRef> {
        self.get(&["user"], &[]).await
    }

    /// `GET /user` succeeding is the credential check.
    pub async fn validate(&self) -> bool {
        match self.current_user().await {
            Ok(user) => {
                tracing::info!("Credentials valid for {} as {}", self.base, user.display_name());
                true
            }
            Err(e) => {
                tracing::warn!("Invalid credentials for {}: {e}", self.base);
                false
            }
        }
    }

    pub async fn list_projects(&self, query: &ProjectQuery) -> GitLabResult<Vec<Project>> {
        let mut params = vec![
            ("membership", query.membership.to_string()),
            ("simple", "false".to_string()),
        ];
        if let Some(search) = query.search.as_ref().filter(|s| !s.is_empty()) {
            params.push(("search", search.clone()));
        }

        if !query.all {
            params.push(("per_page", query.per_page.min(MAX_PER_PAGE).to_string()));
            params.push(("page", "1".to_string()));
            return self.get(&["projects"], &params).await;
        }

        let mut projects = Vec::new();
        params.push(("per_page", MAX_PER_PAGE.to_string()));
        for page in 1..=MAX_PAGES {
            let mut page_params = params.clone();
            page_params.push(("page", page.to_string()));
            let batch: Vec<Project> = self.get(&["projects"], &page_params).await?;
            let last = batch.len() < MAX_PER_PAGE as usize;
            projects.extend(batch);
            if last {
                break;
            }
        }
        Ok(projects)
    }

    pub async fn get_project(&self, project_path: &str) -> GitLabResult<Project> {
        self.get(&["projects", project_path], &[]).await
    }

    pub async fn list_merge_requests(
        &self,
        query: &MergeRequestQuery,
    ) -> GitLabResult<Vec<MergeRequest>> {
        let mut params = vec![
            ("per_page", query.per_page.min(MAX_PER_PAGE).to_string()),
            ("page", "1".to_string()),
        ];
        if let Some(state) = &query.state {
            params.push(("state", state.clone()));
        }

        match &query.project_path {
            Some(project) => {
                self.get(&["projects", project.as_str(), "merge_requests"], &params)
                    .await
            }
            None => {
                params.push(("scope", query.scope.clone()));
                self.get(&["merge_requests"], &params).await
            }
        }
    }

    pub async fn get_merge_request(
        &self,
        project_path: &str,
        mr_iid: u64,
    ) -> GitLabResult<MergeRequest> {
        let iid = mr_iid.to_string();
        self.get(&["projects", project_path, "merge_requests", iid.as_str()], &[])
            .await
    }

    pub async fn get_merge_request_changes(
        &self,
        project_path: &str,
        mr_iid: u64,
    ) -> GitLabResult<MergeRequestChanges> {
        let iid = mr_iid.to_string();
        self.get(
            &["projects", project_path, "merge_requests", iid.as_str(), "changes"],
            &[],
        )
        .await
    }

    pub async fn get_merge_request_approvals(
        &self,
        project_path: &str,
        mr_iid: u64,
    ) -> GitLabResult<Approvals> {
        let iid = mr_iid.to_string();
        self.get(
            &["projects", project_path, "merge_requests", iid.as_str(), "approvals"],
            &[],
        )
        .await
    }

    /// Most recent pipelines first.
    pub async fn list_pipelines(
        &self,
        project_path: &str,
        git_ref: Option<&str>,
        per_page: u32,
    ) -> GitLabResult<Vec<Pipeline>> {
        let mut params = vec![
            ("per_page", per_page.min(MAX_PER_PAGE).to_string()),
            ("page", "1".to_string()),
        ];
        if let Some(git_ref) = git_ref {
            params.push(("ref", git_ref.to_string()));
        }
        self.get(&["projects", project_path, "pipelines"], &params)
            .await
    }

    pub async fn list_pipeline_jobs(
        &self,
        project_path: &str,
        pipeline_id: u64,
    ) -> GitLabResult<Vec<Job>> {
        let id = pipeline_id.to_string();
        self.get(
            &["projects", project_path, "pipelines", id.as_str(), "jobs"],
            &[("per_page", MAX_PER_PAGE.to_string())],
        )
        .await
    }

    pub async fn retry_pipeline(&self, project_path: &str, pipeline_id: u64) -> GitLabResult<Pipeline> {
        let id = pipeline_id.to_string();
        self.post(
            &["projects", project_path, "pipelines", id.as_str(), "retry"],
            &json!({}),
        )
        .await
    }

    pub async fn list_issues(&self, query: &IssueQuery) -> GitLabResult<Vec<Issue>> {
        let mut params = vec![
            ("state", query.state.clone()),
            ("per_page", query.per_page.min(MAX_PER_PAGE).to_string()),
            ("page", "1".to_string()),
        ];
        if let Some(assignee) = &query.assignee {
            params.push(("assignee_username", assignee.clone()));
        }
        if !query.labels.is_empty() {
            params.push(("labels", query.labels.join(",")));
        }
        if let Some(search) = &query.search {
            params.push(("search", search.clone()));
        }
        self.get(&["projects", query.project_path.as_str(), "issues"], &params)
            .await
    }

    pub async fn create_issue(&self, project_path: &str, issue: &NewIssue) -> GitLabResult<Issue> {
        self.post(&["projects", project_path, "issues"], issue).await
    }

    pub async fn find_user(&self, username: &str) -> GitLabResult<Option<UserRef>> {
        let users: Vec<UserRef> = self
            .get(&["users"], &[("username", username.to_string())])
            .await?;
        Ok(users.into_iter().next())
    }

    pub async fn assign_issue(
        &self,
        project_path: &str,
        issue_iid: u64,
        user_id: u64,
    ) -> GitLabResult<Issue> {
        let iid = issue_iid.to_string();
        self.put(
            &["projects", project_path, "issues", iid.as_str()],
            &json!({ "assignee_ids": [user_id] }),
        )
        .await
    }

    fn endpoint(&self, segments: &[&str]) -> GitLabResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| GitLabError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(["api", "v4"])
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> GitLabResult<T> {
        let url = self.endpoint(segments)?;
        tracing::debug!("GET {}", url.path());
        self.send(self.http.get(url).query(query)).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &impl Serialize,
    ) -> GitLabResult<T> {
        let url = self.endpoint(segments)?;
        tracing::debug!("POST {}", url.path());
        self.send(self.http.post(url).json(body)).await
    }

    async fn put<T: DeserializeOwned>(&self, segments: &[&str], body: &Value) -> GitLabResult<T> {
        let url = self.endpoint(segments)?;
        tracing::debug!("PUT {}", url.path());
        self.send(self.http.put(url).json(body)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> GitLabResult<T> {
        let resp = request
            .header("PRIVATE-TOKEN", self.token.as_str())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(GitLabError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.json().await?)
    }
}
