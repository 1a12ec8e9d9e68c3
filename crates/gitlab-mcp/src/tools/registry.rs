//! Tool registration and dispatch.

use std::sync::Arc;

use serde_json::Value;

use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

use super::{
    create_issue, get_mr_details, get_pipeline_status, get_user_info, list_issues,
    list_merge_requests, list_projects, register_user, retry_pipeline, review_patch,
    suggest_tests, unregister_user, update_user_credentials, ToolContext, ToolError,
    ToolHandler,
};

/// Which catalogue the server exposes. Chosen once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ToolProfile {
    /// Credential management plus GitLab project tooling.
    #[default]
    Management,
    /// Read-only MR access and patch review.
    Review,
    /// Management followed by the review tools.
    All,
}

impl ToolProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolProfile::Management => "management",
            ToolProfile::Review => "review",
            ToolProfile::All => "all",
        }
    }
}

impl std::fmt::Display for ToolProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ToolProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "management" => Ok(ToolProfile::Management),
            "review" => Ok(ToolProfile::Review),
            "all" => Ok(ToolProfile::All),
            other => Err(format!(
                "unknown tool profile \"{other}\" (expected management, review or all)"
            )),
        }
    }
}

fn management_tools() -> Vec<Arc<dyn ToolHandler>> {
    vec![
        Arc::new(register_user::RegisterUser),
        Arc::new(update_user_credentials::UpdateUserCredentials),
        Arc::new(get_user_info::GetUserInfo),
        Arc::new(unregister_user::UnregisterUser),
        Arc::new(list_projects::ListProjects),
        Arc::new(list_merge_requests::ListMergeRequests),
        Arc::new(get_mr_details::GetMrDetails),
        Arc::new(get_pipeline_status::GetPipelineStatus),
        Arc::new(retry_pipeline::RetryPipeline),
        Arc::new(list_issues::ListIssues),
        Arc::new(create_issue::CreateIssue),
    ]
}

fn review_tools() -> Vec<Arc<dyn ToolHandler>> {
    vec![
        Arc::new(get_user_info::GetUserInfo),
        Arc::new(list_merge_requests::ListMergeRequests),
        Arc::new(get_mr_details::GetMrDetails),
        Arc::new(review_patch::ReviewPatch),
        Arc::new(suggest_tests::SuggestTests),
    ]
}

struct RegisteredTool {
    definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
}

/// Immutable, order-preserving tool catalogue.
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn build(profile: ToolProfile) -> Self {
        let handlers = match profile {
            ToolProfile::Management => management_tools(),
            ToolProfile::Review => review_tools(),
            ToolProfile::All => {
                let mut tools = management_tools();
                tools.push(Arc::new(review_patch::ReviewPatch));
                tools.push(Arc::new(suggest_tests::SuggestTests));
                tools
            }
        };
        let registry = Self::with_handlers(handlers);
        tracing::info!(
            "Tool registry built for profile {profile}: {} tools",
            registry.len()
        );
        registry
    }

    /// Registry over an explicit handler list. Later duplicates are ignored.
    pub fn with_handlers(handlers: Vec<Arc<dyn ToolHandler>>) -> Self {
        let mut tools: Vec<RegisteredTool> = Vec::with_capacity(handlers.len());
        for handler in handlers {
            let definition = handler.definition();
            if tools.iter().any(|t| t.definition.name == definition.name) {
                tracing::warn!("Duplicate tool {} ignored", definition.name);
                continue;
            }
            tools.push(RegisteredTool {
                definition,
                handler,
            });
        }
        Self { tools }
    }

    pub fn lookup(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.tools
            .iter()
            .find(|t| t.definition.name == name)
            .map(|t| &t.handler)
    }

    /// Definitions in registration order; handlers are never exposed.
    pub fn enumerate(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition.clone()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools
            .iter()
            .map(|t| t.definition.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool. Domain failures become `isError` results.
    pub async fn call(
        &self,
        name: &str,
        arguments: Value,
        ctx: &ToolContext,
    ) -> McpResult<ToolCallResult> {
        let handler = self
            .lookup(name)
            .ok_or_else(|| McpError::ToolNotFound(name.to_string()))?;

        match handler.call(arguments, ctx).await {
            Ok(result) => Ok(result),
            Err(ToolError::Failure { tag, message }) => {
                tracing::warn!("Tool {name} failed: {tag}: {message}");
                Ok(ToolCallResult::failure(tag, message))
            }
            Err(ToolError::Dispatch(e)) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_select_expected_catalogue() {
        let management = ToolRegistry::build(ToolProfile::Management);
        assert_eq!(management.len(), 11);
        assert_eq!(management.names()[0], "register_user");
        assert!(management.lookup("review_patch").is_none());

        let review = ToolRegistry::build(ToolProfile::Review);
        assert_eq!(
            review.names(),
            vec![
                "get_user_info",
                "list_merge_requests",
                "get_mr_details",
                "review_patch",
                "suggest_tests"
            ]
        );

        let all = ToolRegistry::build(ToolProfile::All);
        assert_eq!(all.len(), 13);
        assert_eq!(&all.names()[11..], &["review_patch", "suggest_tests"]);
    }

    #[test]
    fn test_definitions_have_object_schemas() {
        for def in ToolRegistry::build(ToolProfile::All).enumerate() {
            assert!(!def.description.is_empty(), "{} lacks a description", def.name);
            assert_eq!(def.input_schema["type"], "object", "{}", def.name);
        }
    }

    #[test]
    fn test_profile_parsing() {
        assert_eq!("Review".parse::<ToolProfile>().unwrap(), ToolProfile::Review);
        assert!("everything".parse::<ToolProfile>().is_err());
    }
}
