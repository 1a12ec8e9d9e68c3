//! Shared dependencies handed to every tool invocation.

use gitlab_vault::{CredentialVault, PrivateRecord};

use crate::gitlab::{GitLabClient, GitLabSession};

use super::{tags, ToolError};

#[derive(Clone)]
pub struct ToolContext {
    vault: CredentialVault,
    gitlab: GitLabClient,
}

impl ToolContext {
    pub fn new(vault: CredentialVault, gitlab: GitLabClient) -> Self {
        Self { vault, gitlab }
    }

    pub fn vault(&self) -> &CredentialVault {
        &self.vault
    }

    pub fn gitlab(&self) -> &GitLabClient {
        &self.gitlab
    }

    /// Decrypted credentials for `chat_id`, or `USER_NOT_REGISTERED`.
    pub async fn credentials(&self, chat_id: &str) -> Result<PrivateRecord, ToolError> {
        match self.vault.get_with_secret(chat_id).await? {
            Some(record) => Ok(record),
            None => {
                tracing::warn!("User {chat_id} not registered");
                Err(ToolError::failure(
                    tags::USER_NOT_REGISTERED,
                    format!(
                        "User with chat_id {chat_id} is not registered. \
                         Please register first using register_user tool."
                    ),
                ))
            }
        }
    }

    /// GitLab session authenticated as the user registered under `chat_id`.
    pub async fn session_for(&self, chat_id: &str) -> Result<(PrivateRecord, GitLabSession), ToolError> {
        let record = self.credentials(chat_id).await?;
        let session = self.gitlab.session(&record.gitlab_url, &record.access_token)?;
        Ok((record, session))
    }
}
