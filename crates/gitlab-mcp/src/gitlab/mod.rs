//! Upstream GitLab API access.

pub mod client;
pub mod models;

pub use client::{GitLabClient, GitLabSession};

#[derive(thiserror::Error, Debug)]
pub enum GitLabError {
    #[error("Invalid GitLab URL: {0}")]
    InvalidUrl(String),

    #[error("GitLab API error: {status} {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type GitLabResult<T> = Result<T, GitLabError>;
