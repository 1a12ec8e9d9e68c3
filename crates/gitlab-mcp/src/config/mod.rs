//! Configuration loading and resolution.
//!
//! Every setting resolves as CLI flag > environment variable > default.
//! The `*_from` helpers take the raw values so they can be tested without
//! touching the process environment.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use gitlab_vault::{MasterKey, VaultError};

use crate::tools::ToolProfile;

pub const ENCRYPTION_KEY_VAR: &str = "ENCRYPTION_KEY";
pub const API_KEY_VAR: &str = "API_KEY";
pub const TOKEN_VAR: &str = "MCP_TOKEN";
pub const VAULT_PATH_VAR: &str = "GITLAB_MCP_VAULT";
pub const PROFILE_VAR: &str = "TOOL_PROFILE";
pub const PORT_VAR: &str = "PORT";

pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";
pub const MIN_API_KEY_LEN: usize = 16;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{ENCRYPTION_KEY_VAR} is not set")]
    MissingEncryptionKey,

    #[error("{ENCRYPTION_KEY_VAR} is invalid: {0}")]
    EncryptionKey(#[from] VaultError),

    #[error("{API_KEY_VAR} must be at least {MIN_API_KEY_LEN} characters, got {0}")]
    WeakApiKey(usize),

    #[error("Invalid listen address \"{0}\"")]
    InvalidAddr(String),

    #[error("Invalid {PORT_VAR} \"{0}\"")]
    InvalidPort(String),

    #[error("Invalid {PROFILE_VAR}: {0}")]
    InvalidProfile(String),
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve the vault file path.
pub fn resolve_vault_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Some(env_path) = env_var(VAULT_PATH_VAR) {
        return PathBuf::from(env_path);
    }

    let cwd_vault = PathBuf::from(".gitlab-mcp/vault.json");
    if cwd_vault.exists() {
        return cwd_vault;
    }

    resolve_default_vault_path()
}

fn resolve_default_vault_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());

    PathBuf::from(home).join(".gitlab-mcp").join("vault.json")
}

pub fn master_key() -> Result<MasterKey, ConfigError> {
    master_key_from(env_var(ENCRYPTION_KEY_VAR))
}

pub fn master_key_from(value: Option<String>) -> Result<MasterKey, ConfigError> {
    let value = value.ok_or(ConfigError::MissingEncryptionKey)?;
    Ok(MasterKey::new(value)?)
}

/// Admin API key; `None` disables the admin API.
pub fn api_key(explicit: Option<String>) -> Result<Option<String>, ConfigError> {
    api_key_from(explicit.or_else(|| env_var(API_KEY_VAR)))
}

pub fn api_key_from(value: Option<String>) -> Result<Option<String>, ConfigError> {
    match value {
        Some(key) if key.chars().count() < MIN_API_KEY_LEN => {
            Err(ConfigError::WeakApiKey(key.chars().count()))
        }
        other => Ok(other),
    }
}

pub fn bearer_token(explicit: Option<String>) -> Option<String> {
    explicit.or_else(|| env_var(TOKEN_VAR))
}

/// Compare a configured secret with a caller-supplied one in constant time.
pub fn secrets_match(expected: &str, provided: &str) -> bool {
    let (a, b) = (expected.as_bytes(), provided.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn profile(explicit: Option<ToolProfile>) -> Result<ToolProfile, ConfigError> {
    profile_from(explicit, env_var(PROFILE_VAR))
}

pub fn profile_from(
    explicit: Option<ToolProfile>,
    env_value: Option<String>,
) -> Result<ToolProfile, ConfigError> {
    if let Some(profile) = explicit {
        return Ok(profile);
    }
    match env_value {
        Some(value) => value.parse().map_err(ConfigError::InvalidProfile),
        None => Ok(ToolProfile::default()),
    }
}

pub fn listen_addr(explicit: Option<&str>) -> Result<SocketAddr, ConfigError> {
    listen_addr_from(explicit, env_var(PORT_VAR))
}

/// `--addr` wins; a bare `PORT` binds all interfaces.
pub fn listen_addr_from(
    explicit: Option<&str>,
    port: Option<String>,
) -> Result<SocketAddr, ConfigError> {
    if let Some(addr) = explicit {
        return addr
            .parse()
            .map_err(|_| ConfigError::InvalidAddr(addr.to_string()));
    }
    if let Some(port) = port {
        let number: u16 = port
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
        return Ok(SocketAddr::from(([0, 0, 0, 0], number)));
    }
    DEFAULT_ADDR
        .parse()
        .map_err(|_| ConfigError::InvalidAddr(DEFAULT_ADDR.to_string()))
}
