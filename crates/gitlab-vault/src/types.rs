//! Core data types for stored credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Minimum accepted length of the process-wide master key.
pub const MIN_MASTER_KEY_LEN: usize = 32;

/// A credential record as persisted by a [`RecordStore`](crate::RecordStore).
///
/// The access token only ever exists here in encrypted form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub caller_key: String,
    pub gitlab_url: String,
    pub encrypted_token: String,
    #[serde(default)]
    pub watched: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Record view that is safe to hand to any caller. Carries no token field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicRecord {
    pub caller_key: String,
    pub gitlab_url: String,
    pub watched: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Record view with the decrypted access token.
///
/// Only for internal tool execution paths; intentionally not `Serialize`.
#[derive(Clone)]
pub struct PrivateRecord {
    pub caller_key: String,
    pub gitlab_url: String,
    pub access_token: String,
    pub watched: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for PrivateRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateRecord")
            .field("caller_key", &self.caller_key)
            .field("gitlab_url", &self.gitlab_url)
            .field("access_token", &"***")
            .field("watched", &self.watched)
            .finish()
    }
}

impl From<&CredentialRecord> for PublicRecord {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            caller_key: record.caller_key.clone(),
            gitlab_url: record.gitlab_url.clone(),
            watched: record.watched.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl PrivateRecord {
    pub(crate) fn from_record(record: CredentialRecord, access_token: String) -> Self {
        Self {
            caller_key: record.caller_key,
            gitlab_url: record.gitlab_url,
            access_token,
            watched: record.watched,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    /// Drop the secret and keep the public part.
    pub fn to_public(&self) -> PublicRecord {
        PublicRecord {
            caller_key: self.caller_key.clone(),
            gitlab_url: self.gitlab_url.clone(),
            watched: self.watched.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Process-wide master key. Zeroized on drop.
#[derive(Clone)]
pub struct MasterKey(Zeroizing<String>);

impl MasterKey {
    pub fn new(key: impl Into<String>) -> VaultResult<Self> {
        let key = Zeroizing::new(key.into());
        let len = key.chars().count();
        if len < MIN_MASTER_KEY_LEN {
            return Err(VaultError::WeakMasterKey {
                len,
                min: MIN_MASTER_KEY_LEN,
            });
        }
        Ok(Self(key))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(***)")
    }
}

/// Errors that can occur in the credential vault.
#[derive(thiserror::Error, Debug)]
pub enum VaultError {
    #[error("Malformed blob: expected 4 components, found {0}")]
    MalformedBlob(usize),

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Master key too short: {len} characters, need at least {min}")]
    WeakMasterKey { len: usize, min: usize },

    #[error("No credentials stored for caller: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VaultError {
    /// Stable machine-readable tag.
    pub fn tag(&self) -> &'static str {
        match self {
            VaultError::MalformedBlob(_) => "MALFORMED_BLOB",
            VaultError::DecryptionFailed => "DECRYPTION_FAILED",
            VaultError::EncryptionFailed => "ENCRYPTION_FAILED",
            VaultError::KeyDerivation(_) => "KEY_DERIVATION_FAILED",
            VaultError::WeakMasterKey { .. } => "WEAK_MASTER_KEY",
            VaultError::NotFound(_) => "NOT_FOUND",
            VaultError::Storage(_) | VaultError::Io(_) | VaultError::Json(_) => "STORAGE_ERROR",
        }
    }
}

pub type VaultResult<T> = Result<T, VaultError>;
