//! Persistence backends for credential records.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::types::{CredentialRecord, VaultError, VaultResult};

/// Current vault file format version.
const FORMAT_VERSION: u16 = 1;

/// Keyed record storage. Exactly one record per caller key.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn load(&self, caller_key: &str) -> VaultResult<Option<CredentialRecord>>;

    /// Insert or replace the record under `record.caller_key`.
    async fn save(&self, record: CredentialRecord) -> VaultResult<()>;

    /// Remove a record. Returns `false` if nothing was stored under the key.
    async fn remove(&self, caller_key: &str) -> VaultResult<bool>;

    async fn contains(&self, caller_key: &str) -> VaultResult<bool> {
        Ok(self.load(caller_key).await?.is_some())
    }

    async fn count(&self) -> VaultResult<usize>;
}

/// Non-persistent store, for tests and throwaway deployments.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, CredentialRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn load(&self, caller_key: &str) -> VaultResult<Option<CredentialRecord>> {
        Ok(self.records.read().await.get(caller_key).cloned())
    }

    async fn save(&self, record: CredentialRecord) -> VaultResult<()> {
        self.records
            .write()
            .await
            .insert(record.caller_key.clone(), record);
        Ok(())
    }

    async fn remove(&self, caller_key: &str) -> VaultResult<bool> {
        Ok(self.records.write().await.remove(caller_key).is_some())
    }

    async fn contains(&self, caller_key: &str) -> VaultResult<bool> {
        Ok(self.records.read().await.contains_key(caller_key))
    }

    async fn count(&self) -> VaultResult<usize> {
        Ok(self.records.read().await.len())
    }
}

#[derive(Serialize, Deserialize)]
struct VaultFile {
    version: u16,
    records: BTreeMap<String, CredentialRecord>,
}

/// Single JSON document on disk. Every mutation rewrites the file through a
/// temp file + rename.
pub struct FileStore {
    path: PathBuf,
    records: Mutex<BTreeMap<String, CredentialRecord>>,
}

impl FileStore {
    /// Open or create a vault file at the given path.
    pub async fn open(path: impl AsRef<Path>) -> VaultResult<Self> {
        let path = path.as_ref().to_path_buf();

        let records = if tokio::fs::try_exists(&path).await? {
            tracing::info!("Opening existing vault file: {}", path.display());
            let bytes = tokio::fs::read(&path).await?;
            let file: VaultFile = serde_json::from_slice(&bytes)?;
            if file.version != FORMAT_VERSION {
                return Err(VaultError::Storage(format!(
                    "Unsupported vault format version {} (expected {FORMAT_VERSION})",
                    file.version
                )));
            }
            file.records
        } else {
            tracing::info!("Creating new vault file: {}", path.display());
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    VaultError::Storage(format!(
                        "Failed to create directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
            BTreeMap::new()
        };

        tracing::info!("Vault has {} stored credential(s)", records.len());

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, records: &BTreeMap<String, CredentialRecord>) -> VaultResult<()> {
        let payload = serde_json::to_vec_pretty(&VaultFile {
            version: FORMAT_VERSION,
            records: records.clone(),
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &payload).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!("Saved vault file: {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn load(&self, caller_key: &str) -> VaultResult<Option<CredentialRecord>> {
        Ok(self.records.lock().await.get(caller_key).cloned())
    }

    async fn save(&self, record: CredentialRecord) -> VaultResult<()> {
        let mut records = self.records.lock().await;
        let previous = records.insert(record.caller_key.clone(), record.clone());
        if let Err(e) = self.persist(&records).await {
            // Keep memory and disk in agreement.
            match previous {
                Some(old) => records.insert(old.caller_key.clone(), old),
                None => records.remove(&record.caller_key),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn remove(&self, caller_key: &str) -> VaultResult<bool> {
        let mut records = self.records.lock().await;
        let Some(previous) = records.remove(caller_key) else {
            return Ok(false);
        };
        if let Err(e) = self.persist(&records).await {
            records.insert(previous.caller_key.clone(), previous);
            return Err(e);
        }
        Ok(true)
    }

    async fn contains(&self, caller_key: &str) -> VaultResult<bool> {
        Ok(self.records.lock().await.contains_key(caller_key))
    }

    async fn count(&self) -> VaultResult<usize> {
        Ok(self.records.lock().await.len())
    }
}
