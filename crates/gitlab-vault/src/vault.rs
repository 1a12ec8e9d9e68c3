//! The credential vault: encrypts tokens on the way in, decrypts on demand.

use std::sync::Arc;

use chrono::Utc;

use crate::crypto;
use crate::store::{MemoryStore, RecordStore};
use crate::types::{
    CredentialRecord, MasterKey, PrivateRecord, PublicRecord, VaultError, VaultResult,
};

/// Keyed credential store on top of the secret codec.
///
/// Cheap to clone; clones share the underlying store.
#[derive(Clone)]
pub struct CredentialVault {
    master_key: MasterKey,
    store: Arc<dyn RecordStore>,
}

impl CredentialVault {
    pub fn new(master_key: MasterKey, store: Arc<dyn RecordStore>) -> Self {
        Self { master_key, store }
    }

    /// Vault backed by a [`MemoryStore`].
    pub fn in_memory(master_key: MasterKey) -> Self {
        Self::new(master_key, Arc::new(MemoryStore::new()))
    }

    /// Create or fully replace the record for `caller_key`.
    ///
    /// `watched` replaces the stored set; `None` clears it.
    pub async fn upsert(
        &self,
        caller_key: &str,
        gitlab_url: &str,
        access_token: &str,
        watched: Option<Vec<String>>,
    ) -> VaultResult<PublicRecord> {
        tracing::debug!("Upserting credentials for caller {caller_key} ({gitlab_url})");

        let encrypted_token = self.seal(access_token).await?;
        let now = Utc::now();
        let created_at = self
            .store
            .load(caller_key)
            .await?
            .map(|existing| existing.created_at)
            .unwrap_or(now);

        let record = CredentialRecord {
            caller_key: caller_key.to_string(),
            gitlab_url: gitlab_url.to_string(),
            encrypted_token,
            watched: watched.unwrap_or_default(),
            created_at,
            updated_at: now,
        };
        let public = PublicRecord::from(&record);
        self.store.save(record).await?;

        tracing::info!("Credentials saved for caller {caller_key}");
        Ok(public)
    }

    /// Public view of the record. Never exposes the token.
    pub async fn get(&self, caller_key: &str) -> VaultResult<Option<PublicRecord>> {
        Ok(self
            .store
            .load(caller_key)
            .await?
            .map(|record| PublicRecord::from(&record)))
    }

    /// Record with the decrypted token. Internal use only.
    pub async fn get_with_secret(&self, caller_key: &str) -> VaultResult<Option<PrivateRecord>> {
        let Some(record) = self.store.load(caller_key).await? else {
            tracing::debug!("No credentials for caller {caller_key}");
            return Ok(None);
        };

        let token = self.open(record.encrypted_token.clone()).await?;
        tracing::debug!("Credentials retrieved for caller {caller_key}");
        Ok(Some(PrivateRecord::from_record(record, token)))
    }

    pub async fn exists(&self, caller_key: &str) -> VaultResult<bool> {
        self.store.contains(caller_key).await
    }

    /// Delete a record. Deleting an absent record is an error; callers check
    /// [`exists`](Self::exists) first.
    pub async fn delete(&self, caller_key: &str) -> VaultResult<()> {
        if !self.store.remove(caller_key).await? {
            return Err(VaultError::NotFound(caller_key.to_string()));
        }
        tracing::info!("Credentials deleted for caller {caller_key}");
        Ok(())
    }

    /// Replace the watched set. `None` when no record exists.
    pub async fn update_watched(
        &self,
        caller_key: &str,
        watched: Vec<String>,
    ) -> VaultResult<Option<PublicRecord>> {
        let Some(mut record) = self.store.load(caller_key).await? else {
            return Ok(None);
        };

        record.watched = watched;
        record.updated_at = Utc::now();
        let public = PublicRecord::from(&record);
        self.store.save(record).await?;
        Ok(Some(public))
    }

    pub async fn count(&self) -> VaultResult<usize> {
        self.store.count().await
    }

    async fn seal(&self, plaintext: &str) -> VaultResult<String> {
        let key = self.master_key.clone();
        let plaintext = zeroize::Zeroizing::new(plaintext.to_string());
        run_blocking(move || crypto::encrypt(&plaintext, &key)).await
    }

    async fn open(&self, blob: String) -> VaultResult<String> {
        let key = self.master_key.clone();
        run_blocking(move || crypto::decrypt(&blob, &key)).await
    }
}

/// scrypt is deliberately expensive; keep it off the async workers.
async fn run_blocking<T, F>(f: F) -> VaultResult<T>
where
    F: FnOnce() -> VaultResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| VaultError::Storage(format!("Crypto task failed: {e}")))?
}
