//! gitlab-vault: encrypted-at-rest credential storage keyed by caller.

pub mod crypto;
pub mod store;
pub mod types;
pub mod vault;

pub use crypto::{decrypt, encrypt};
pub use store::{FileStore, MemoryStore, RecordStore};
pub use types::*;
pub use vault::CredentialVault;
