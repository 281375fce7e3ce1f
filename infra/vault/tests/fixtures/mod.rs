use std::sync::Arc;

use parapet_kernel::clock::ManualClock;
use parapet_kernel::config::CryptoConfig;
use parapet_keys::{KeyManager, SessionKey};
use parapet_vault::{MemoryBackend, SecureVault, StorageBackend, VaultError};

/// A cloneable handle over a shared in-memory backend so tests can reach
/// underneath the vault and corrupt records.
#[derive(Debug, Clone, Default)]
pub struct SharedBackend(pub Arc<MemoryBackend>);

impl StorageBackend for SharedBackend {
    fn load(&self, key: &str) -> Result<Option<String>, VaultError> {
        self.0.load(key)
    }

    fn store(&self, key: &str, value: &str) -> Result<(), VaultError> {
        self.0.store(key, value)
    }

    fn store_many(&self, entries: &[(String, String)]) -> Result<(), VaultError> {
        self.0.store_many(entries)
    }

    fn remove(&self, key: &str) -> Result<(), VaultError> {
        self.0.remove(key)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, VaultError> {
        self.0.keys_with_prefix(prefix)
    }
}

pub fn key_manager(clock: Arc<ManualClock>) -> KeyManager {
    KeyManager::new(CryptoConfig::default(), clock)
}

pub fn master_key(clock: Arc<ManualClock>) -> Arc<SessionKey> {
    key_manager(clock).vault_key().expect("vault key")
}

pub fn setup_vault(clock: Arc<ManualClock>) -> SecureVault {
    SecureVault::builder()
        .master_key(master_key(Arc::clone(&clock)))
        .clock(clock)
        .build()
        .expect("vault should build")
}
