//! Vault-backed session token storage.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use parapet_kernel::domain::{Namespace, StorageTier};
use parapet_vault::{PutOptions, SecureVault, VaultError};

/// Vault key the token pair lives under (in the `session` namespace, so a
/// logout purge removes it).
const TOKENS_KEY: &str = "auth.tokens";

/// The token pair returned by the credential-verification and refresh
/// endpoints. Both tokens are opaque strings; the client never inspects
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Encrypted-at-rest token storage with an explicit tier choice.
///
/// The tier is supplied when tokens are first stored (a "remember me" login
/// passes `Persistent`, a plain login `Volatile`) and reused when a refresh
/// replaces them.
#[derive(Debug)]
pub struct TokenStore {
    vault: Arc<SecureVault>,
    tier: Mutex<StorageTier>,
}

impl TokenStore {
    #[must_use]
    pub fn new(vault: Arc<SecureVault>) -> Self {
        Self { vault, tier: Mutex::new(StorageTier::Volatile) }
    }

    /// Stores a fresh token pair, encrypted, in the given tier.
    ///
    /// # Errors
    /// Returns [`VaultError`] if the write fails.
    pub fn store(&self, tokens: &SessionTokens, tier: StorageTier) -> Result<(), VaultError> {
        *self.tier.lock() = tier;
        self.vault.put(
            Namespace::Session,
            TOKENS_KEY,
            tokens,
            PutOptions { ttl_ms: None, encrypt: true, tier },
        )
    }

    /// Replaces the pair after a refresh, keeping the original tier.
    ///
    /// # Errors
    /// Returns [`VaultError`] if the write fails.
    pub(crate) fn replace(&self, tokens: &SessionTokens) -> Result<(), VaultError> {
        let tier = *self.tier.lock();
        self.store(tokens, tier)
    }

    /// The current pair, if a session exists and the record is intact.
    #[must_use]
    pub fn current(&self) -> Option<SessionTokens> {
        self.vault.get(Namespace::Session, TOKENS_KEY)
    }

    /// Drops the stored pair.
    ///
    /// # Errors
    /// Returns [`VaultError`] if the removal fails.
    pub fn clear(&self) -> Result<(), VaultError> {
        self.vault.remove(Namespace::Session, TOKENS_KEY)
    }
}
