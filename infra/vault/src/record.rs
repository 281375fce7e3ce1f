use parapet_kernel::domain::{Namespace, StorageTier};
use serde::{Deserialize, Serialize};

/// Options for a single write, all explicit.
///
/// Defaults: encrypt, no expiry, volatile tier. The tier is a tagged choice
/// the caller makes per entry; nothing is inferred from ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutOptions {
    /// Relative time-to-live; `None` means the entry never expires.
    pub ttl_ms: Option<u64>,
    /// Encrypt the serialized value under the master key.
    pub encrypt: bool,
    /// Which backing store receives the entry.
    pub tier: StorageTier,
}

impl Default for PutOptions {
    fn default() -> Self {
        Self { ttl_ms: None, encrypt: true, tier: StorageTier::Volatile }
    }
}

impl PutOptions {
    /// Encrypted, non-expiring, persistent-tier options.
    #[must_use]
    pub const fn persistent() -> Self {
        Self { ttl_ms: None, encrypt: true, tier: StorageTier::Persistent }
    }

    #[must_use]
    pub const fn ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = Some(ttl_ms);
        self
    }

    /// Store the value without encryption (non-sensitive preferences).
    #[must_use]
    pub const fn plaintext(mut self) -> Self {
        self.encrypt = false;
        self
    }
}

/// Address of an entry on the change bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryKey {
    pub namespace: Namespace,
    pub key: String,
}

impl EntryKey {
    #[must_use]
    pub fn new(namespace: Namespace, key: impl Into<String>) -> Self {
        Self { namespace, key: key.into() }
    }

    /// The namespaced storage key, `<namespace>:<key>`.
    #[must_use]
    pub fn storage_key(&self) -> String {
        format!("{}:{}", self.namespace.as_str(), self.key)
    }
}

/// What happened to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Written or overwritten.
    Updated,
    /// Explicitly removed.
    Removed,
    /// Deleted because its TTL elapsed.
    Expired,
    /// Removed as part of a namespace clear.
    Cleared,
    /// A read found a record that failed authentication. The entry is left
    /// in place; the read reported absent.
    IntegrityViolation,
}

/// A change notification published on the keyed bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultChange {
    pub namespace: Namespace,
    pub key: String,
    pub kind: ChangeKind,
}

/// Persisted record shape: `{"v", "t", "ttl", "e"}`.
///
/// `v` holds the plaintext JSON value, or a base64 string of the sealed
/// blob when `e` is set. `e` discriminates the two so a plaintext string
/// can never be mistaken for ciphertext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredRecord {
    #[serde(rename = "v")]
    pub(crate) value: serde_json::Value,
    #[serde(rename = "t")]
    pub(crate) created_at_ms: u64,
    #[serde(rename = "ttl", default)]
    pub(crate) ttl_ms: Option<u64>,
    #[serde(rename = "e", default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) encrypted: bool,
}

impl StoredRecord {
    pub(crate) fn is_expired(&self, now_ms: u64) -> bool {
        self.ttl_ms.is_some_and(|ttl| now_ms >= self.created_at_ms.saturating_add(ttl))
    }
}
