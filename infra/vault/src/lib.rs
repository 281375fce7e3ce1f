//! An encrypted, namespaced, expiring key-value store for client state.
//!
//! The vault holds two disjoint partitions: `session` (cleared on logout)
//! and `pref` (survives logout). Every entry carries an absolute expiry and
//! an explicit storage tier — volatile (process lifetime) or persistent
//! (file-backed) — chosen at write time via a tagged parameter.
//!
//! ## Payload format
//!
//! Encrypted values are stored as a versioned binary blob with an explicit
//! header, base64-encoded inside the persisted JSON record:
//!
//! ```text
//! [V(1)][NONCE(12)][CIPHERTEXT(N)‖TAG(16)]
//! ```
//!
//! Ciphertexts are AAD-bound to their `namespace:key` address, so a record
//! copied under a different key fails authentication.
//!
//! ## Failure semantics
//!
//! Reads never fail. An expired entry is deleted and reported absent; a
//! tampered or undecryptable entry is reported absent while an internal
//! integrity signal (a `tracing` warning plus a change-bus event) records
//! the difference. Callers cannot distinguish tampering from missing-ness.
//!
//! ## Example
//! ```rust
//! use parapet_vault::prelude::*;
//! use parapet_kernel::prelude::*;
//! use parapet_keys::KeyManager;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), VaultError> {
//! let keys = KeyManager::new(CryptoConfig::default(), Arc::new(SystemClock));
//! let vault = SecureVault::builder()
//!     .master_key(keys.vault_key().expect("vault key"))
//!     .build()?;
//!
//! vault.put(Namespace::Pref, "theme", &"dark", PutOptions::default())?;
//! let theme: Option<String> = vault.get(Namespace::Pref, "theme");
//! assert_eq!(theme.as_deref(), Some("dark"));
//! # Ok(())
//! # }
//! ```

mod backend;
mod cipher;
mod engine;
mod error;
mod record;

pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use engine::{SecureVault, VaultBuilder};
pub use error::VaultError;
pub use record::{ChangeKind, EntryKey, PutOptions, VaultChange};

pub mod prelude {
    pub use crate::backend::{FileBackend, MemoryBackend, StorageBackend};
    pub use crate::engine::{SecureVault, VaultBuilder};
    pub use crate::error::VaultError;
    pub use crate::record::{ChangeKind, EntryKey, PutOptions, VaultChange};
    pub use parapet_kernel::domain::{Namespace, StorageTier};
}
