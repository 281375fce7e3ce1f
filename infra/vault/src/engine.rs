use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use parapet_events::KeyedBus;
use parapet_kernel::clock::{Clock, SystemClock};
use parapet_kernel::domain::{Namespace, StorageTier};
use parapet_keys::SessionKey;

use crate::backend::{MemoryBackend, StorageBackend};
use crate::cipher::EntryCipher;
use crate::error::VaultError;
use crate::record::{ChangeKind, EntryKey, PutOptions, StoredRecord, VaultChange};

/// The encrypted, namespaced, expiring key-value store.
///
/// Reads never fail: expired entries are deleted and reported absent,
/// undecryptable entries are reported absent while an internal integrity
/// signal is emitted. Writes are atomic per key (last-writer-wins); only
/// [`SecureVault::rekey`] is a cross-key transaction, and it is strictly
/// all-or-nothing.
#[derive(Debug)]
pub struct SecureVault {
    cipher: RwLock<EntryCipher>,
    volatile: Box<dyn StorageBackend>,
    persistent: Box<dyn StorageBackend>,
    events: KeyedBus<EntryKey, VaultChange>,
    clock: Arc<dyn Clock>,
}

/// Runtime-checked builder for [`SecureVault`].
#[derive(Debug, Default)]
pub struct VaultBuilder {
    master: Option<Arc<SessionKey>>,
    volatile: Option<Box<dyn StorageBackend>>,
    persistent: Option<Box<dyn StorageBackend>>,
    clock: Option<Arc<dyn Clock>>,
}

impl VaultBuilder {
    /// Sets the master key the at-rest cipher is built from. Required.
    #[must_use]
    pub fn master_key(mut self, key: Arc<SessionKey>) -> Self {
        self.master = Some(key);
        self
    }

    /// Overrides the volatile-tier backend (defaults to in-memory).
    #[must_use]
    pub fn volatile_backend(mut self, backend: Box<dyn StorageBackend>) -> Self {
        self.volatile = Some(backend);
        self
    }

    /// Overrides the persistent-tier backend (defaults to in-memory; supply
    /// a [`crate::FileBackend`] for real persistence).
    #[must_use]
    pub fn persistent_backend(mut self, backend: Box<dyn StorageBackend>) -> Self {
        self.persistent = Some(backend);
        self
    }

    /// Overrides the clock used for expiry (defaults to system time).
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Finalizes the vault.
    ///
    /// # Errors
    /// Returns [`VaultError::InvalidConfiguration`] if no master key was
    /// provided or the key does not match its declared algorithm.
    pub fn build(self) -> Result<SecureVault, VaultError> {
        let master = self.master.ok_or_else(|| VaultError::InvalidConfiguration {
            message: "a master key is required".into(),
            context: Some("builder".into()),
        })?;

        Ok(SecureVault {
            cipher: RwLock::new(EntryCipher::for_key(&master)?),
            volatile: self.volatile.unwrap_or_else(|| Box::new(MemoryBackend::new())),
            persistent: self.persistent.unwrap_or_else(|| Box::new(MemoryBackend::new())),
            events: KeyedBus::new(),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        })
    }
}

impl SecureVault {
    /// Returns a new [`VaultBuilder`].
    #[must_use]
    pub fn builder() -> VaultBuilder {
        VaultBuilder::default()
    }

    /// Serializes `value` and stores it under `namespace`/`key`.
    ///
    /// The tier, TTL, and encryption choice are all explicit in `options`.
    /// Re-writing a key that previously lived in the other tier moves it:
    /// last writer wins across tiers as well as within one.
    ///
    /// # Errors
    /// * [`VaultError::Serialization`] if the value cannot be serialized.
    /// * [`VaultError::Encryption`] if the AEAD or RNG fails.
    /// * [`VaultError::Backend`] if the backing store rejects the write.
    pub fn put<T: Serialize>(
        &self,
        namespace: Namespace,
        key: &str,
        value: &T,
        options: PutOptions,
    ) -> Result<(), VaultError> {
        let entry = EntryKey::new(namespace, key);
        let storage_key = entry.storage_key();

        let (stored_value, encrypted) = if options.encrypt {
            let bytes = Zeroizing::new(serde_json::to_vec(value).map_err(|source| {
                VaultError::Serialization { source, context: Some("put".into()) }
            })?);
            let blob = self.cipher.read().seal(&bytes, storage_key.as_bytes())?;
            (serde_json::Value::String(STANDARD_NO_PAD.encode(blob)), true)
        } else {
            (
                serde_json::to_value(value).map_err(|source| VaultError::Serialization {
                    source,
                    context: Some("put".into()),
                })?,
                false,
            )
        };

        let record = StoredRecord {
            value: stored_value,
            created_at_ms: self.clock.now_ms(),
            ttl_ms: options.ttl_ms,
            encrypted,
        };
        let raw = serde_json::to_string(&record).map_err(|source| VaultError::Serialization {
            source,
            context: Some("record".into()),
        })?;

        self.backend(options.tier).store(&storage_key, &raw)?;
        // The entry may have lived in the other tier before this write.
        self.backend(other_tier(options.tier)).remove(&storage_key)?;

        self.events.publish(
            &entry,
            VaultChange { namespace, key: key.to_owned(), kind: ChangeKind::Updated },
        );
        Ok(())
    }

    /// Reads and deserializes the value under `namespace`/`key`.
    ///
    /// Returns `None` for missing, expired, tampered, or undecodable
    /// entries. Never fails; expired entries are deleted on sight, and
    /// integrity violations emit an internal signal while leaving the
    /// record in place.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, namespace: Namespace, key: &str) -> Option<T> {
        let entry = EntryKey::new(namespace, key);
        let storage_key = entry.storage_key();

        let (tier, raw) = self.load_either(&storage_key)?;

        let record: StoredRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(key = %storage_key, error = %e, "Vault record is malformed");
                self.signal_integrity_violation(&entry);
                return None;
            },
        };

        // Expiry is checked before any decryption work.
        if record.is_expired(self.clock.now_ms()) {
            debug!(key = %storage_key, "Vault entry expired; deleting");
            if let Err(e) = self.backend(tier).remove(&storage_key) {
                warn!(key = %storage_key, error = %e, "Failed to delete expired entry");
            }
            self.events.publish(
                &entry,
                VaultChange { namespace, key: key.to_owned(), kind: ChangeKind::Expired },
            );
            return None;
        }

        let plaintext: Zeroizing<Vec<u8>> = if record.encrypted {
            let Some(encoded) = record.value.as_str() else {
                self.signal_integrity_violation(&entry);
                return None;
            };
            let blob = match STANDARD_NO_PAD.decode(encoded) {
                Ok(blob) => blob,
                Err(_) => {
                    self.signal_integrity_violation(&entry);
                    return None;
                },
            };
            match self.cipher.read().open(&blob, storage_key.as_bytes()) {
                Ok(plain) => Zeroizing::new(plain),
                Err(_) => {
                    self.signal_integrity_violation(&entry);
                    return None;
                },
            }
        } else {
            return serde_json::from_value(record.value).ok();
        };

        serde_json::from_slice(&plaintext).ok()
    }

    /// Removes the entry from both tiers.
    ///
    /// # Errors
    /// Returns [`VaultError::Backend`] if a backing store rejects the
    /// removal.
    pub fn remove(&self, namespace: Namespace, key: &str) -> Result<(), VaultError> {
        let entry = EntryKey::new(namespace, key);
        let storage_key = entry.storage_key();
        let existed = self.load_either(&storage_key).is_some();

        self.volatile.remove(&storage_key)?;
        self.persistent.remove(&storage_key)?;

        if existed {
            self.events.publish(
                &entry,
                VaultChange { namespace, key: key.to_owned(), kind: ChangeKind::Removed },
            );
        }
        Ok(())
    }

    /// Deletes every entry in `namespace` across both tiers.
    ///
    /// Clearing `session` on logout never touches `pref` entries.
    ///
    /// # Errors
    /// Returns [`VaultError::Backend`] if a backing store fails.
    pub fn clear(&self, namespace: Namespace) -> Result<(), VaultError> {
        let prefix = format!("{}:", namespace.as_str());
        for backend in [self.volatile.as_ref(), self.persistent.as_ref()] {
            for storage_key in backend.keys_with_prefix(&prefix)? {
                backend.remove(&storage_key)?;
                let key = storage_key[prefix.len()..].to_owned();
                let entry = EntryKey::new(namespace, key.clone());
                self.events
                    .publish(&entry, VaultChange { namespace, key, kind: ChangeKind::Cleared });
            }
        }
        debug!(namespace = %namespace, "Vault namespace cleared");
        Ok(())
    }

    /// Lists the (un-prefixed) keys present in `namespace` across both tiers.
    ///
    /// # Errors
    /// Returns [`VaultError::Backend`] if a backing store fails.
    pub fn keys(&self, namespace: Namespace) -> Result<Vec<String>, VaultError> {
        let prefix = format!("{}:", namespace.as_str());
        let mut keys = Vec::new();
        for backend in [self.volatile.as_ref(), self.persistent.as_ref()] {
            for storage_key in backend.keys_with_prefix(&prefix)? {
                let key = storage_key[prefix.len()..].to_owned();
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        Ok(keys)
    }

    /// Subscribes to change events for one entry.
    pub fn subscribe(
        &self,
        namespace: Namespace,
        key: &str,
    ) -> broadcast::Receiver<Arc<VaultChange>> {
        self.events.subscribe(EntryKey::new(namespace, key))
    }

    /// Re-encrypts every encrypted entry under `new_master`, all-or-nothing.
    ///
    /// Staging re-encrypts everything in memory first; the first entry that
    /// fails to decrypt or re-encrypt aborts the rotation with no store
    /// mutated. Only after every entry has been staged are the backends
    /// committed (one batch per tier) and the at-rest cipher swapped.
    ///
    /// # Errors
    /// * [`VaultError::Decryption`] if an existing entry fails to
    ///   authenticate under the current key.
    /// * [`VaultError::Encryption`], [`VaultError::Serialization`],
    ///   [`VaultError::Backend`] for staging or commit failures.
    pub fn rekey(&self, new_master: &SessionKey) -> Result<(), VaultError> {
        let new_cipher = EntryCipher::for_key(new_master)?;

        // The write lock excludes concurrent reads and writes for the whole
        // transaction, so no entry can be sealed under the old key while the
        // new one is being committed.
        let mut cipher = self.cipher.write();

        let mut staged: [Vec<(String, String)>; 2] = [Vec::new(), Vec::new()];
        for (slot, backend) in [self.volatile.as_ref(), self.persistent.as_ref()]
            .into_iter()
            .enumerate()
        {
            for storage_key in backend.keys_with_prefix("")? {
                let Some(raw) = backend.load(&storage_key)? else { continue };
                let record: StoredRecord =
                    serde_json::from_str(&raw).map_err(|source| VaultError::Serialization {
                        source,
                        context: Some("rekey".into()),
                    })?;
                if !record.encrypted {
                    continue;
                }

                let encoded = record.value.as_str().ok_or_else(|| VaultError::InvalidPayload {
                    message: "encrypted record value is not a string".into(),
                    context: None,
                })?;
                let blob = STANDARD_NO_PAD.decode(encoded).map_err(|_| {
                    VaultError::InvalidPayload {
                        message: "encrypted record value is not valid base64".into(),
                        context: None,
                    }
                })?;

                let plaintext = Zeroizing::new(cipher.open(&blob, storage_key.as_bytes())?);
                let reblob = new_cipher.seal(&plaintext, storage_key.as_bytes())?;

                let record = StoredRecord {
                    value: serde_json::Value::String(STANDARD_NO_PAD.encode(reblob)),
                    ..record
                };
                let raw =
                    serde_json::to_string(&record).map_err(|source| VaultError::Serialization {
                        source,
                        context: Some("rekey".into()),
                    })?;
                staged[slot].push((storage_key, raw));
            }
        }

        // Commit. Values are unchanged, so no change events are published.
        self.volatile.store_many(&staged[0])?;
        self.persistent.store_many(&staged[1])?;
        *cipher = new_cipher;

        debug!(
            volatile = staged[0].len(),
            persistent = staged[1].len(),
            "Vault master key rotated"
        );
        Ok(())
    }

    fn backend(&self, tier: StorageTier) -> &dyn StorageBackend {
        match tier {
            StorageTier::Volatile => self.volatile.as_ref(),
            StorageTier::Persistent => self.persistent.as_ref(),
        }
    }

    fn load_either(&self, storage_key: &str) -> Option<(StorageTier, String)> {
        for tier in [StorageTier::Volatile, StorageTier::Persistent] {
            match self.backend(tier).load(storage_key) {
                Ok(Some(raw)) => return Some((tier, raw)),
                Ok(None) => {},
                Err(e) => {
                    warn!(key = %storage_key, error = %e, "Vault backend read failed");
                },
            }
        }
        None
    }

    fn signal_integrity_violation(&self, entry: &EntryKey) {
        warn!(key = %entry.storage_key(), "Vault integrity violation; reporting absent");
        self.events.publish(
            entry,
            VaultChange {
                namespace: entry.namespace,
                key: entry.key.clone(),
                kind: ChangeKind::IntegrityViolation,
            },
        );
    }
}

fn other_tier(tier: StorageTier) -> StorageTier {
    match tier {
        StorageTier::Volatile => StorageTier::Persistent,
        StorageTier::Persistent => StorageTier::Volatile,
    }
}
