//! Storage backends for vault records.
//!
//! A backend is a flat string-to-string map keyed by the namespaced storage
//! key. [`MemoryBackend`] backs the volatile tier; [`FileBackend`] backs the
//! persistent tier with an atomic-swap file write (unique temp write +
//! `fsync` + `rename`) so a crash never leaves a torn store.

use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::VaultError;

/// A flat record store. Single-key operations are atomic; `store_many` is a
/// single commit so rotation can replace every record at once.
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Reads a record by its full storage key.
    ///
    /// # Errors
    /// Returns [`VaultError::Backend`] on I/O failure.
    fn load(&self, key: &str) -> Result<Option<String>, VaultError>;

    /// Writes a record (last-writer-wins).
    ///
    /// # Errors
    /// Returns [`VaultError::Backend`] on I/O failure.
    fn store(&self, key: &str, value: &str) -> Result<(), VaultError>;

    /// Writes a batch of records in one commit.
    ///
    /// # Errors
    /// Returns [`VaultError::Backend`] on I/O failure; on error no caller
    /// assumption about partial application should be made beyond the
    /// backend's own atomicity (the file backend swaps the whole store).
    fn store_many(&self, entries: &[(String, String)]) -> Result<(), VaultError>;

    /// Removes a record if present.
    ///
    /// # Errors
    /// Returns [`VaultError::Backend`] on I/O failure.
    fn remove(&self, key: &str) -> Result<(), VaultError>;

    /// Lists full storage keys starting with `prefix`.
    ///
    /// # Errors
    /// Returns [`VaultError::Backend`] on I/O failure.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, VaultError>;
}

/// Volatile in-memory store; lives exactly as long as the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<FxHashMap<String, String>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self, key: &str) -> Result<Option<String>, VaultError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), VaultError> {
        self.entries.write().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn store_many(&self, entries: &[(String, String)]) -> Result<(), VaultError> {
        let mut map = self.entries.write();
        for (key, value) in entries {
            map.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), VaultError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, VaultError> {
        Ok(self.entries.read().keys().filter(|k| k.starts_with(prefix)).cloned().collect())
    }
}

/// Persistent store backed by a single JSON file.
///
/// The whole map is cached in memory and rewritten atomically on every
/// mutation. A corrupt store file is logged and treated as empty rather
/// than poisoning startup; individual records are still authenticated by
/// the vault cipher, so corruption cannot forge entries.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    entries: RwLock<FxHashMap<String, String>>,
}

impl FileBackend {
    /// Opens (or initializes) the store at `path`.
    ///
    /// # Errors
    /// Returns [`VaultError::Backend`] if the parent directory cannot be
    /// created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, VaultError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| VaultError::Backend {
                message: "failed to create store directory".into(),
                context: Some(e.to_string().into()),
            })?;
        }

        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<FxHashMap<String, String>>(&raw) {
                Ok(map) => map,
                Err(e) => {
                    warn!(error = %e, "Persistent store is corrupt; starting empty");
                    FxHashMap::default()
                },
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FxHashMap::default(),
            Err(e) => {
                return Err(VaultError::Backend {
                    message: "failed to read persistent store".into(),
                    context: Some(e.to_string().into()),
                });
            },
        };

        debug!(records = entries.len(), "Persistent store opened");
        Ok(Self { path, entries: RwLock::new(entries) })
    }

    fn flush(&self, map: &FxHashMap<String, String>) -> Result<(), VaultError> {
        let backend_err = |message: &'static str| {
            move |e: std::io::Error| VaultError::Backend {
                message: message.into(),
                context: Some(e.to_string().into()),
            }
        };

        let raw = serde_json::to_vec(map)
            .map_err(|source| VaultError::Serialization { source, context: Some("store".into()) })?;

        // Atomic swap: unique temp write + fsync + rename.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &raw).map_err(backend_err("failed to write persistent store"))?;
        let file = fs::File::open(&tmp).map_err(backend_err("failed to reopen temp store"))?;
        file.sync_all().map_err(backend_err("failed to sync persistent store"))?;
        drop(file);
        fs::rename(&tmp, &self.path).map_err(backend_err("failed to swap persistent store"))
    }
}

impl StorageBackend for FileBackend {
    fn load(&self, key: &str) -> Result<Option<String>, VaultError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), VaultError> {
        let mut map = self.entries.write();
        map.insert(key.to_owned(), value.to_owned());
        self.flush(&map)
    }

    fn store_many(&self, entries: &[(String, String)]) -> Result<(), VaultError> {
        let mut map = self.entries.write();
        for (key, value) in entries {
            map.insert(key.clone(), value.clone());
        }
        self.flush(&map)
    }

    fn remove(&self, key: &str) -> Result<(), VaultError> {
        let mut map = self.entries.write();
        if map.remove(key).is_some() {
            return self.flush(&map);
        }
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, VaultError> {
        Ok(self.entries.read().keys().filter(|k| k.starts_with(prefix)).cloned().collect())
    }
}
