use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use parking_lot::Mutex;
use parapet_kernel::clock::Clock;
use parapet_kernel::config::{CipherSuite, CryptoConfig, MIN_KDF_ITERATIONS};
use sha2::Sha256;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::error::KeysError;
use crate::material::{KeyAlgorithm, KeyScope, SessionKey};

/// Version prefix for the persisted bootstrap secret.
const BOOTSTRAP_PREFIX: &str = "v1";

/// Central authority for symmetric key material.
///
/// Explicitly constructed and injected (no process-wide singleton); the
/// embedding application builds one at startup and drops it on teardown.
#[derive(Debug)]
pub struct KeyManager {
    config: CryptoConfig,
    clock: Arc<dyn Clock>,
    bootstrap_path: Option<PathBuf>,
    master: Mutex<Option<Arc<SessionKey>>>,
}

impl KeyManager {
    /// Creates a manager whose vault master key lives only in memory.
    #[must_use]
    pub fn new(config: CryptoConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock, bootstrap_path: None, master: Mutex::new(None) }
    }

    /// Creates a manager that persists the vault master key as a bootstrap
    /// secret at `path` on first use.
    #[must_use]
    pub fn with_bootstrap(
        config: CryptoConfig,
        clock: Arc<dyn Clock>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self { config, clock, bootstrap_path: Some(path.into()), master: Mutex::new(None) }
    }

    /// Generates a fresh random key.
    ///
    /// # Errors
    /// * [`KeysError::UnsupportedKeySize`] unless `bits` is 128, 192, or 256.
    /// * [`KeysError::Generation`] if the system RNG is unavailable — fatal,
    ///   never retried.
    pub fn generate_key(&self, bits: u16, scope: KeyScope) -> Result<SessionKey, KeysError> {
        let algorithm = self.algorithm_for(bits, scope)?;
        let mut bytes = vec![0u8; algorithm.key_len()];
        getrandom::getrandom(&mut bytes).map_err(|e| KeysError::Generation {
            message: "System RNG unavailable".into(),
            context: Some(e.to_string().into()),
        })?;
        Ok(SessionKey::new(bytes, algorithm, self.clock.now_ms(), scope))
    }

    /// Derives a key from a passphrase with PBKDF2-HMAC-SHA256.
    ///
    /// Deterministic for identical inputs; any change to passphrase, salt,
    /// or iteration count yields materially different output.
    ///
    /// # Errors
    /// * [`KeysError::WeakDerivation`] if `iterations` is below the floor or
    ///   passphrase/salt are empty.
    /// * [`KeysError::UnsupportedKeySize`] unless `bits` is 128, 192, or 256.
    pub fn derive_from_passphrase(
        &self,
        passphrase: &str,
        salt: &[u8],
        iterations: u32,
        bits: u16,
    ) -> Result<SessionKey, KeysError> {
        if passphrase.is_empty() {
            return Err(KeysError::WeakDerivation {
                message: "passphrase must not be empty".into(),
                context: None,
            });
        }
        if salt.is_empty() {
            return Err(KeysError::WeakDerivation {
                message: "salt must not be empty".into(),
                context: None,
            });
        }
        if iterations < MIN_KDF_ITERATIONS {
            return Err(KeysError::WeakDerivation {
                message: format!(
                    "{iterations} iterations is below the floor {MIN_KDF_ITERATIONS}"
                )
                .into(),
                context: Some("pbkdf2".into()),
            });
        }

        let algorithm = self.algorithm_for(bits, KeyScope::Vault)?;
        let mut bytes = vec![0u8; algorithm.key_len()];
        pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, iterations, &mut bytes);
        debug!(bits, iterations, "Derived key from passphrase");
        Ok(SessionKey::new(bytes, algorithm, self.clock.now_ms(), KeyScope::Vault))
    }

    /// Returns the process-lifetime vault master key.
    ///
    /// On first use the key is loaded from the bootstrap secret if one
    /// exists, otherwise generated and persisted. The bootstrap file is the
    /// weakest link in the trust chain; see the crate documentation.
    ///
    /// # Errors
    /// * [`KeysError::Generation`] if a fresh key cannot be generated.
    /// * [`KeysError::Bootstrap`] if the secret cannot be read or written.
    pub fn vault_key(&self) -> Result<Arc<SessionKey>, KeysError> {
        let mut master = self.master.lock();
        if let Some(key) = master.as_ref() {
            return Ok(Arc::clone(key));
        }

        let key = match self.load_bootstrap()? {
            Some(key) => {
                debug!("Vault master key restored from bootstrap secret");
                key
            },
            None => {
                let key = self.mint_vault_key()?;
                self.persist_bootstrap(&key)?;
                info!("Vault master key generated and persisted");
                key
            },
        };

        let key = Arc::new(key);
        *master = Some(Arc::clone(&key));
        Ok(key)
    }

    /// Generates a candidate master key for rotation without committing it.
    ///
    /// # Errors
    /// Returns [`KeysError::Generation`] on entropy failure.
    pub fn mint_vault_key(&self) -> Result<SessionKey, KeysError> {
        self.generate_key(self.config.symmetric_key_bits, KeyScope::Vault)
    }

    /// The configured default iteration count for passphrase derivation.
    #[must_use]
    pub const fn kdf_iterations(&self) -> u32 {
        self.config.kdf_iterations
    }

    /// Swaps in a rotated master key and persists the new bootstrap secret.
    ///
    /// Call only after every vault entry has been re-encrypted under `key`;
    /// the vault's `rekey` guarantees that staging is all-or-nothing.
    ///
    /// # Errors
    /// Returns [`KeysError::Bootstrap`] if persisting fails; the in-memory
    /// key is still swapped so the running process stays consistent with the
    /// re-encrypted vault.
    pub fn commit_vault_key(&self, key: SessionKey) -> Result<Arc<SessionKey>, KeysError> {
        let key = Arc::new(key);
        *self.master.lock() = Some(Arc::clone(&key));
        let persisted = self.persist_bootstrap(&key);
        if persisted.is_err() {
            warn!("Rotated vault key could not be persisted; next start will mint a new key");
        }
        persisted?;
        Ok(key)
    }

    fn algorithm_for(&self, bits: u16, scope: KeyScope) -> Result<KeyAlgorithm, KeysError> {
        match (bits, scope) {
            (128, _) => Ok(KeyAlgorithm::Aes128Gcm),
            (192, _) => Ok(KeyAlgorithm::Aes192Gcm),
            (256, KeyScope::Transport) => Ok(KeyAlgorithm::ChaCha20Poly1305),
            (256, KeyScope::Vault) => Ok(match self.config.vault_cipher {
                CipherSuite::Aes256Gcm => KeyAlgorithm::Aes256Gcm,
                CipherSuite::ChaCha20Poly1305 => KeyAlgorithm::ChaCha20Poly1305,
            }),
            (bits, _) => Err(KeysError::UnsupportedKeySize { bits }),
        }
    }

    fn load_bootstrap(&self) -> Result<Option<SessionKey>, KeysError> {
        let Some(path) = self.bootstrap_path.as_deref() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let raw = Zeroizing::new(fs::read_to_string(path).map_err(|e| KeysError::Bootstrap {
            message: "failed to read bootstrap secret".into(),
            context: Some(e.to_string().into()),
        })?);

        let mut parts = raw.trim().splitn(3, ':');
        let (version, algo, encoded) = match (parts.next(), parts.next(), parts.next()) {
            (Some(v), Some(a), Some(e)) => (v, a, e),
            _ => {
                return Err(KeysError::Bootstrap {
                    message: "malformed bootstrap secret".into(),
                    context: None,
                });
            },
        };
        if version != BOOTSTRAP_PREFIX {
            return Err(KeysError::Bootstrap {
                message: format!("unsupported bootstrap version `{version}`").into(),
                context: None,
            });
        }

        let algorithm = KeyAlgorithm::parse(algo)?;
        let bytes = STANDARD_NO_PAD.decode(encoded).map_err(|e| KeysError::Bootstrap {
            message: "bootstrap secret is not valid base64".into(),
            context: Some(e.to_string().into()),
        })?;
        if bytes.len() != algorithm.key_len() {
            return Err(KeysError::Bootstrap {
                message: format!(
                    "bootstrap key length {} does not match {}",
                    bytes.len(),
                    algorithm.as_str()
                )
                .into(),
                context: None,
            });
        }

        Ok(Some(SessionKey::new(bytes, algorithm, self.clock.now_ms(), KeyScope::Vault)))
    }

    fn persist_bootstrap(&self, key: &SessionKey) -> Result<(), KeysError> {
        let Some(path) = self.bootstrap_path.as_deref() else {
            return Ok(());
        };

        let encoded = format!(
            "{BOOTSTRAP_PREFIX}:{}:{}\n",
            key.algorithm().as_str(),
            STANDARD_NO_PAD.encode(key.expose())
        );
        write_atomic(path, encoded.as_bytes()).map_err(|e| KeysError::Bootstrap {
            message: "failed to persist bootstrap secret".into(),
            context: Some(e.to_string().into()),
        })
    }
}

/// Unique temp write + rename so a crash never leaves a truncated secret.
fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&tmp, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
    }
    fs::rename(&tmp, path)
}
