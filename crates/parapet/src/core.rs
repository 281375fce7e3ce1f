use std::path::Path;
use std::sync::Arc;
use tracing::info;

use parapet_defense::LoginDefense;
use parapet_envelope::TransportEnvelope;
use parapet_kernel::clock::{Clock, SystemClock};
use parapet_kernel::config::{ConfigError, SecurityConfig};
use parapet_kernel::domain::Namespace;
use parapet_keys::{KeyManager, KeysError};
use parapet_pipeline::{PipelineBuilder, Transport};
use parapet_vault::{FileBackend, SecureVault, VaultError};

/// Composition-root error.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Keys(#[from] KeysError),

    #[error(transparent)]
    Vault(#[from] VaultError),
}

/// The explicitly constructed security core.
///
/// Owns the key manager, vault, and login defense for one browsing context.
/// Built once at startup and torn down via [`SecurityCore::logout`] plus
/// drop; there are no process-wide singletons, so tests and multi-context
/// hosts can hold several cores side by side.
#[derive(Debug)]
pub struct SecurityCore {
    keys: Arc<KeyManager>,
    vault: Arc<SecureVault>,
    defense: Arc<LoginDefense>,
    envelope: TransportEnvelope,
    config: SecurityConfig,
}

impl SecurityCore {
    /// Initializes a core with purely in-memory state.
    ///
    /// # Errors
    /// Returns [`CoreError`] if the configuration is invalid or the vault
    /// master key cannot be generated.
    pub fn init(config: SecurityConfig) -> Result<Self, CoreError> {
        Self::assemble(config, None)
    }

    /// Initializes a core whose bootstrap secret and persistent-tier
    /// entries live under `data_dir`.
    ///
    /// # Errors
    /// Returns [`CoreError`] if the configuration is invalid or storage
    /// cannot be opened.
    pub fn init_persistent(config: SecurityConfig, data_dir: &Path) -> Result<Self, CoreError> {
        Self::assemble(config, Some(data_dir))
    }

    fn assemble(config: SecurityConfig, data_dir: Option<&Path>) -> Result<Self, CoreError> {
        config.validate()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let keys = Arc::new(match data_dir {
            Some(dir) => KeyManager::with_bootstrap(
                config.crypto.clone(),
                Arc::clone(&clock),
                dir.join("bootstrap.key"),
            ),
            None => KeyManager::new(config.crypto.clone(), Arc::clone(&clock)),
        });

        let mut vault_builder =
            SecureVault::builder().master_key(keys.vault_key()?).clock(Arc::clone(&clock));
        if let Some(dir) = data_dir {
            vault_builder = vault_builder
                .persistent_backend(Box::new(FileBackend::open(dir.join("vault.json"))?));
        }
        let vault = Arc::new(vault_builder.build()?);

        let defense = Arc::new(LoginDefense::new(config.defense.clone(), Arc::clone(&clock)));
        let envelope = TransportEnvelope::new(Arc::clone(&keys));

        info!(persistent = data_dir.is_some(), "Security core initialized");
        Ok(Self { keys, vault, defense, envelope, config })
    }

    #[must_use]
    pub fn keys(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    #[must_use]
    pub fn vault(&self) -> &Arc<SecureVault> {
        &self.vault
    }

    #[must_use]
    pub fn defense(&self) -> &Arc<LoginDefense> {
        &self.defense
    }

    #[must_use]
    pub fn envelope(&self) -> &TransportEnvelope {
        &self.envelope
    }

    #[must_use]
    pub const fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// Starts a pipeline builder pre-wired with this core's vault, envelope
    /// engine, and retry policy. The caller supplies the transport and the
    /// key material for the remote party.
    #[must_use]
    pub fn pipeline_builder<T: Transport>(&self) -> PipelineBuilder<T> {
        parapet_pipeline::RequestPipeline::builder()
            .vault(Arc::clone(&self.vault))
            .envelope(self.envelope.clone())
            .retry(self.config.retry.clone())
    }

    /// Tears the session down: purges the `session` vault namespace and
    /// resets the login defense. `pref` entries survive.
    ///
    /// # Errors
    /// Returns [`CoreError::Vault`] if the purge fails.
    pub fn logout(&self) -> Result<(), CoreError> {
        self.vault.clear(Namespace::Session)?;
        info!("Session torn down");
        Ok(())
    }

    /// Rotates the vault master key: every entry is re-encrypted under a
    /// fresh key as one all-or-nothing transaction, then the new key is
    /// committed and persisted as the bootstrap secret.
    ///
    /// # Errors
    /// Returns [`CoreError`] if staging fails (no entry is changed) or the
    /// new key cannot be committed.
    pub fn rotate_vault_key(&self) -> Result<(), CoreError> {
        let candidate = self.keys.mint_vault_key()?;
        self.vault.rekey(&candidate)?;
        self.keys.commit_vault_key(candidate)?;
        info!("Vault master key rotated");
        Ok(())
    }
}
