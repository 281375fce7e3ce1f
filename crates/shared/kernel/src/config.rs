//! Typed configuration surface for the security core.
//!
//! Every knob the core consumes is a named, bounded, typed field with a
//! documented default; dynamic configuration objects are deliberately absent.
//! [`load_config`] layers an optional file under `PARAPET__`-prefixed
//! environment overrides.

use config::{Config, Environment, File};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::info;

/// Lower bound on PBKDF2 iteration counts. Derivation requests below this
/// floor are rejected outright.
pub const MIN_KDF_ITERATIONS: u32 = 100_000;

/// Custom error type for config loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Load { source: config::ConfigError, context: Option<Cow<'static, str>> },

    #[error("Invalid configuration{}: {message}", format_context(.context))]
    Invalid { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}

/// Root configuration consumed by the security core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityConfig {
    pub defense: DefenseConfig,
    pub crypto: CryptoConfig,
    pub retry: RetryConfig,
}

/// Login-defense thresholds and lockout policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefenseConfig {
    /// Failure count at which a CAPTCHA challenge becomes mandatory.
    pub captcha_threshold: u32,
    /// Failure count at which the machine locks.
    pub lock_threshold: u32,
    /// How long a lockout lasts.
    pub lockout_duration_ms: u64,
    /// State the machine returns to when a lockout expires.
    pub post_lockout: PostLockout,
}

impl Default for DefenseConfig {
    fn default() -> Self {
        Self {
            captcha_threshold: 3,
            lock_threshold: 5,
            lockout_duration_ms: 300_000,
            post_lockout: PostLockout::Normal,
        }
    }
}

/// Where the defense machine lands after a lockout window elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostLockout {
    /// Fresh start: counter cleared.
    Normal,
    /// Stay suspicious: the next attempt still requires a challenge.
    ChallengeRequired,
}

/// Cryptographic parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CryptoConfig {
    /// PBKDF2 iteration count for passphrase-derived keys.
    pub kdf_iterations: u32,
    /// Default size of generated symmetric keys. One of 128, 192, 256.
    pub symmetric_key_bits: u16,
    /// AEAD used for vault entries.
    pub vault_cipher: CipherSuite,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: 600_000,
            symmetric_key_bits: 256,
            vault_cipher: CipherSuite::Aes256Gcm,
        }
    }
}

/// Supported AEAD suites for at-rest encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CipherSuite {
    Aes256Gcm,
    ChaCha20Poly1305,
}

/// Backoff policy applied to transient transport failures.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3, base_delay_ms: 250 }
    }
}

impl SecurityConfig {
    /// Checks cross-field bounds that serde cannot express.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: Cow<'static, str>, context: &'static str| ConfigError::Invalid {
            message,
            context: Some(context.into()),
        };

        if self.defense.captcha_threshold == 0 {
            return Err(invalid("captcha_threshold must be at least 1".into(), "defense"));
        }
        if self.defense.lock_threshold <= self.defense.captcha_threshold {
            return Err(invalid(
                format!(
                    "lock_threshold {} must exceed captcha_threshold {}",
                    self.defense.lock_threshold, self.defense.captcha_threshold
                )
                .into(),
                "defense",
            ));
        }
        if self.defense.lockout_duration_ms == 0 {
            return Err(invalid("lockout_duration_ms must be positive".into(), "defense"));
        }
        if self.crypto.kdf_iterations < MIN_KDF_ITERATIONS {
            return Err(invalid(
                format!(
                    "kdf_iterations {} is below the floor {MIN_KDF_ITERATIONS}",
                    self.crypto.kdf_iterations
                )
                .into(),
                "crypto",
            ));
        }
        if !matches!(self.crypto.symmetric_key_bits, 128 | 192 | 256) {
            return Err(invalid(
                format!("symmetric_key_bits {} must be 128, 192, or 256", self.crypto.symmetric_key_bits)
                    .into(),
                "crypto",
            ));
        }
        if self.retry.base_delay_ms == 0 {
            return Err(invalid("base_delay_ms must be positive".into(), "retry"));
        }
        Ok(())
    }
}

/// A reusable configuration loader that combines file-based settings with
/// environment overrides.
///
/// Layering:
/// 1. **Base file**: optional; defaults to `"parapet"` in the working
///    directory (any format the `config` crate recognizes).
/// 2. **Environment overrides**: variables prefixed with `PARAPET__`, nested
///    fields separated by double underscores (e.g.
///    `PARAPET__DEFENSE__LOCK_THRESHOLD`).
///
/// # Errors
/// Returns [`ConfigError::Load`] if the file or environment layers are
/// malformed or do not match `T`.
pub fn load_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let effective_path =
        path.map_or_else(|| PathBuf::from("parapet"), |p| p.as_ref().to_path_buf());

    let builder = Config::builder()
        .add_source(File::from(effective_path.as_path()).required(false))
        .add_source(
            Environment::with_prefix("PARAPET")
                .separator("__")
                .convert_case(config::Case::Snake),
        );

    info!("Loading config from {}", effective_path.display());

    builder
        .build()
        .map_err(|source| ConfigError::Load { source, context: Some("build".into()) })?
        .try_deserialize::<T>()
        .map_err(|source| ConfigError::Load { source, context: Some("deserialize".into()) })
}
