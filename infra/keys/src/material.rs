//! Opaque key material handles.

use crate::error::KeysError;
use zeroize::Zeroizing;

/// AEAD suite a piece of key material targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Aes128Gcm,
    Aes192Gcm,
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl KeyAlgorithm {
    /// Key length in bytes for this suite.
    #[must_use]
    pub const fn key_len(self) -> usize {
        match self {
            Self::Aes128Gcm => 16,
            Self::Aes192Gcm => 24,
            Self::Aes256Gcm | Self::ChaCha20Poly1305 => 32,
        }
    }

    /// Stable identifier used in persisted formats.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aes128Gcm => "aes128gcm",
            Self::Aes192Gcm => "aes192gcm",
            Self::Aes256Gcm => "aes256gcm",
            Self::ChaCha20Poly1305 => "chacha20poly1305",
        }
    }

    /// Parses a persisted identifier.
    ///
    /// # Errors
    /// Returns [`KeysError::Bootstrap`] for unknown identifiers.
    pub fn parse(s: &str) -> Result<Self, KeysError> {
        match s {
            "aes128gcm" => Ok(Self::Aes128Gcm),
            "aes192gcm" => Ok(Self::Aes192Gcm),
            "aes256gcm" => Ok(Self::Aes256Gcm),
            "chacha20poly1305" => Ok(Self::ChaCha20Poly1305),
            other => Err(KeysError::Bootstrap {
                message: format!("unknown key algorithm `{other}`").into(),
                context: None,
            }),
        }
    }
}

/// What a key is allowed to protect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope {
    /// Ephemeral message keys for the transport envelope.
    Transport,
    /// The at-rest master key for the vault.
    Vault,
}

/// An opaque handle to symmetric key material.
///
/// The raw bytes are zeroized when the handle drops. [`SessionKey::expose`]
/// is the single, deliberate escape hatch through which sibling crates feed
/// the bytes into a cipher; nothing else copies them out.
pub struct SessionKey {
    bytes: Zeroizing<Vec<u8>>,
    algorithm: KeyAlgorithm,
    created_at_ms: u64,
    scope: KeyScope,
}

impl SessionKey {
    pub(crate) fn new(
        bytes: Vec<u8>,
        algorithm: KeyAlgorithm,
        created_at_ms: u64,
        scope: KeyScope,
    ) -> Self {
        debug_assert_eq!(bytes.len(), algorithm.key_len());
        Self { bytes: Zeroizing::new(bytes), algorithm, created_at_ms, scope }
    }

    /// Borrows the raw key bytes for cipher initialization.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub const fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub const fn scope(&self) -> KeyScope {
        self.scope
    }

    /// Creation time, milliseconds since the UNIX epoch.
    #[must_use]
    pub const fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    #[must_use]
    pub fn bits(&self) -> u16 {
        u16::try_from(self.bytes.len() * 8).unwrap_or(u16::MAX)
    }
}

// Key bytes stay out of logs and panic messages.
impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("algorithm", &self.algorithm)
            .field("bits", &self.bits())
            .field("created_at_ms", &self.created_at_ms)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
