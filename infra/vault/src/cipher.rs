use aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};

use parapet_keys::{KeyAlgorithm, SessionKey};

use crate::error::VaultError;

/// AES-192-GCM assembled from the re-exported block cipher; the crate only
/// aliases the 128/256 variants.
type Aes192Gcm = aes_gcm::AesGcm<aes_gcm::aes::Aes192, aead::consts::U12>;

/// Payload header version.
pub(crate) const PAYLOAD_VERSION_V1: u8 = 1;

/// Header layout: `[version: u8]`
pub(crate) const HEADER_LEN: usize = 1;

/// AEAD nonce length (96-bit).
pub(crate) const NONCE_LEN: usize = 12;

/// AEAD tag length (128-bit).
pub(crate) const TAG_LEN: usize = 16;

/// The at-rest cipher, selected by the master key's algorithm tag.
pub(crate) enum EntryCipher {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
    ChaCha(ChaCha20Poly1305),
}

impl std::fmt::Debug for EntryCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let suite = match self {
            Self::Aes128(_) => "Aes128Gcm",
            Self::Aes192(_) => "Aes192Gcm",
            Self::Aes256(_) => "Aes256Gcm",
            Self::ChaCha(_) => "ChaCha20Poly1305",
        };
        f.debug_tuple("EntryCipher").field(&suite).finish()
    }
}

impl EntryCipher {
    /// Builds the cipher matching a key's algorithm tag.
    ///
    /// # Errors
    /// Returns [`VaultError::InvalidConfiguration`] if the key length does
    /// not match its declared algorithm.
    pub(crate) fn for_key(key: &SessionKey) -> Result<Self, VaultError> {
        let invalid = |context: &'static str| VaultError::InvalidConfiguration {
            message: "key length does not match its algorithm".into(),
            context: Some(context.into()),
        };

        let bytes = key.expose();
        Ok(match key.algorithm() {
            KeyAlgorithm::Aes128Gcm => {
                Self::Aes128(Aes128Gcm::new_from_slice(bytes).map_err(|_| invalid("aes128gcm"))?)
            },
            KeyAlgorithm::Aes192Gcm => {
                Self::Aes192(Aes192Gcm::new_from_slice(bytes).map_err(|_| invalid("aes192gcm"))?)
            },
            KeyAlgorithm::Aes256Gcm => {
                Self::Aes256(Aes256Gcm::new_from_slice(bytes).map_err(|_| invalid("aes256gcm"))?)
            },
            KeyAlgorithm::ChaCha20Poly1305 => Self::ChaCha(
                ChaCha20Poly1305::new_from_slice(bytes).map_err(|_| invalid("chacha20poly1305"))?,
            ),
        })
    }

    /// Encrypts `plaintext` into a versioned blob, binding it to `aad`.
    ///
    /// # Errors
    /// Returns [`VaultError::Encryption`] if the RNG or the AEAD fails.
    pub(crate) fn seal(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, VaultError> {
        let mut nonce = [0u8; NONCE_LEN];
        getrandom::getrandom(&mut nonce).map_err(|_| VaultError::Encryption {
            message: "System RNG unavailable for nonce generation".into(),
            context: None,
        })?;

        let payload = Payload { msg: plaintext, aad };
        let nonce_ga = Nonce::from_slice(&nonce);
        let ciphertext = match self {
            Self::Aes128(c) => c.encrypt(nonce_ga, payload),
            Self::Aes192(c) => c.encrypt(nonce_ga, payload),
            Self::Aes256(c) => c.encrypt(nonce_ga, payload),
            Self::ChaCha(c) => c.encrypt(nonce_ga, payload),
        }
        .map_err(|_| VaultError::Encryption {
            message: "Encryption failed".into(),
            context: Some("AEAD encryption failed".into()),
        })?;

        let mut blob = Vec::with_capacity(HEADER_LEN + NONCE_LEN + ciphertext.len());
        blob.push(PAYLOAD_VERSION_V1);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypts a versioned blob produced by [`EntryCipher::seal`].
    ///
    /// # Errors
    /// * [`VaultError::InvalidPayload`] if the blob is malformed or carries
    ///   an unknown version.
    /// * [`VaultError::Decryption`] if authentication fails.
    pub(crate) fn open(&self, blob: &[u8], aad: &[u8]) -> Result<Vec<u8>, VaultError> {
        if blob.len() < HEADER_LEN + NONCE_LEN + TAG_LEN {
            return Err(VaultError::InvalidPayload {
                message: format!(
                    "Payload too short ({} bytes). Expected at least {} bytes",
                    blob.len(),
                    HEADER_LEN + NONCE_LEN + TAG_LEN
                )
                .into(),
                context: None,
            });
        }

        let version = blob[0];
        if version != PAYLOAD_VERSION_V1 {
            return Err(VaultError::InvalidPayload {
                message: "Unsupported payload version".into(),
                context: Some(format!("version={version}").into()),
            });
        }

        let (nonce_slice, ciphertext) = blob[HEADER_LEN..].split_at(NONCE_LEN);
        let payload = Payload { msg: ciphertext, aad };
        let nonce_ga = Nonce::from_slice(nonce_slice);

        match self {
            Self::Aes128(c) => c.decrypt(nonce_ga, payload),
            Self::Aes192(c) => c.decrypt(nonce_ga, payload),
            Self::Aes256(c) => c.decrypt(nonce_ga, payload),
            Self::ChaCha(c) => c.decrypt(nonce_ga, payload),
        }
        .map_err(|_| VaultError::Decryption {
            message: "Decryption failed".into(),
            context: Some("AEAD authentication failed".into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parapet_kernel::clock::ManualClock;
    use parapet_kernel::config::CryptoConfig;
    use parapet_keys::{KeyManager, KeyScope};

    fn cipher() -> EntryCipher {
        let manager = KeyManager::new(CryptoConfig::default(), ManualClock::new(0));
        let key = manager.generate_key(256, KeyScope::Vault).unwrap();
        EntryCipher::for_key(&key).unwrap()
    }

    #[test]
    fn seal_open_roundtrip() {
        let cipher = cipher();
        let blob = cipher.seal(b"secret", b"session:token").unwrap();
        let opened = cipher.open(&blob, b"session:token").unwrap();
        assert_eq!(opened, b"secret");
    }

    #[test]
    fn open_fails_with_wrong_context() {
        let cipher = cipher();
        let blob = cipher.seal(b"secret", b"session:token").unwrap();
        assert!(matches!(
            cipher.open(&blob, b"pref:token"),
            Err(VaultError::Decryption { .. })
        ));
    }

    #[test]
    fn open_rejects_unknown_versions() {
        let cipher = cipher();
        let mut blob = cipher.seal(b"secret", b"ctx").unwrap();
        blob[0] = 9;
        assert!(matches!(cipher.open(&blob, b"ctx"), Err(VaultError::InvalidPayload { .. })));
    }

    #[test]
    fn every_suite_roundtrips() {
        let manager = KeyManager::new(CryptoConfig::default(), ManualClock::new(0));
        for bits in [128u16, 192, 256] {
            let key = manager.generate_key(bits, KeyScope::Vault).unwrap();
            let cipher = EntryCipher::for_key(&key).unwrap();
            let blob = cipher.seal(b"agile", b"ctx").unwrap();
            assert_eq!(cipher.open(&blob, b"ctx").unwrap(), b"agile");
        }
    }
}
