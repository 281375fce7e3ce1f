use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{debug, trace};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, Zeroizing};

use parapet_keys::{KeyManager, KeyScope};

use crate::error::EnvelopeError;
use crate::wire::Envelope;

type HmacSha256 = Hmac<Sha256>;

/// Wire version this build produces and accepts.
const WIRE_VERSION_V1: u8 = 1;

/// Symmetric IV length (96-bit).
const IV_LEN: usize = 12;

/// Message key length (256-bit).
const KEY_LEN: usize = 32;

/// Nonce length inside the key wrap.
const WRAP_NONCE_LEN: usize = 12;

/// AEAD tag length inside the key wrap.
const WRAP_TAG_LEN: usize = 16;

/// `wrappedKey` layout: ephemeral public key ‖ wrap nonce ‖ wrapped key.
const WRAPPED_KEY_LEN: usize = KEY_LEN + WRAP_NONCE_LEN + KEY_LEN + WRAP_TAG_LEN;

// HKDF domain-separation labels. The encryption and MAC keys come from the
// same message key but distinct labels, so one can never stand in for the
// other.
const ENC_INFO: &[u8] = b"parapet-v1:enc";
const MAC_INFO: &[u8] = b"parapet-v1:mac";
const WRAP_INFO: &[u8] = b"parapet-v1:wrap";

/// An X25519 public key identifying the remote party envelopes are sealed
/// for.
#[derive(Clone)]
pub struct RecipientKey(PublicKey);

impl RecipientKey {
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(PublicKey::from(bytes))
    }

    /// Parses the Base64 form servers publish.
    ///
    /// # Errors
    /// Returns [`EnvelopeError::InvalidKey`] on bad encoding or length.
    pub fn from_base64(encoded: &str) -> Result<Self, EnvelopeError> {
        let bytes = STANDARD_NO_PAD.decode(encoded).map_err(|_| EnvelopeError::InvalidKey {
            message: "recipient key is not valid base64".into(),
            context: None,
        })?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| EnvelopeError::InvalidKey {
            message: "recipient key must be 32 bytes".into(),
            context: None,
        })?;
        Ok(Self::from_bytes(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for RecipientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RecipientKey").field(&STANDARD_NO_PAD.encode(self.0.as_bytes())).finish()
    }
}

/// The local X25519 secret that opens envelopes sealed to us.
pub struct IdentityKey(StaticSecret);

impl IdentityKey {
    /// Generates a fresh identity.
    ///
    /// # Errors
    /// Returns [`EnvelopeError::Encryption`] if the system RNG is
    /// unavailable.
    pub fn generate() -> Result<Self, EnvelopeError> {
        let mut bytes = random_bytes::<32>()?;
        let secret = StaticSecret::from(bytes);
        bytes.zeroize();
        Ok(Self(secret))
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// The public half, in the same form recipients are addressed by.
    #[must_use]
    pub fn public(&self) -> RecipientKey {
        RecipientKey(PublicKey::from(&self.0))
    }
}

impl std::fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityKey").finish_non_exhaustive()
    }
}

/// Seals and opens single-use hybrid-encrypted messages.
///
/// Stateless apart from the injected [`KeyManager`], which supplies the
/// per-message ephemeral keys; concurrent seals never share crypto state.
#[derive(Debug, Clone)]
pub struct TransportEnvelope {
    keys: Arc<KeyManager>,
}

impl TransportEnvelope {
    #[must_use]
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self { keys }
    }

    /// Seals `plaintext` for `recipient`.
    ///
    /// A fresh message key is generated per call; compromise of one
    /// envelope's key reveals nothing about any other.
    ///
    /// # Errors
    /// * [`EnvelopeError::Keys`] if key generation fails (fatal entropy
    ///   failure).
    /// * [`EnvelopeError::Encryption`] if the RNG or a cipher step fails.
    pub fn seal(&self, plaintext: &[u8], recipient: &RecipientKey) -> Result<Envelope, EnvelopeError> {
        let message_key = self.keys.generate_key(256, KeyScope::Transport)?;
        let (enc_key, mac_key) = expand_message_keys(message_key.expose());

        let iv = random_bytes::<IV_LEN>()?;
        let cipher = ChaCha20Poly1305::new_from_slice(enc_key.as_slice()).map_err(|_| {
            EnvelopeError::Encryption { message: "bad encryption key length".into(), context: None }
        })?;
        let ciphertext =
            cipher.encrypt(Nonce::from_slice(&iv), plaintext).map_err(|_| {
                EnvelopeError::Encryption {
                    message: "payload encryption failed".into(),
                    context: None,
                }
            })?;

        let mac = compute_mac(mac_key.as_slice(), &iv, &ciphertext);
        let wrapped_key = wrap_key(message_key.expose(), recipient)?;

        trace!(bytes = plaintext.len(), "Envelope sealed");
        Ok(Envelope {
            version: WIRE_VERSION_V1,
            iv: iv.to_vec(),
            ciphertext,
            mac,
            wrapped_key,
        })
    }

    /// Opens an envelope sealed to `identity`.
    ///
    /// The MAC is recomputed and compared in constant time before any
    /// decryption is attempted. Every verification or decryption failure
    /// collapses into [`EnvelopeError::Integrity`].
    ///
    /// # Errors
    /// * [`EnvelopeError::UnsupportedVersion`] for unknown wire versions
    ///   (fail closed).
    /// * [`EnvelopeError::Integrity`] for everything else.
    pub fn open(&self, envelope: &Envelope, identity: &IdentityKey) -> Result<Vec<u8>, EnvelopeError> {
        if envelope.version != WIRE_VERSION_V1 {
            debug!(version = envelope.version, "Envelope rejected: unknown version");
            return Err(EnvelopeError::UnsupportedVersion { version: envelope.version });
        }
        if envelope.iv.len() != IV_LEN {
            return Err(EnvelopeError::Integrity);
        }

        let message_key = unwrap_key(&envelope.wrapped_key, identity)?;
        let (enc_key, mac_key) = expand_message_keys(&message_key);

        verify_mac(mac_key.as_slice(), &envelope.iv, &envelope.ciphertext, &envelope.mac)?;

        let cipher = ChaCha20Poly1305::new_from_slice(enc_key.as_slice())
            .map_err(|_| EnvelopeError::Integrity)?;
        cipher
            .decrypt(Nonce::from_slice(&envelope.iv), envelope.ciphertext.as_slice())
            .map_err(|_| EnvelopeError::Integrity)
    }
}

/// Expands a message key into distinct encryption and MAC keys.
fn expand_message_keys(ikm: &[u8]) -> (Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>) {
    let hk = Hkdf::<Sha256>::new(None, ikm);
    let mut enc_key = Zeroizing::new([0u8; 32]);
    let mut mac_key = Zeroizing::new([0u8; 32]);
    hk.expand(ENC_INFO, &mut *enc_key).expect("32 bytes is valid");
    hk.expand(MAC_INFO, &mut *mac_key).expect("32 bytes is valid");
    (enc_key, mac_key)
}

fn compute_mac(mac_key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Vec<u8> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key).expect("HMAC accepts any key length");
    mac.update(iv);
    mac.update(ciphertext);
    mac.finalize().into_bytes().to_vec()
}

fn verify_mac(mac_key: &[u8], iv: &[u8], ciphertext: &[u8], tag: &[u8]) -> Result<(), EnvelopeError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key).map_err(|_| EnvelopeError::Integrity)?;
    mac.update(iv);
    mac.update(ciphertext);
    // verify_slice compares in constant time.
    mac.verify_slice(tag).map_err(|_| EnvelopeError::Integrity)
}

/// Wraps the message key for the recipient: X25519 ECDH with an ephemeral
/// keypair, HKDF bound to both public keys, then AEAD.
fn wrap_key(message_key: &[u8], recipient: &RecipientKey) -> Result<Vec<u8>, EnvelopeError> {
    let mut eph_bytes = random_bytes::<32>()?;
    let eph_secret = StaticSecret::from(eph_bytes);
    eph_bytes.zeroize();
    let eph_public = PublicKey::from(&eph_secret);

    let shared = eph_secret.diffie_hellman(&recipient.0);
    if !shared.was_contributory() {
        return Err(EnvelopeError::Encryption {
            message: "recipient key is a low-order point".into(),
            context: None,
        });
    }
    let kek = derive_wrap_key(shared.as_bytes(), &eph_public, &recipient.0);

    let nonce = random_bytes::<WRAP_NONCE_LEN>()?;
    let cipher = ChaCha20Poly1305::new_from_slice(kek.as_slice()).map_err(|_| {
        EnvelopeError::Encryption { message: "bad wrap key length".into(), context: None }
    })?;
    let wrapped = cipher.encrypt(Nonce::from_slice(&nonce), message_key).map_err(|_| {
        EnvelopeError::Encryption { message: "key wrap failed".into(), context: None }
    })?;

    let mut out = Vec::with_capacity(WRAPPED_KEY_LEN);
    out.extend_from_slice(eph_public.as_bytes());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&wrapped);
    Ok(out)
}

fn unwrap_key(
    wrapped_key: &[u8],
    identity: &IdentityKey,
) -> Result<Zeroizing<Vec<u8>>, EnvelopeError> {
    if wrapped_key.len() != WRAPPED_KEY_LEN {
        return Err(EnvelopeError::Integrity);
    }
    let (eph_pub_bytes, rest) = wrapped_key.split_at(KEY_LEN);
    let (nonce, wrapped) = rest.split_at(WRAP_NONCE_LEN);

    let eph_pub: [u8; 32] = eph_pub_bytes.try_into().map_err(|_| EnvelopeError::Integrity)?;
    let eph_public = PublicKey::from(eph_pub);

    let shared = identity.0.diffie_hellman(&eph_public);
    if !shared.was_contributory() {
        return Err(EnvelopeError::Integrity);
    }
    let kek = derive_wrap_key(shared.as_bytes(), &eph_public, &PublicKey::from(&identity.0));

    let cipher =
        ChaCha20Poly1305::new_from_slice(kek.as_slice()).map_err(|_| EnvelopeError::Integrity)?;
    let message_key = cipher
        .decrypt(Nonce::from_slice(nonce), wrapped)
        .map(Zeroizing::new)
        .map_err(|_| EnvelopeError::Integrity)?;
    if message_key.len() != KEY_LEN {
        return Err(EnvelopeError::Integrity);
    }
    Ok(message_key)
}

/// Binds the wrap key to the full ECDH transcript: shared secret plus both
/// public keys.
fn derive_wrap_key(
    shared: &[u8],
    eph_public: &PublicKey,
    recipient: &PublicKey,
) -> Zeroizing<[u8; 32]> {
    let mut salt = Vec::with_capacity(64);
    salt.extend_from_slice(eph_public.as_bytes());
    salt.extend_from_slice(recipient.as_bytes());

    let hk = Hkdf::<Sha256>::new(Some(&salt), shared);
    let mut kek = Zeroizing::new([0u8; 32]);
    hk.expand(WRAP_INFO, &mut *kek).expect("32 bytes is valid");
    kek
}

fn random_bytes<const N: usize>() -> Result<[u8; N], EnvelopeError> {
    let mut bytes = [0u8; N];
    getrandom::getrandom(&mut bytes).map_err(|_| EnvelopeError::Encryption {
        message: "System RNG unavailable".into(),
        context: None,
    })?;
    Ok(bytes)
}
