//! # Transport Envelope
//!
//! Single-use hybrid-encrypted messages for application-layer payload
//! protection. This is defense in depth on top of TLS, not a replacement
//! for it.
//!
//! ## Construction
//!
//! Every [`TransportEnvelope::seal`] call generates a fresh 256-bit message
//! key (per-message forward secrecy), then:
//!
//! 1. expands it with HKDF-SHA256 into an encryption key and a separate MAC
//!    key (the encryption key is never reused for authentication);
//! 2. encrypts the plaintext with ChaCha20-Poly1305 under a random IV;
//! 3. authenticates `iv‖ciphertext` with HMAC-SHA256 under the MAC key;
//! 4. wraps the message key for the recipient with X25519 ECDH (ephemeral
//!    keypair per message) + HKDF + ChaCha20-Poly1305.
//!
//! [`TransportEnvelope::open`] verifies the MAC in constant time *before*
//! any decryption. Every open failure — bad wrap, bad MAC, bad ciphertext —
//! collapses into the single [`EnvelopeError::Integrity`] value so the
//! caller cannot be used as a padding or MAC oracle. Unknown wire versions
//! fail closed with [`EnvelopeError::UnsupportedVersion`]; there is no
//! implicit downgrade.
//!
//! ## Wire format
//!
//! ```json
//! {"v":1,"iv":"<b64>","ct":"<b64>","mac":"<b64>","key":"<b64>"}
//! ```

mod engine;
mod error;
mod wire;

pub use engine::{IdentityKey, RecipientKey, TransportEnvelope};
pub use error::EnvelopeError;
pub use wire::Envelope;

pub mod prelude {
    pub use crate::engine::{IdentityKey, RecipientKey, TransportEnvelope};
    pub use crate::error::EnvelopeError;
    pub use crate::wire::Envelope;
}
