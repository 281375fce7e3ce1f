use serde::{Deserialize, Serialize};

use crate::error::EnvelopeError;

/// A sealed message: ciphertext, integrity tag, and wrapped message key.
///
/// Produced fresh for every logical message. Serialized field names match
/// the wire contract: `v`, `iv`, `ct`, `mac`, `key`, with binary fields as
/// Base64 strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    /// Wire format version for forward-compatible negotiation.
    #[serde(rename = "v")]
    pub version: u8,
    /// Random IV the payload was encrypted under.
    #[serde(rename = "iv", with = "bytes_as_base64")]
    pub iv: Vec<u8>,
    /// Symmetric ciphertext of the payload.
    #[serde(rename = "ct", with = "bytes_as_base64")]
    pub ciphertext: Vec<u8>,
    /// HMAC over `iv‖ciphertext` under a MAC-specific derived key.
    #[serde(rename = "mac", with = "bytes_as_base64")]
    pub mac: Vec<u8>,
    /// Ephemeral message key, asymmetrically wrapped for the remote party.
    #[serde(rename = "key", with = "bytes_as_base64")]
    pub wrapped_key: Vec<u8>,
}

impl Envelope {
    /// Serializes to the JSON wire form.
    ///
    /// # Errors
    /// Returns [`EnvelopeError::Encoding`] if serialization fails.
    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(EnvelopeError::from)
    }

    /// Parses the JSON wire form.
    ///
    /// # Errors
    /// Returns [`EnvelopeError::Encoding`] if the JSON is malformed or a
    /// binary field holds invalid Base64.
    pub fn from_json(json: &str) -> Result<Self, EnvelopeError> {
        serde_json::from_str(json).map_err(EnvelopeError::from)
    }
}

/// Helper module for transparently serializing byte buffers to Base64 strings.
mod bytes_as_base64 {
    use base64::{Engine as _, engine::general_purpose};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serializes a byte vector into a Base64 string without padding.
    pub(super) fn serialize<S: Serializer>(v: &Vec<u8>, s: S) -> Result<S::Ok, S::Error> {
        let mut buf = String::with_capacity((v.len() * 4).div_ceil(3));
        general_purpose::STANDARD_NO_PAD.encode_string(v, &mut buf);
        String::serialize(&buf, s)
    }

    /// Deserializes a Base64 string back into a byte vector.
    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        match general_purpose::STANDARD_NO_PAD.decode(String::deserialize(d)?) {
            Ok(bytes) => Ok(bytes),
            Err(e) => Err(serde::de::Error::custom(format!("Invalid Base64: {e}"))),
        }
    }
}
