//! # Envelope Errors

use std::borrow::Cow;

/// A specialized error enum for envelope failures.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The envelope failed verification or decryption.
    ///
    /// Deliberately carries no detail: bad key wrap, bad MAC, and bad
    /// ciphertext are indistinguishable to the caller, which closes the
    /// door on padding/MAC oracle probing.
    #[error("Integrity check failed")]
    Integrity,

    /// The envelope declares a wire version this build does not speak.
    /// Fails closed; there is no downgrade path.
    #[error("Unsupported envelope version: {version}")]
    UnsupportedVersion { version: u8 },

    /// Sealing failed before any ciphertext was produced.
    #[error("Encryption error{}: {message}", format_context(.context))]
    Encryption { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Supplied key material is unusable (wrong length, bad encoding).
    #[error("Invalid key material{}: {message}", format_context(.context))]
    InvalidKey { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The wire JSON could not be produced or parsed.
    #[error("Envelope encoding error: {source}")]
    Encoding {
        #[from]
        source: serde_json::Error,
    },

    /// Key material could not be generated.
    #[error(transparent)]
    Keys(#[from] parapet_keys::KeysError),
}

pub(crate) fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}
