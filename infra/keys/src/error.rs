//! # Key Errors
//!
//! [`KeysError`] covers entropy failures, derivation-parameter rejections,
//! and bootstrap-secret I/O.

use std::borrow::Cow;

/// A specialized error enum for key-management failures.
#[derive(Debug, thiserror::Error)]
pub enum KeysError {
    /// No secure entropy source was available.
    ///
    /// This is fatal: callers must not retry, because a host without a
    /// working RNG cannot produce keys worth using.
    #[error("Key generation error{}: {message}", format_context(.context))]
    Generation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Derivation parameters below the configured floor.
    #[error("Key derivation rejected{}: {message}", format_context(.context))]
    WeakDerivation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Requested key size outside 128/192/256 bits.
    #[error("Unsupported key size: {bits} bits")]
    UnsupportedKeySize { bits: u16 },

    /// The bootstrap secret could not be read, parsed, or written.
    #[error("Bootstrap secret error{}: {message}", format_context(.context))]
    Bootstrap { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

pub(crate) fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}
