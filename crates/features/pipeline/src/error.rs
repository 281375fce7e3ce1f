//! # Pipeline Errors

use std::borrow::Cow;

/// A specialized error enum for dispatch failures.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The pipeline builder was missing a required collaborator.
    #[error("Invalid configuration{}: {message}", format_context(.context))]
    InvalidConfiguration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Token refresh was attempted and exhausted; the `session` vault
    /// namespace has been purged. Re-authentication navigation is the
    /// embedding application's job.
    #[error("Session expired; re-authentication required")]
    SessionExpired,

    /// The server throttled us. Never auto-retried; `retry_after_ms`
    /// carries the server's hint when one was sent.
    #[error("Rate limited{}", .retry_after_ms.map_or_else(String::new, |ms| format!("; retry after {ms} ms")))]
    RateLimited { retry_after_ms: Option<u64> },

    /// Transport failure that survived the backoff policy.
    #[error(transparent)]
    Transport(#[from] crate::transport::TransportError),

    /// Envelope sealing or opening failed.
    #[error(transparent)]
    Envelope(#[from] parapet_envelope::EnvelopeError),

    /// The vault rejected a write.
    #[error(transparent)]
    Vault(#[from] parapet_vault::VaultError),

    /// A request or response body could not be encoded or decoded.
    #[error("Body encoding error: {source}")]
    Encoding {
        #[from]
        source: serde_json::Error,
    },
}

pub(crate) fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}
