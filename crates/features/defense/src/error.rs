//! # Defense Errors

/// A specialized error enum for client-side attempt gating.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefenseError {
    /// The machine is locked. Returned synchronously, with no network
    /// round-trip; `retry_after_ms` drives the UI countdown.
    #[error("Locked out: retry in {retry_after_ms} ms")]
    LockedOut { retry_after_ms: u64 },

    /// A challenge is mandatory and no unused server-issued token is
    /// registered. Fetch a fresh challenge before retrying.
    #[error("Challenge required before the next attempt")]
    ChallengeRequired,
}
