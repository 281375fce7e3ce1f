//! # Login Defense
//!
//! A standalone state machine that throttles credential-guessing attacks.
//! States cycle `Normal → ChallengeRequired → Locked` and back; `Locked`
//! always expires.
//!
//! The machine is consulted *before* a credential check leaves the client:
//! while locked, [`LoginDefense::authorize`] rejects synchronously with the
//! remaining wait, so no network round-trip happens at all. Escalation to a
//! challenge requires a server-issued, single-use token — an incorrect
//! solution both counts as a failure and burns the token, so challenges can
//! never be replayed.
//!
//! One logical instance exists per browsing context. Counters are not
//! synchronized across contexts; server-side throttling remains the
//! authoritative backstop.

mod error;
mod machine;

pub use error::DefenseError;
pub use machine::{Challenge, DefenseState, LoginDefense};

pub mod prelude {
    pub use crate::error::DefenseError;
    pub use crate::machine::{Challenge, DefenseState, LoginDefense};
}
