//! Kernel utilities shared across the security slices.
//! Keep this crate lightweight; it carries the typed configuration surface,
//! the clock abstraction, domain markers, and ergonomic helpers for IDs and
//! device fingerprints.
//!
//! ## ID generation
//! Use `safe_nanoid!` for URL-safe, unambiguous IDs (request ids, fallback
//! fingerprints):
//! ```rust
//! # use parapet_kernel::safe_nanoid;
//! let id = safe_nanoid!();
//! assert_eq!(id.len(), 12);
//! ```
//!
//! ## Config loading
//! ```rust,ignore
//! use parapet_kernel::config::{SecurityConfig, load_config};
//! let cfg: SecurityConfig = load_config(Some("parapet")).unwrap_or_default();
//! cfg.validate().unwrap();
//! ```

pub mod clock;
pub mod config;
pub mod domain;
pub mod fingerprint;
pub mod prelude;

// Alphabet excludes visually ambiguous characters (I, O, l, 0, 1).
pub const SAFE_ALPHABET: &[char; 55] = &[
    '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L',
    'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'a', 'b', 'c', 'd', 'e', 'f',
    'g', 'h', 'j', 'k', 'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

pub use nanoid::nanoid;

/// Generates an unambiguous `NanoID` (no visually confusing characters).
#[macro_export]
macro_rules! safe_nanoid {
    () => {
        $crate::nanoid!(12, $crate::SAFE_ALPHABET)
    };
    ($size:expr) => {
        $crate::nanoid!($size, $crate::SAFE_ALPHABET)
    };
}
