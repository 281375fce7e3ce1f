//! Convenience re-exports for downstream crates.

pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::{
    CipherSuite, ConfigError, CryptoConfig, DefenseConfig, PostLockout, RetryConfig,
    SecurityConfig, load_config,
};
pub use crate::domain::{Namespace, StorageTier};
pub use crate::safe_nanoid;
