//! Key management for the security core.
//!
//! This crate owns every piece of symmetric key material in the system:
//! random session keys, passphrase-derived keys, and the process-lifetime
//! vault master key. Key bytes never leave the crate except through the
//! opaque [`SessionKey`] handle, which zeroizes itself on drop.
//!
//! ## Trust chain
//!
//! The vault master key is generated on first use and persisted as a
//! plaintext bootstrap secret (with restrictive permissions where the
//! platform supports them). This file is the weakest link in the trust
//! chain: an attacker with filesystem access to it can open the vault.
//! Hardware-backed storage is explicitly out of scope; treat the bootstrap
//! path accordingly.
//!
//! ## Example
//! ```rust
//! use parapet_keys::prelude::*;
//! use parapet_kernel::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), KeysError> {
//! let manager = KeyManager::new(CryptoConfig::default(), Arc::new(SystemClock));
//! let key = manager.generate_key(256, KeyScope::Transport)?;
//! assert_eq!(key.expose().len(), 32);
//! # Ok(())
//! # }
//! ```

mod error;
mod manager;
mod material;

pub use error::KeysError;
pub use manager::KeyManager;
pub use material::{KeyAlgorithm, KeyScope, SessionKey};

pub mod prelude {
    pub use crate::error::KeysError;
    pub use crate::manager::KeyManager;
    pub use crate::material::{KeyAlgorithm, KeyScope, SessionKey};
}
