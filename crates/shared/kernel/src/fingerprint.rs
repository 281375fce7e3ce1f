//! Device fingerprint generation.
//!
//! Produces a stable per-installation descriptor from hardware component
//! fingerprints. Each component id is derived deterministically with
//! `machineid_rs` in SHA256 mode; the compound value is versioned so the
//! format can evolve without invalidating stored fingerprints.
//!
//! The caller stores the result once (in the `pref` vault namespace) and
//! attaches it to every exchange for server-side anomaly correlation.

use machineid_rs::{Encryption, HWIDComponent, IdBuilder};
use tracing::warn;

/// Constant salt used to derive deterministic component fingerprints.
///
/// Not a secret; it only reduces trivial precomputation. Must remain stable
/// across releases or stored fingerprints stop matching.
const KEY: &str = "parapet-device";

/// Separator used in the compound encoding.
const SEP: char = '|';

/// Encoding prefix to support forward-compatible format upgrades.
const PREFIX: &str = "v1:";

/// Prefix for the random fallback used when hardware ids are unreadable.
const RANDOM_PREFIX: &str = "v1r:";

fn build_component(component: HWIDComponent) -> Option<String> {
    IdBuilder::new(Encryption::SHA256).add_component(component).build(KEY).ok()
}

/// Generates the compound device fingerprint.
///
/// Format: `v1:<system_id>|<mac>` from hardware components, or
/// `v1r:<random>` when the hardware cannot be read (containerized or
/// stripped-down environments). The random form is only stable once the
/// caller persists it; generate once, store, and reuse.
///
/// Avoid logging the returned value in plaintext.
#[must_use]
pub fn generate() -> String {
    match (build_component(HWIDComponent::SystemID), build_component(HWIDComponent::MacAddress)) {
        (Some(system_id), Some(mac)) => format!("{PREFIX}{system_id}{SEP}{mac}"),
        _ => {
            warn!("Hardware fingerprint unavailable; falling back to a random installation id");
            format!("{RANDOM_PREFIX}{}", crate::safe_nanoid!(21))
        },
    }
}

/// Returns `true` for any fingerprint this module could have produced.
#[must_use]
pub fn is_valid(fingerprint: &str) -> bool {
    fingerprint.starts_with(PREFIX) || fingerprint.starts_with(RANDOM_PREFIX)
}
