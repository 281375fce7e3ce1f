//! Domain markers shared by the vault, the change bus, and the pipeline.

use serde::{Deserialize, Serialize};

/// Logical vault partition.
///
/// `Session` holds state tied to the current authenticated session and is
/// wiped on logout. `Pref` holds installation-scoped preferences that survive
/// logout. The two partitions are disjoint by construction: every persisted
/// key is prefixed with the namespace name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Session,
    Pref,
}

impl Namespace {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Pref => "pref",
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage backing for a single vault entry, chosen explicitly at write time.
///
/// `Volatile` entries live for the lifetime of the process (tab lifetime in a
/// browser context). `Persistent` entries survive restarts. The tier is a
/// tagged parameter on every write; it is never inferred from a side channel
/// such as a "remember me" flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageTier {
    Volatile,
    Persistent,
}
