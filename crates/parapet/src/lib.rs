//! Facade crate for the Parapet client-side security core.
//! Re-exports the component crates and aggregates their wiring.
//! Keep this crate thin: it composes other crates, not business logic.
//!
//! ## Usage
//! - Build a [`SecurityCore`] at application startup (`SecurityCore::init`
//!   for in-memory state, [`SecurityCore::init_persistent`] to keep the
//!   bootstrap secret and preference entries across restarts).
//! - Wire a [`pipeline::RequestPipeline`] over the application's HTTP
//!   transport with [`SecurityCore::pipeline_builder`].
//! - Call [`SecurityCore::logout`] to tear the session down; the `pref`
//!   namespace survives.

mod core;

pub use crate::core::{CoreError, SecurityCore};

pub use parapet_defense as defense;
pub use parapet_envelope as envelope;
pub use parapet_events as events;
pub use parapet_kernel as kernel;
pub use parapet_keys as keys;
pub use parapet_pipeline as pipeline;
pub use parapet_vault as vault;

pub mod prelude {
    pub use crate::core::{CoreError, SecurityCore};
    pub use parapet_defense::prelude::*;
    pub use parapet_envelope::prelude::*;
    pub use parapet_kernel::prelude::*;
    pub use parapet_keys::prelude::*;
    pub use parapet_pipeline::prelude::*;
    pub use parapet_vault::prelude::*;
}
