//! # Request Pipeline
//!
//! The orchestration layer between the UI and the network. Every dispatched
//! request gets a generated request id, the device fingerprint, and (unless
//! explicitly skipped) the identity token; bodies marked for encryption are
//! sealed into a transport envelope on the way out and opened on the way
//! back.
//!
//! ## Recovery behavior
//!
//! * **401** — exactly one coalesced token refresh, then one replay of the
//!   original request. Concurrent 401s funnel into a single in-flight
//!   refresh call; every waiter observes its result. A second 401 (or a
//!   failed refresh) purges the `session` vault namespace and surfaces
//!   [`PipelineError::SessionExpired`].
//! * **429** — surfaced immediately as [`PipelineError::RateLimited`] with
//!   the server's retry hint; never auto-retried.
//! * **Transient transport failures** — retried with exponential backoff up
//!   to the configured limit, then surfaced. Business-rule rejections (4xx)
//!   are never retried; they come back as ordinary responses.
//!
//! The network itself lives behind the [`Transport`] trait; the embedding
//! application adapts its HTTP client, tests plug in an in-memory double.

mod dispatch;
mod error;
mod retry;
mod session;
mod transport;

pub use dispatch::{ApiResponse, PipelineBuilder, RequestPipeline};
pub use error::PipelineError;
pub use retry::{Transient, retry_with_backoff};
pub use session::{SessionTokens, TokenStore};
pub use transport::{ApiRequest, Method, Transport, TransportError, WireRequest, WireResponse};

pub mod prelude {
    pub use crate::dispatch::{ApiResponse, PipelineBuilder, RequestPipeline};
    pub use crate::error::PipelineError;
    pub use crate::retry::{Transient, retry_with_backoff};
    pub use crate::session::{SessionTokens, TokenStore};
    pub use crate::transport::{
        ApiRequest, Method, Transport, TransportError, WireRequest, WireResponse,
    };
}
