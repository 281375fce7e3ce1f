//! A keyed publish/subscribe bus.
//!
//! Subscribers register interest in a single key (for the vault: one storage
//! key) and receive every event published under it. This replaces ambient
//! storage-change listeners with an explicit, typed interface: the set of
//! observable keys and the event payload type are both visible in the
//! signature of the bus.
//!
//! Channels use broadcast (fan-out) semantics with a bounded buffer; slow
//! subscribers lag and skip rather than block publishers. The
//! [`EventReceiverExt`] extension absorbs lag transparently, logging how many
//! events were skipped.
//!
//! ## Example
//! ```rust
//! use parapet_events::{KeyedBus, EventReceiverExt};
//!
//! #[derive(Debug, PartialEq)]
//! struct Changed(u64);
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus: KeyedBus<String, Changed> = KeyedBus::new();
//! let mut rx = bus.subscribe("session:token".to_owned());
//! bus.publish(&"session:token".to_owned(), Changed(1));
//! assert_eq!(rx.recv_event().await.unwrap().0, 1);
//! # }
//! ```

mod bus;
mod error;
mod receiver;

pub use bus::KeyedBus;
pub use error::EventsError;
pub use receiver::EventReceiverExt;
