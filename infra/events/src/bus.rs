use crate::error::EventsError;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// A safe default for channel buffers.
/// 128 is usually enough for storage change events in a single context.
const DEFAULT_CAPACITY: usize = 128;
const MIN_CAPACITY: usize = 1;

/// A thread-safe publish/subscribe bus with one broadcast channel per key.
///
/// `K` identifies a channel (for vault notifications: the namespaced storage
/// key); `E` is the event payload. Events are wrapped in [`Arc`] so fan-out
/// never clones the payload.
///
/// Publishing to a key without subscribers is a no-op; channels for keys
/// whose receivers have all dropped are reclaimed on the next publish.
#[derive(Debug)]
pub struct KeyedBus<K, E> {
    channels: Arc<RwLock<FxHashMap<K, broadcast::Sender<Arc<E>>>>>,
    capacity: usize,
}

impl<K, E> Clone for KeyedBus<K, E> {
    fn clone(&self) -> Self {
        Self { channels: Arc::clone(&self.channels), capacity: self.capacity }
    }
}

impl<K, E> Default for KeyedBus<K, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, E> KeyedBus<K, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Creates a bus with the default per-key buffer capacity.
    #[must_use]
    pub fn new() -> Self {
        Self { channels: Arc::default(), capacity: DEFAULT_CAPACITY }
    }

    /// Creates a bus with a specific per-key buffer capacity.
    ///
    /// # Errors
    /// Returns [`EventsError::InvalidCapacity`] if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Result<Self, EventsError> {
        if capacity < MIN_CAPACITY {
            return Err(EventsError::InvalidCapacity {
                message: format!("capacity must be >= {MIN_CAPACITY}").into(),
                context: None,
            });
        }
        Ok(Self { channels: Arc::default(), capacity })
    }

    /// Subscribes to events published under `key`.
    ///
    /// The channel is created on first subscription.
    pub fn subscribe(&self, key: K) -> broadcast::Receiver<Arc<E>> {
        {
            let channels = self.channels.read();
            if let Some(sender) = channels.get(&key) {
                return sender.subscribe();
            }
        }

        let mut channels = self.channels.write();
        channels
            .entry(key)
            .or_insert_with(|| {
                trace!("Initializing event channel");
                broadcast::channel::<Arc<E>>(self.capacity).0
            })
            .subscribe()
    }

    /// Publishes an event under `key`, returning the number of receivers
    /// it reached.
    pub fn publish(&self, key: &K, event: E) -> usize {
        self.publish_arc(key, Arc::new(event))
    }

    /// Publishes a shared event instance without re-wrapping.
    pub fn publish_arc(&self, key: &K, event: Arc<E>) -> usize {
        let sender = {
            let channels = self.channels.read();
            channels.get(key).cloned()
        };

        let Some(sender) = sender else {
            trace!("Event dropped: no channel for key");
            return 0;
        };

        match sender.send(event) {
            Ok(count) => {
                trace!(count, "Event dispatched");
                count
            },
            Err(_) => {
                // Every receiver is gone; reclaim the channel.
                let mut channels = self.channels.write();
                if channels.get(key).is_some_and(|s| s.receiver_count() == 0) {
                    channels.remove(key);
                }
                trace!("Event dropped: no active subscribers");
                0
            },
        }
    }

    /// Number of live channels (keys with at least one past subscriber).
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }

    /// Gracefully shuts down the bus by dropping all underlying channels.
    ///
    /// Returns the number of channels that were closed.
    #[must_use]
    pub fn shutdown(&self) -> usize {
        let mut channels = self.channels.write();
        let count = channels.len();
        channels.clear();
        count
    }
}
