//! Headless, topic-keyed publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.  Channels are created lazily the first time a topic name is
//! published to or subscribed on.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use botpanel_stream::Stream;
use botpanel_types::{Envelope, Message, PanelError};
use tokio::sync::broadcast;
use tracing::trace;

/// Default channel capacity (number of buffered envelopes before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    capacity: usize,
    topics: Arc<RwLock<HashMap<String, broadcast::Sender<Envelope>>>>,
}

impl EventBus {
    /// Create a new bus.  `capacity` is applied to every topic channel
    /// independently.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Publish `message` on `topic`.
    ///
    /// Returns the number of active receivers that were handed the envelope.
    /// Returns `Ok(0)` when nobody is listening (this is a normal condition,
    /// not an error).
    pub fn publish(&self, topic: &str, message: Message) -> Result<usize, PanelError> {
        let sender = self.sender(topic)?;
        match sender.send(Envelope::new(topic, message)) {
            Ok(n) => Ok(n),
            Err(broadcast::error::SendError(_)) => {
                trace!(topic, "published with no subscribers");
                Ok(0)
            }
        }
    }

    /// Subscribe to every envelope published on `topic` from now on.
    pub fn subscribe(&self, topic: &str) -> Result<broadcast::Receiver<Envelope>, PanelError> {
        Ok(self.sender(topic)?.subscribe())
    }

    /// A cold [`Stream`] over `topic`: each subscription gets its own
    /// receiver.
    pub fn stream(&self, topic: &str) -> Result<Stream<Envelope>, PanelError> {
        Ok(Stream::from_broadcast(self.sender(topic)?))
    }

    /// Names of every topic that has been used so far.
    pub fn topics(&self) -> Vec<String> {
        self.topics
            .read()
            .map(|topics| topics.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// The sender behind `topic`, creating the channel if needed.
    pub fn sender(&self, topic: &str) -> Result<broadcast::Sender<Envelope>, PanelError> {
        if let Some(sender) = self
            .topics
            .read()
            .map_err(|_| PanelError::Channel("event bus lock poisoned".to_string()))?
            .get(topic)
        {
            return Ok(sender.clone());
        }

        let mut topics = self
            .topics
            .write()
            .map_err(|_| PanelError::Channel("event bus lock poisoned".to_string()))?;
        let sender = topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        Ok(sender.clone())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
