//! The transport seam.
//!
//! The panel never speaks directly to ROS or WebSockets.  It asks a
//! [`Transport`] for a topic and gets back a flow of [`Message`] values;
//! [`typed_topic`] narrows that flow to the concrete message type a pipeline
//! expects.
//!
//! # Overview
//!
//! - [`Transport`] – the trait every backend implements.
//! - [`BusTransport`] – reads from an in-process [`EventBus`].
//! - [`RosbridgeTransport`][crate::rosbridge::RosbridgeTransport] – talks to
//!   a `rosbridge_server` over a WebSocket.
//! - [`SimTransport`][crate::sim::SimTransport] – generates synthetic feeds.

use std::sync::Arc;

use botpanel_stream::{Flow, Source, Stream};
use botpanel_types::{Message, MessageKind, PanelError};
use futures_util::stream::{self, StreamExt};
use tracing::debug;

use crate::bus::EventBus;

/// A named topic and the message type expected on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicSpec {
    pub name: String,
    pub kind: MessageKind,
}

impl TopicSpec {
    pub fn new(name: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Every external-protocol backend must implement this trait.
///
/// # Contract
///
/// `open` is called once per subscription, from the subscription's own task.
/// Dropping the returned flow must release whatever the backend acquired for
/// it.  A backend failure is reported as a [`PanelError::Transport`] item.
pub trait Transport: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Start delivering the messages published on `topic`.
    fn open(&self, topic: &TopicSpec) -> Flow<Message>;
}

struct TopicSource {
    transport: Arc<dyn Transport>,
    topic: TopicSpec,
}

impl Source<Message> for TopicSource {
    fn open(&self) -> Flow<Message> {
        debug!(transport = self.transport.name(), topic = %self.topic.name, "opening topic");
        self.transport.open(&self.topic)
    }
}

/// A cold stream of `T` read from `topic`.
///
/// A message of the wrong variant fails the stream with
/// [`PanelError::Conversion`].
pub fn typed_topic<T>(transport: Arc<dyn Transport>, topic: TopicSpec) -> Stream<T>
where
    T: TryFrom<Message, Error = PanelError> + Send + 'static,
{
    Stream::from_source(TopicSource { transport, topic }).try_map(T::try_from)
}

/// Reads topics from an in-process [`EventBus`].
#[derive(Debug, Clone, Default)]
pub struct BusTransport {
    bus: EventBus,
}

impl BusTransport {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

impl Transport for BusTransport {
    fn name(&self) -> &str {
        "bus"
    }

    fn open(&self, topic: &TopicSpec) -> Flow<Message> {
        match self.bus.stream(&topic.name) {
            Ok(envelopes) => envelopes.map(|envelope| envelope.message).open(),
            Err(error) => stream::once(async move { Err::<Message, PanelError>(error) }).boxed(),
        }
    }
}
