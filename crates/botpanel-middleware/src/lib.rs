//! `botpanel-middleware` – Sensor Transports
//!
//! Gets robot topics into the stream engine without the panel caring where
//! they come from.
//!
//! # Modules
//!
//! - [`bus`] – in-process, topic-keyed publish/subscribe bus built on Tokio
//!   broadcast channels.
//! - [`transport`] – the [`Transport`] trait every backend implements, plus
//!   [`typed_topic`] which turns a topic into a typed [`Stream`][botpanel_stream::Stream].
//! - [`rosbridge`] – client for a `rosbridge_server` WebSocket.
//! - [`sim`] – synthetic sensor feeds for running the panel without a robot.

pub mod bus;
pub mod rosbridge;
pub mod sim;
pub mod transport;

pub use bus::EventBus;
pub use rosbridge::RosbridgeTransport;
pub use sim::SimTransport;
pub use transport::{BusTransport, TopicSpec, Transport, typed_topic};
