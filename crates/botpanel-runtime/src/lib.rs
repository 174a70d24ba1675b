//! `botpanel-runtime` – The Control Panel
//!
//! Assembles transports, the stream engine and the per-frame transforms into
//! the running panel.
//!
//! # Modules
//!
//! - [`config`] – [`PanelConfig`][config::PanelConfig]: topics, sampling
//!   periods and detector/projection settings, loaded from TOML with
//!   `BOTPANEL_*` environment overrides.
//! - [`sink`] – the [`RenderSink`][sink::RenderSink] boundary and the
//!   channel-backed [`ChannelSink`][sink::ChannelSink].
//! - [`battery`] – battery level derived from an interval.
//! - [`pipeline`] – [`ControlPanel`][pipeline::ControlPanel], which builds
//!   the rgb, depth, frame-graph and battery pipelines and subscribes them
//!   to the sink.
//! - [`telemetry`] – `tracing` subscriber and optional OTLP export.

pub mod battery;
pub mod config;
pub mod pipeline;
pub mod sink;
pub mod telemetry;

pub use config::{PanelConfig, TopicConfig, TransportKind};
pub use pipeline::{ControlPanel, PanelHandle};
pub use sink::{ChannelSink, RenderSink, RenderUpdate};
