//! `botpanel-perception` – Per-frame transforms.
//!
//! Turns decoded sensor messages into rendering-ready rasters and
//! structures.  Everything here is synchronous and free of stream plumbing;
//! the runtime wires these functions into pipelines.
//!
//! # Modules
//!
//! - [`convert`] – [`ImageMsg`][botpanel_types::ImageMsg] → `image` rasters,
//!   plus the thresholded depth mask.
//! - [`draw`] – clipped line, rectangle and filled-circle primitives.
//! - [`scan_projector`] – projects a polar range scan onto a color frame.
//! - [`frame_graph`] – [`FrameGraph`][frame_graph::FrameGraph]: parent →
//!   children mapping built from TF relations.
//! - [`face_overlay`] – toggle-gated region detection and rectangle overlay.
//! - [`encode`] – BMP encoding for rendered rasters.

pub mod convert;
pub mod draw;
pub mod encode;
pub mod face_overlay;
pub mod frame_graph;
pub mod scan_projector;

pub use face_overlay::{BrightRegionDetector, DetectionParams, DetectionToggle, FaceOverlayGate, RegionDetector};
pub use frame_graph::{FrameGraph, FrameNode};
pub use scan_projector::{HorizonPolicy, ProjectionConfig, ProjectionStats, project};
