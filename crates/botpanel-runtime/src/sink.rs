//! Rendering boundary.
//!
//! The pipelines hand finished values to a [`RenderSink`] and never wait on
//! it.  A UI, a headless logger or a test can sit behind the trait;
//! [`ChannelSink`] is the usual adapter, forwarding every value as a
//! [`RenderUpdate`] over an unbounded channel to whoever draws.

use botpanel_perception::FrameGraph;
use image::{GrayImage, RgbImage};
use tokio::sync::mpsc;
use tracing::debug;

/// Receives rendered values.  Calls are fire-and-forget and must not block.
pub trait RenderSink: Send + Sync {
    /// Fused camera frame with the scan overlay.
    fn display_rgb(&self, frame: RgbImage);
    /// Thresholded depth mask.
    fn display_depth(&self, mask: GrayImage);
    /// Battery fraction in `[0.0, 1.0]`.
    fn display_battery(&self, fraction: f64);
    /// Frame graph accumulated from the first TF messages.
    fn display_frames(&self, graph: FrameGraph);
}

/// One value for the rendering side.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderUpdate {
    Rgb(RgbImage),
    Depth(GrayImage),
    Battery(f64),
    Frames(FrameGraph),
}

impl RenderUpdate {
    pub fn kind(&self) -> &'static str {
        match self {
            RenderUpdate::Rgb(_) => "rgb",
            RenderUpdate::Depth(_) => "depth",
            RenderUpdate::Battery(_) => "battery",
            RenderUpdate::Frames(_) => "frames",
        }
    }
}

/// Forwards every displayed value to an mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<RenderUpdate>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RenderUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, update: RenderUpdate) {
        let kind = update.kind();
        if self.tx.send(update).is_err() {
            debug!(kind, "render receiver gone; update dropped");
        }
    }
}

impl RenderSink for ChannelSink {
    fn display_rgb(&self, frame: RgbImage) {
        self.forward(RenderUpdate::Rgb(frame));
    }

    fn display_depth(&self, mask: GrayImage) {
        self.forward(RenderUpdate::Depth(mask));
    }

    fn display_battery(&self, fraction: f64) {
        self.forward(RenderUpdate::Battery(fraction));
    }

    fn display_frames(&self, graph: FrameGraph) {
        self.forward(RenderUpdate::Frames(graph));
    }
}
