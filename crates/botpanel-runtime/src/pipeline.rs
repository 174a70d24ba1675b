//! [`ControlPanel`] – wires sensor topics to the rendering sink.
//!
//! Four independent pipelines are built from one [`Transport`]:
//!
//! | Pipeline | Flow | Sink call |
//! |---|---|---|
//! | `rgb` | camera → raster → sample → face overlay, joined with the latest scan → scan projection | [`RenderSink::display_rgb`] |
//! | `depth` | depth image → threshold mask → sample | [`RenderSink::display_depth`] |
//! | `frames` | first `tf_fold_bound` TF messages → frame graph (once) | [`RenderSink::display_frames`] |
//! | `battery` | interval → battery fraction | [`RenderSink::display_battery`] |
//!
//! Each pipeline is its own subscription, so a failure in one (for example
//! a camera frame in an unsupported encoding) ends only that pipeline.  The
//! streams are cold: nothing is requested from the transport until
//! [`ControlPanel::start`].

use std::sync::Arc;

use botpanel_middleware::{TopicSpec, Transport, typed_topic};
use botpanel_perception::convert::{depth_mask, image_to_raster};
use botpanel_perception::{DetectionToggle, FaceOverlayGate, FrameGraph, RegionDetector, project};
use botpanel_stream::{Observer, Stream, Subscription, combine_latest};
use botpanel_types::{ImageMsg, LaserScan, Message, MessageKind, PanelError, TfMessage};
use image::{GrayImage, RgbImage};
use tracing::{debug, error, info, warn};

use crate::battery::battery_level;
use crate::config::PanelConfig;
use crate::sink::RenderSink;

// ─────────────────────────────────────────────────────────────────────────────
// Control panel
// ─────────────────────────────────────────────────────────────────────────────

/// Builds and starts the panel pipelines.
pub struct ControlPanel {
    config: PanelConfig,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn RenderSink>,
    gate: FaceOverlayGate,
}

impl ControlPanel {
    /// The detection toggle starts in `config.detection_enabled`.
    pub fn new(
        config: PanelConfig,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn RenderSink>,
        detector: Arc<dyn RegionDetector>,
    ) -> Self {
        let toggle = DetectionToggle::new(config.detection_enabled);
        let gate = FaceOverlayGate::new(detector, toggle, config.detection);
        Self {
            config,
            transport,
            sink,
            gate,
        }
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    /// Handle for switching face detection on and off while running.
    pub fn detection_toggle(&self) -> DetectionToggle {
        self.gate.toggle().clone()
    }

    fn topic<T>(&self, name: &str, kind: MessageKind) -> Stream<T>
    where
        T: TryFrom<Message, Error = PanelError> + Send + 'static,
    {
        typed_topic(Arc::clone(&self.transport), TopicSpec::new(name, kind))
    }

    // ── Individual pipelines ────────────────────────────────────────────────

    pub fn laser_stream(&self) -> Stream<LaserScan> {
        self.topic(&self.config.topics.laser, MessageKind::LaserScan)
    }

    /// Camera frames, sampled and passed through the face overlay.
    pub fn camera_stream(&self) -> Stream<RgbImage> {
        let gate = self.gate.clone();
        self.topic::<ImageMsg>(&self.config.topics.camera, MessageKind::Image)
            .flat_map(|msg| image_to_raster(&msg).map(Some))
            .sample(self.config.camera_sample_period())
            .map(move |frame| gate.apply(frame))
    }

    /// Camera frames with the latest scan drawn on top.
    ///
    /// Emits once both inputs have produced a value, then on every new
    /// value from either side.  A projection failure is logged and the
    /// frame is shown without the overlay.
    pub fn fused_stream(&self) -> Stream<RgbImage> {
        let projection = self.config.projection;
        combine_latest(
            self.laser_stream(),
            self.camera_stream(),
            move |scan: &LaserScan, frame: &RgbImage| {
                let mut fused = frame.clone();
                match project(scan, &mut fused, &projection) {
                    Ok(stats) => debug!(
                        drawn = stats.drawn,
                        skipped = stats.skipped,
                        filtered = stats.filtered,
                        "scan projected"
                    ),
                    Err(e) => warn!(error = %e, "scan projection failed; showing bare frame"),
                }
                fused
            },
        )
    }

    pub fn depth_stream(&self) -> Stream<GrayImage> {
        let threshold = self.config.depth_threshold;
        self.topic::<ImageMsg>(&self.config.topics.depth, MessageKind::Image)
            .flat_map(move |msg| depth_mask(&msg, threshold).map(Some))
            .sample(self.config.depth_sample_period())
    }

    /// A single frame graph built from the first `tf_fold_bound` TF messages.
    pub fn frame_graph_stream(&self) -> Stream<FrameGraph> {
        self.topic::<TfMessage>(&self.config.topics.tf, MessageKind::Tf)
            .take(self.config.tf_fold_bound)
            .collect(FrameGraph::new, |graph, tf| graph.merge_tf(&tf))
    }

    pub fn battery_stream(&self) -> Stream<f64> {
        battery_level(self.config.battery_period())
    }

    // ── Startup ─────────────────────────────────────────────────────────────

    /// Subscribe every pipeline to the sink.  Must be called inside a Tokio
    /// runtime.
    pub fn start(&self) -> PanelHandle {
        info!(
            transport = self.transport.name(),
            laser = %self.config.topics.laser,
            camera = %self.config.topics.camera,
            depth = %self.config.topics.depth,
            tf = %self.config.topics.tf,
            "starting control panel"
        );

        let sink = Arc::clone(&self.sink);
        let rgb = self
            .fused_stream()
            .subscribe_with(PipelineObserver::new("rgb", move |frame| sink.display_rgb(frame)));

        let sink = Arc::clone(&self.sink);
        let depth = self
            .depth_stream()
            .subscribe_with(PipelineObserver::new("depth", move |mask| sink.display_depth(mask)));

        let sink = Arc::clone(&self.sink);
        let frames = self
            .frame_graph_stream()
            .subscribe_with(PipelineObserver::new("frames", move |graph: FrameGraph| {
                info!(
                    frames = graph.frames().len(),
                    relations = graph.relation_count(),
                    "frame graph complete"
                );
                sink.display_frames(graph)
            }));

        let sink = Arc::clone(&self.sink);
        let battery = self
            .battery_stream()
            .subscribe_with(PipelineObserver::new("battery", move |level| sink.display_battery(level)));

        PanelHandle {
            pipelines: vec![
                ("rgb", rgb),
                ("depth", depth),
                ("frames", frames),
                ("battery", battery),
            ],
        }
    }
}

impl std::fmt::Debug for ControlPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPanel")
            .field("config", &self.config)
            .field("transport", &self.transport.name())
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Running panel
// ─────────────────────────────────────────────────────────────────────────────

/// The running pipelines.  Dropping the handle cancels all of them.
#[derive(Debug)]
pub struct PanelHandle {
    pipelines: Vec<(&'static str, Subscription)>,
}

impl PanelHandle {
    /// Whether the named pipeline is still running.  Unknown names are
    /// reported as inactive.
    pub fn is_active(&self, pipeline: &str) -> bool {
        self.pipelines
            .iter()
            .any(|(name, sub)| *name == pipeline && sub.is_active())
    }

    /// Names of the pipelines still running.
    pub fn active(&self) -> Vec<&'static str> {
        self.pipelines
            .iter()
            .filter(|(_, sub)| sub.is_active())
            .map(|(name, _)| *name)
            .collect()
    }

    /// Cancel every pipeline and wait until each has released its
    /// upstream resources.
    pub async fn shutdown(self) {
        for (name, sub) in self.pipelines {
            sub.shutdown().await;
            debug!(pipeline = name, "pipeline stopped");
        }
        info!("control panel stopped");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Observer
// ─────────────────────────────────────────────────────────────────────────────

/// Delivers values to the sink and logs how the pipeline ended.
struct PipelineObserver<F> {
    name: &'static str,
    deliver: F,
    delivered: u64,
}

impl<F> PipelineObserver<F> {
    fn new(name: &'static str, deliver: F) -> Self {
        Self {
            name,
            deliver,
            delivered: 0,
        }
    }
}

impl<T, F> Observer<T> for PipelineObserver<F>
where
    F: FnMut(T) + Send + 'static,
{
    fn on_next(&mut self, value: T) {
        self.delivered += 1;
        (self.deliver)(value);
    }

    fn on_error(&mut self, error: PanelError) {
        error!(
            pipeline = self.name,
            delivered = self.delivered,
            error = %error,
            "pipeline failed"
        );
    }

    fn on_complete(&mut self) {
        info!(pipeline = self.name, delivered = self.delivered, "pipeline completed");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
