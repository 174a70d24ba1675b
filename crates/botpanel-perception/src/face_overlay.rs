//! Face-Overlay Gate.
//!
//! When detection is switched on, every camera frame is converted to
//! intensity, handed to a [`RegionDetector`], and each detected region is
//! outlined in green on the original frame.  When it is off, frames pass
//! through untouched.
//!
//! The switch is a [`DetectionToggle`]: the UI side flips it, the pipeline
//! reads it exactly once per frame, so one frame is never half-annotated.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use botpanel_types::PanelError;
use image::{GrayImage, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::convert::to_gray;
use crate::draw::{Rect, draw_rect};

/// Outline color for detected regions.
pub const REGION_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Detector tuning.  The window bounds are derived from the frame size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    /// Window growth step between scales.  Read by multi-scale cascade
    /// backends; [`BrightRegionDetector`] searches every size at once.
    pub scale_factor: f64,
    /// Bright 4-neighbours a bright pixel needs to join a region.  Drops
    /// speckle and one-pixel spurs from region outlines.
    pub min_neighbors: u32,
    /// Intensity above which a pixel counts as bright for
    /// [`BrightRegionDetector`].
    pub brightness_threshold: u8,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.15,
            min_neighbors: 2,
            brightness_threshold: 200,
        }
    }
}

/// Smallest and largest accepted region, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,
}

impl WindowBounds {
    /// Minimum `h/12 × h/12`, maximum `h/8` wide by `w/8` tall.
    pub fn for_frame(width: u32, height: u32) -> Self {
        Self {
            min_width: height / 12,
            min_height: height / 12,
            max_width: height / 8,
            max_height: width / 8,
        }
    }

    pub fn accepts(&self, rect: &Rect) -> bool {
        (self.min_width..=self.max_width).contains(&rect.width)
            && (self.min_height..=self.max_height).contains(&rect.height)
    }
}

/// Finds regions of interest in an intensity image.
pub trait RegionDetector: Send + Sync {
    fn detect(&self, gray: &GrayImage, params: &DetectionParams) -> Result<Vec<Rect>, PanelError>;
}

/// Finds 4-connected components of bright pixels whose bounding box fits
/// the frame's [`WindowBounds`].
///
/// A pixel belongs to a region when it is above `brightness_threshold` and
/// has at least `min_neighbors` such pixels among its 4-neighbours.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrightRegionDetector;

impl RegionDetector for BrightRegionDetector {
    fn detect(&self, gray: &GrayImage, params: &DetectionParams) -> Result<Vec<Rect>, PanelError> {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return Err(PanelError::Detection(format!(
                "cannot run detection on a {width}x{height} frame"
            )));
        }

        let bounds = WindowBounds::for_frame(width, height);
        let neighbours = |x: u32, y: u32| {
            [
                (x.wrapping_sub(1), y),
                (x + 1, y),
                (x, y.wrapping_sub(1)),
                (x, y + 1),
            ]
            .into_iter()
            .filter(move |&(nx, ny)| nx < width && ny < height)
        };
        let lit = |x: u32, y: u32| gray.get_pixel(x, y).0[0] > params.brightness_threshold;
        let bright = |x: u32, y: u32| {
            lit(x, y)
                && neighbours(x, y).filter(|&(nx, ny)| lit(nx, ny)).count()
                    >= params.min_neighbors as usize
        };
        let mut visited = vec![false; (width * height) as usize];
        let mut regions = Vec::new();
        let mut stack = Vec::new();

        for start_y in 0..height {
            for start_x in 0..width {
                let start = (start_y * width + start_x) as usize;
                if visited[start] || !bright(start_x, start_y) {
                    continue;
                }

                visited[start] = true;
                stack.push((start_x, start_y));
                let (mut min_x, mut min_y, mut max_x, mut max_y) = (start_x, start_y, start_x, start_y);

                while let Some((x, y)) = stack.pop() {
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);

                    for (nx, ny) in neighbours(x, y) {
                        let index = (ny * width + nx) as usize;
                        if !visited[index] && bright(nx, ny) {
                            visited[index] = true;
                            stack.push((nx, ny));
                        }
                    }
                }

                let rect = Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1);
                if bounds.accepts(&rect) {
                    regions.push(rect);
                }
            }
        }
        Ok(regions)
    }
}

/// Shared on/off switch for detection.  Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct DetectionToggle(Arc<AtomicBool>);

impl DetectionToggle {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Flip the switch and return the new state.
    pub fn toggle(&self) -> bool {
        !self.0.fetch_xor(true, Ordering::AcqRel)
    }
}

/// Applies detection and overlay to frames while the toggle is on.
#[derive(Clone)]
pub struct FaceOverlayGate {
    detector: Arc<dyn RegionDetector>,
    toggle: DetectionToggle,
    params: DetectionParams,
}

impl FaceOverlayGate {
    pub fn new(detector: Arc<dyn RegionDetector>, toggle: DetectionToggle, params: DetectionParams) -> Self {
        Self {
            detector,
            toggle,
            params,
        }
    }

    pub fn toggle(&self) -> &DetectionToggle {
        &self.toggle
    }

    /// Annotate `frame` if detection is on.  A detector failure is logged
    /// and the frame is returned unmodified.
    pub fn apply(&self, mut frame: RgbImage) -> RgbImage {
        if !self.toggle.is_enabled() {
            return frame;
        }

        match self.detector.detect(&to_gray(&frame), &self.params) {
            Ok(regions) => {
                for region in regions {
                    draw_rect(&mut frame, region, REGION_COLOR);
                }
            }
            Err(error) => warn!(error = %error, "region detection failed; frame left unannotated"),
        }
        frame
    }
}

impl std::fmt::Debug for FaceOverlayGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaceOverlayGate")
            .field("toggle", &self.toggle)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
