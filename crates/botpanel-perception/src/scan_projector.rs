//! Scan Projector.
//!
//! Overlays a planar range scan onto a color frame.  The sensor is placed at
//! the bottom-center of the image and every forward-facing reading is drawn
//! as a beam from there:
//!
//! ```text
//! cx = width / 2            (integer division)
//! cy = height
//! x  = cx + (width / 2) · range · cos(θ + π/2)
//! y  = cy − (width / range_max) · range · sin(θ + π/2)
//! ```
//!
//! where θ = `angle_min + i · angle_increment` for reading `i`.  A beam is
//! drawn only when |θ| is inside the forward cone and, under
//! [`HorizonPolicy::UpperHalf`], when its end point lies in the upper half of
//! the frame.  Readings that are not finite or fall outside
//! `[range_min, range_max]` are skipped.
//!
//! # Example
//!
//! ```rust
//! use botpanel_perception::scan_projector::beam_endpoint;
//!
//! // Straight ahead, half of the maximum range, on a 640×480 frame.
//! let (x, y) = beam_endpoint(640, 480, 10.0, 5.0, 0.0);
//! assert!((x - 320.0).abs() < 1e-9);
//! assert!((y - 160.0).abs() < 1e-9);
//! ```

use std::f64::consts::FRAC_PI_2;

use botpanel_types::{LaserScan, PanelError};
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::draw::{draw_line, fill_circle};

/// Beam color.
pub const BEAM_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
/// Sensor marker color.
pub const MARKER_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
/// Sensor marker radius in pixels.
pub const MARKER_RADIUS: i64 = 2;

/// Whether beams ending below the middle of the frame are drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizonPolicy {
    /// Draw every beam inside the cone.
    #[default]
    Unfiltered,
    /// Only draw beams whose end point satisfies `y < height / 2`.
    UpperHalf,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Beams with |θ| at or above this angle (radians) are not drawn.
    pub cone_half_angle: f32,
    pub horizon: HorizonPolicy,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            cone_half_angle: 0.3,
            horizon: HorizonPolicy::Unfiltered,
        }
    }
}

/// What happened to the readings of one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionStats {
    /// Beams drawn.
    pub drawn: usize,
    /// Readings rejected as invalid (non-finite or out of range).
    pub skipped: usize,
    /// Valid readings outside the cone or below the horizon.
    pub filtered: usize,
}

/// End point of a beam of length `range` at bearing `angle` on a
/// `width × height` frame.
pub fn beam_endpoint(width: u32, height: u32, range_max: f32, range: f32, angle: f32) -> (f64, f64) {
    let cx = f64::from(width / 2);
    let cy = f64::from(height);
    let range = f64::from(range);
    let bearing = f64::from(angle) + FRAC_PI_2;

    let x = cx + f64::from(width / 2) * range * bearing.cos();
    let y = cy - (f64::from(width) / f64::from(range_max)) * range * bearing.sin();
    (x, y)
}

/// Draw `scan` onto `image` in place.
///
/// Fails with [`PanelError::Geometry`] only for a zero-sized image; bad
/// individual readings are counted in the returned stats instead.
pub fn project(
    scan: &LaserScan,
    image: &mut RgbImage,
    config: &ProjectionConfig,
) -> Result<ProjectionStats, PanelError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(PanelError::Geometry(format!(
            "cannot project onto a {width}x{height} image"
        )));
    }

    let origin = (f64::from(width / 2), f64::from(height));
    let usable_max = scan.range_max.is_finite() && scan.range_max > 0.0;
    let mut stats = ProjectionStats::default();

    for (index, &range) in scan.ranges.iter().enumerate() {
        if !usable_max || !scan.is_valid_range(range) {
            stats.skipped += 1;
            continue;
        }

        let angle = scan.angle_at(index);
        if angle.abs() >= config.cone_half_angle {
            stats.filtered += 1;
            continue;
        }

        let end = beam_endpoint(width, height, scan.range_max, range, angle);
        if config.horizon == HorizonPolicy::UpperHalf && end.1 >= f64::from(height) / 2.0 {
            stats.filtered += 1;
            continue;
        }

        draw_line(image, origin, end, BEAM_COLOR);
        stats.drawn += 1;
    }

    fill_circle(
        image,
        (i64::from(width / 2), i64::from(height)),
        MARKER_RADIUS,
        MARKER_COLOR,
    );
    Ok(stats)
}
