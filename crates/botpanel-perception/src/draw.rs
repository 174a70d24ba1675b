//! Raster drawing primitives.
//!
//! All primitives clip against the image bounds: geometry may start, end or
//! lie entirely outside the surface, and only the visible pixels are
//! touched.

use image::{Rgb, RgbImage};

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

fn put(image: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && x < i64::from(image.width()) && y < i64::from(image.height()) {
        image.put_pixel(x as u32, y as u32, color);
    }
}

/// Liang–Barsky clip of the segment `from → to` against
/// `[0, max_x] × [0, max_y]`.
fn clip(from: (f64, f64), to: (f64, f64), max_x: f64, max_y: f64) -> Option<((f64, f64), (f64, f64))> {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;

    for (p, q) in [
        (-dx, from.0),
        (dx, max_x - from.0),
        (-dy, from.1),
        (dy, max_y - from.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return None;
        }
    }

    Some((
        (from.0 + t0 * dx, from.1 + t0 * dy),
        (from.0 + t1 * dx, from.1 + t1 * dy),
    ))
}

/// Draw a one-pixel line between two points.
pub fn draw_line(image: &mut RgbImage, from: (f64, f64), to: (f64, f64), color: Rgb<u8>) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || ![from.0, from.1, to.0, to.1].iter().all(|v| v.is_finite()) {
        return;
    }
    let Some((a, b)) = clip(from, to, f64::from(width - 1), f64::from(height - 1)) else {
        return;
    };

    // Bresenham between the clipped, rounded endpoints.
    let (mut x, mut y) = (a.0.round() as i64, a.1.round() as i64);
    let (x1, y1) = (b.0.round() as i64, b.1.round() as i64);
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put(image, x, y, color);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Draw the one-pixel outline of `rect`.
pub fn draw_rect(image: &mut RgbImage, rect: Rect, color: Rgb<u8>) {
    if rect.width == 0 || rect.height == 0 {
        return;
    }
    let left = f64::from(rect.x);
    let top = f64::from(rect.y);
    let right = left + f64::from(rect.width - 1);
    let bottom = top + f64::from(rect.height - 1);

    draw_line(image, (left, top), (right, top), color);
    draw_line(image, (right, top), (right, bottom), color);
    draw_line(image, (right, bottom), (left, bottom), color);
    draw_line(image, (left, bottom), (left, top), color);
}

/// Fill a disc of `radius` pixels around `center`.
pub fn fill_circle(image: &mut RgbImage, center: (i64, i64), radius: i64, color: Rgb<u8>) {
    let radius = radius.max(0);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put(image, center.0 + dx, center.1 + dy, color);
            }
        }
    }
}
