//! Synthetic sensor feeds.
//!
//! [`SimTransport`] lets the panel run without a robot or a rosbridge
//! server.  Every opened topic gets its own timer and produces plausible
//! data for its [`MessageKind`]:
//!
//! * **Laser** – a half-circle scan of a gently moving wall, with periodic
//!   dropouts (`NaN` readings).
//! * **Camera** – a dark gradient with a bright square drifting across it,
//!   sized to fall inside the face detector's window bounds.
//! * **Depth** – `32FC1` depth, nearer towards the left of the frame.  Used
//!   for the topic configured as the depth topic.
//! * **TF** – one relation per message, cycling through a small robot frame
//!   tree.

use std::f32::consts::{FRAC_PI_2, PI};
use std::time::Duration;

use botpanel_stream::{Flow, Stream};
use botpanel_types::{
    Header, ImageMsg, LaserScan, Message, MessageKind, PanelError, TfMessage, TransformStamped,
};
use futures_util::stream::{self, StreamExt};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::transport::{TopicSpec, Transport};

const SCAN_BEAMS: usize = 181;
const SCAN_RANGE_MAX: f32 = 5.0;

/// Parent → child relations published on the simulated TF topic.
pub const SIM_FRAME_TREE: [(&str, &str); 6] = [
    ("map", "odom"),
    ("odom", "base_link"),
    ("base_link", "base_laser"),
    ("base_link", "camera_link"),
    ("camera_link", "camera_rgb_frame"),
    ("camera_link", "camera_depth_frame"),
];

#[derive(Debug, Clone, Copy)]
enum Feed {
    Scan,
    Camera { width: u32, height: u32 },
    Depth { width: u32, height: u32 },
    Tf,
}

impl Feed {
    fn frame(self, seq: u32) -> Message {
        match self {
            Feed::Scan => Message::LaserScan(sim_scan(seq)),
            Feed::Camera { width, height } => Message::Image(sim_camera(seq, width, height)),
            Feed::Depth { width, height } => Message::Image(sim_depth(seq, width, height)),
            Feed::Tf => Message::Tf(sim_tf(seq)),
        }
    }
}

/// Generates synthetic scan, image and TF traffic.
#[derive(Debug, Clone)]
pub struct SimTransport {
    depth_topic: String,
    width: u32,
    height: u32,
    scan_period: Duration,
    image_period: Duration,
    tf_period: Duration,
}

impl SimTransport {
    /// `depth_topic` names the image topic that should carry depth data; every
    /// other image topic carries color frames.
    pub fn new(depth_topic: impl Into<String>) -> Self {
        Self {
            depth_topic: depth_topic.into(),
            width: 160,
            height: 120,
            scan_period: Duration::from_millis(100),
            image_period: Duration::from_millis(33),
            tf_period: Duration::from_millis(50),
        }
    }

    pub fn with_image_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_periods(mut self, scan: Duration, image: Duration, tf: Duration) -> Self {
        self.scan_period = scan;
        self.image_period = image;
        self.tf_period = tf;
        self
    }

    fn feed(&self, topic: &TopicSpec) -> (Feed, Duration) {
        match topic.kind {
            MessageKind::LaserScan => (Feed::Scan, self.scan_period),
            MessageKind::Image if topic.name == self.depth_topic => (
                Feed::Depth {
                    width: self.width,
                    height: self.height,
                },
                self.image_period,
            ),
            MessageKind::Image => (
                Feed::Camera {
                    width: self.width,
                    height: self.height,
                },
                self.image_period,
            ),
            MessageKind::Tf => (Feed::Tf, self.tf_period),
        }
    }
}

impl Transport for SimTransport {
    fn name(&self) -> &str {
        "sim"
    }

    fn open(&self, topic: &TopicSpec) -> Flow<Message> {
        let (feed, period) = self.feed(topic);
        if period.is_zero() {
            return Stream::fail(PanelError::Config(format!(
                "simulated period for {} must be greater than zero",
                topic.name
            )))
            .open();
        }

        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        stream::unfold((ticker, 0u32), move |(mut ticker, seq)| async move {
            ticker.tick().await;
            Some((Ok(feed.frame(seq)), (ticker, seq.wrapping_add(1))))
        })
        .boxed()
    }
}

fn sim_scan(seq: u32) -> LaserScan {
    let increment = PI / (SCAN_BEAMS - 1) as f32;
    let phase = seq as f32 * 0.1;
    let ranges = (0..SCAN_BEAMS)
        .map(|i| {
            if (i + seq as usize) % 37 == 0 {
                f32::NAN
            } else {
                (2.0 + 0.5 * (phase + i as f32 * 0.05).sin()).min(SCAN_RANGE_MAX)
            }
        })
        .collect();

    LaserScan {
        header: Header {
            seq,
            ..Header::new("base_laser")
        },
        angle_min: -FRAC_PI_2,
        angle_max: FRAC_PI_2,
        angle_increment: increment,
        time_increment: 0.0,
        scan_time: 0.1,
        range_min: 0.1,
        range_max: SCAN_RANGE_MAX,
        ranges,
        intensities: Vec::new(),
    }
}

fn sim_camera(seq: u32, width: u32, height: u32) -> ImageMsg {
    let size = (height / 10).max(1);
    let span = width.saturating_sub(size).max(1);
    let left = seq.wrapping_mul(2) % span;
    let top = height / 3;

    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            let inside = (left..left + size).contains(&x) && (top..top + size).contains(&y);
            if inside {
                data.extend_from_slice(&[240, 240, 240]);
            } else {
                let r = (x * 64 / width.max(1)) as u8;
                let g = (y * 64 / height.max(1)) as u8;
                data.extend_from_slice(&[r, g, 40]);
            }
        }
    }

    ImageMsg {
        header: Header {
            seq,
            ..Header::new("camera_rgb_frame")
        },
        height,
        width,
        encoding: "rgb8".to_string(),
        is_bigendian: 0,
        step: width * 3,
        data,
    }
}

fn sim_depth(seq: u32, width: u32, height: u32) -> ImageMsg {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for _y in 0..height {
        for x in 0..width {
            let depth = 0.5 + 3.5 * x as f32 / width.max(1) as f32;
            data.extend_from_slice(&depth.to_le_bytes());
        }
    }

    ImageMsg {
        header: Header {
            seq,
            ..Header::new("camera_depth_frame")
        },
        height,
        width,
        encoding: "32FC1".to_string(),
        is_bigendian: 0,
        step: width * 4,
        data,
    }
}

fn sim_tf(seq: u32) -> TfMessage {
    let (parent, child) = SIM_FRAME_TREE[seq as usize % SIM_FRAME_TREE.len()];
    TfMessage {
        transforms: vec![TransformStamped::new(parent, child)],
    }
}
