use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Global error type spanning conversion failures, malformed geometry,
/// transport faults and configuration problems.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PanelError {
    #[error("Conversion Error: {0}")]
    Conversion(String),

    #[error("Geometry Error: {0}")]
    Geometry(String),

    #[error("Detection Error: {0}")]
    Detection(String),

    #[error("Transport Error on {topic}: {details}")]
    Transport { topic: String, details: String },

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}

/// ROS wall-clock stamp as carried on the wire (`secs` + `nsecs`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Time {
    #[serde(default)]
    pub secs: u32,
    #[serde(default)]
    pub nsecs: u32,
}

impl Time {
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            secs: u32::try_from(at.timestamp()).unwrap_or(0),
            nsecs: at.timestamp_subsec_nanos(),
        }
    }

    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// `None` when the stamp does not name a representable instant.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(i64::from(self.secs), self.nsecs).single()
    }
}

/// Standard message header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub seq: u32,
    #[serde(default)]
    pub stamp: Time,
    /// e.g. `"base_laser"`, `"camera_rgb_optical_frame"`
    #[serde(default)]
    pub frame_id: String,
}

impl Header {
    pub fn new(frame_id: impl Into<String>) -> Self {
        Self {
            seq: 0,
            stamp: Time::now(),
            frame_id: frame_id.into(),
        }
    }
}

/// A single planar range scan (`sensor_msgs/LaserScan`).
///
/// Reading `i` in [`LaserScan::ranges`] was taken at
/// `angle_min + i * angle_increment` radians.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaserScan {
    #[serde(default)]
    pub header: Header,
    pub angle_min: f32,
    #[serde(default)]
    pub angle_max: f32,
    pub angle_increment: f32,
    #[serde(default)]
    pub time_increment: f32,
    #[serde(default)]
    pub scan_time: f32,
    #[serde(default)]
    pub range_min: f32,
    pub range_max: f32,
    /// Distances in metres. Readings the sensor could not resolve arrive as
    /// JSON `null` and are stored as NaN.
    #[serde(with = "nullable_floats")]
    pub ranges: Vec<f32>,
    #[serde(default, with = "nullable_floats")]
    pub intensities: Vec<f32>,
}

impl LaserScan {
    /// Bearing of reading `index`, in radians.
    pub fn angle_at(&self, index: usize) -> f32 {
        self.angle_min + index as f32 * self.angle_increment
    }

    /// `true` when `range` is finite and inside `[range_min, range_max]`.
    pub fn is_valid_range(&self, range: f32) -> bool {
        range.is_finite() && range >= self.range_min && range <= self.range_max
    }
}

/// An uncompressed camera image (`sensor_msgs/Image`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageMsg {
    #[serde(default)]
    pub header: Header,
    pub height: u32,
    pub width: u32,
    /// Pixel layout, e.g. `"rgb8"`, `"bgr8"`, `"mono8"`.
    pub encoding: String,
    #[serde(default)]
    pub is_bigendian: u8,
    /// Row length in bytes.
    pub step: u32,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

/// Unit quaternion, `(x, y, z, w)` as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default = "unit_w")]
    pub w: f64,
}

fn unit_w() -> f64 {
    1.0
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(default)]
    pub translation: Vector3,
    #[serde(default)]
    pub rotation: Quaternion,
}

/// One parent → child frame relationship (`geometry_msgs/TransformStamped`).
///
/// The parent frame is `header.frame_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformStamped {
    #[serde(default)]
    pub header: Header,
    pub child_frame_id: String,
    #[serde(default)]
    pub transform: Transform,
}

impl TransformStamped {
    pub fn new(parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            header: Header::new(parent),
            child_frame_id: child.into(),
            transform: Transform::default(),
        }
    }

    pub fn parent_frame_id(&self) -> &str {
        &self.header.frame_id
    }
}

/// A batch of frame relationships (`tf2_msgs/TFMessage`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TfMessage {
    pub transforms: Vec<TransformStamped>,
}

impl TfMessage {
    /// Iterate the `(parent, child)` pairs carried by this message.
    pub fn relations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.transforms
            .iter()
            .map(|t| (t.parent_frame_id(), t.child_frame_id.as_str()))
    }
}

/// The message types the control panel subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    LaserScan,
    Image,
    Tf,
}

impl MessageKind {
    /// Fully-qualified ROS type name, as required by a rosbridge subscribe op.
    pub fn ros_type(self) -> &'static str {
        match self {
            MessageKind::LaserScan => "sensor_msgs/LaserScan",
            MessageKind::Image => "sensor_msgs/Image",
            MessageKind::Tf => "tf2_msgs/TFMessage",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.ros_type())
    }
}

/// Variants of data that can arrive on a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    LaserScan(LaserScan),
    Image(ImageMsg),
    Tf(TfMessage),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::LaserScan(_) => MessageKind::LaserScan,
            Message::Image(_) => MessageKind::Image,
            Message::Tf(_) => MessageKind::Tf,
        }
    }
}

fn kind_mismatch(expected: MessageKind, got: &Message) -> PanelError {
    PanelError::Conversion(format!("expected {expected}, got {}", got.kind()))
}

impl TryFrom<Message> for LaserScan {
    type Error = PanelError;

    fn try_from(message: Message) -> Result<Self, Self::Error> {
        match message {
            Message::LaserScan(scan) => Ok(scan),
            other => Err(kind_mismatch(MessageKind::LaserScan, &other)),
        }
    }
}

impl TryFrom<Message> for ImageMsg {
    type Error = PanelError;

    fn try_from(message: Message) -> Result<Self, Self::Error> {
        match message {
            Message::Image(image) => Ok(image),
            other => Err(kind_mismatch(MessageKind::Image, &other)),
        }
    }
}

impl TryFrom<Message> for TfMessage {
    type Error = PanelError;

    fn try_from(message: Message) -> Result<Self, Self::Error> {
        match message {
            Message::Tf(tf) => Ok(tf),
            other => Err(kind_mismatch(MessageKind::Tf, &other)),
        }
    }
}

/// Unified wrapper for everything routed over the in-process bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    /// e.g. `"/scan"`
    pub topic: String,
    pub message: Message,
}

impl Envelope {
    pub fn new(topic: impl Into<String>, message: Message) -> Self {
        Self {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
            topic: topic.into(),
            message,
        }
    }
}

/// `uint8[]` fields travel base64-encoded in rosbridge JSON; plain arrays are
/// accepted too.
mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Encoded(String),
        Raw(Vec<u8>),
    }

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Encoded(text) => STANDARD
                .decode(text.as_bytes())
                .map_err(serde::de::Error::custom),
            Repr::Raw(bytes) => Ok(bytes),
        }
    }
}

/// JSON has no NaN/Inf; non-finite readings are written as `null`.
mod nullable_floats {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        let wire: Vec<Option<f32>> = values
            .iter()
            .map(|v| v.is_finite().then_some(*v))
            .collect();
        wire.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        let wire: Vec<Option<f32>> = Vec::deserialize(deserializer)?;
        Ok(wire.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn laser_scan_angle_is_linear_in_index() {
        let scan = LaserScan {
            angle_min: -0.5,
            angle_increment: 0.25,
            range_max: 10.0,
            ranges: vec![1.0; 5],
            ..LaserScan::default()
        };
        assert!((scan.angle_at(0) + 0.5).abs() < f32::EPSILON);
        assert!((scan.angle_at(2) - 0.0).abs() < f32::EPSILON);
        assert!((scan.angle_at(4) - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn laser_scan_null_ranges_become_nan() {
        let json = r#"{"angle_min":0.0,"angle_increment":0.1,"range_max":5.0,"ranges":[1.5,null,2.0]}"#;
        let scan: LaserScan = serde_json::from_str(json).unwrap();
        assert_eq!(scan.ranges.len(), 3);
        assert!(scan.ranges[1].is_nan());
        assert!(!scan.is_valid_range(scan.ranges[1]));
        assert!(scan.is_valid_range(scan.ranges[0]));
        assert!(!scan.is_valid_range(7.0));
    }

    #[test]
    fn image_data_decodes_from_base64() {
        let json = r#"{"height":1,"width":2,"encoding":"mono8","step":2,"data":"AP8="}"#;
        let image: ImageMsg = serde_json::from_str(json).unwrap();
        assert_eq!(image.data, vec![0x00, 0xFF]);

        let back = serde_json::to_string(&image).unwrap();
        assert!(back.contains("\"AP8=\""));
    }

    #[test]
    fn image_data_accepts_plain_array() {
        let json = r#"{"height":1,"width":2,"encoding":"mono8","step":2,"data":[7,9]}"#;
        let image: ImageMsg = serde_json::from_str(json).unwrap();
        assert_eq!(image.data, vec![7, 9]);
    }

    #[test]
    fn tf_message_relations_use_header_frame_as_parent() {
        let tf: TfMessage = serde_json::from_str(
            r#"{"transforms":[
                {"header":{"frame_id":"odom"},"child_frame_id":"base_link"},
                {"header":{"frame_id":"base_link"},"child_frame_id":"laser"}
            ]}"#,
        )
        .unwrap();
        let pairs: Vec<_> = tf.relations().collect();
        assert_eq!(pairs, vec![("odom", "base_link"), ("base_link", "laser")]);
        assert_eq!(tf.transforms[0].transform.rotation.w, 1.0);
    }

    #[test]
    fn try_from_rejects_wrong_kind() {
        let message = Message::Tf(TfMessage::default());
        let err = LaserScan::try_from(message).unwrap_err();
        assert!(matches!(err, PanelError::Conversion(_)));
        assert!(err.to_string().contains("sensor_msgs/LaserScan"));
    }

    #[test]
    fn envelope_roundtrip() {
        let envelope = Envelope::new("/tf", Message::Tf(TfMessage::default()));
        let json = serde_json::to_string(&envelope).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(envelope.id, back.id);
        assert_eq!(back.topic, "/tf");
        assert_eq!(back.message.kind(), MessageKind::Tf);
    }

    #[test]
    fn time_roundtrips_through_datetime() {
        let stamp = Time { secs: 1_700_000_000, nsecs: 42 };
        let at = stamp.to_datetime().unwrap();
        assert_eq!(Time::from_datetime(at), stamp);
    }

    #[test]
    fn panel_error_display() {
        let err = PanelError::Transport {
            topic: "/scan".to_string(),
            details: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("/scan"));
        assert!(PanelError::Config("zero period".into())
            .to_string()
            .contains("Configuration Error"));
    }
}
