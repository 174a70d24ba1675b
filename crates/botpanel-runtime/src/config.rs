//! Panel configuration – reads/writes `~/.botpanel/config.toml`.
//!
//! Every field has a default, so a missing file or a partial file is fine.
//! [`load`] layers `BOTPANEL_*` environment overrides on top of the file and
//! validates the result before the pipelines are built.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use botpanel_perception::{DetectionParams, ProjectionConfig};
use botpanel_types::PanelError;
use serde::{Deserialize, Serialize};

/// Where sensor messages come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// In-process event bus; something else in the process publishes.
    Bus,
    /// A `rosbridge_server` WebSocket.
    Rosbridge,
    /// Synthetic feeds.
    #[default]
    Sim,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Bus => write!(f, "bus"),
            TransportKind::Rosbridge => write!(f, "rosbridge"),
            TransportKind::Sim => write!(f, "sim"),
        }
    }
}

impl std::str::FromStr for TransportKind {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bus" => Ok(TransportKind::Bus),
            "rosbridge" => Ok(TransportKind::Rosbridge),
            "sim" => Ok(TransportKind::Sim),
            other => Err(PanelError::Config(format!(
                "unknown transport `{other}` (expected bus, rosbridge or sim)"
            ))),
        }
    }
}

/// Topic names the panel subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    pub laser: String,
    pub camera: String,
    pub depth: String,
    pub tf: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            laser: "/scan".to_string(),
            camera: "/camera/rgb/image_color".to_string(),
            depth: "/camera/depth/image".to_string(),
            tf: "/tf".to_string(),
        }
    }
}

/// Persisted panel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelConfig {
    #[serde(default)]
    pub transport: TransportKind,

    /// Base URL of the rosbridge server, used when `transport = "rosbridge"`.
    #[serde(default = "default_rosbridge_url")]
    pub rosbridge_url: String,

    /// Camera frames are sampled to at most one per window of this length.
    #[serde(default = "default_camera_sample_ms")]
    pub camera_sample_ms: u64,

    #[serde(default = "default_depth_sample_ms")]
    pub depth_sample_ms: u64,

    /// Number of TF messages folded into the frame graph.
    #[serde(default = "default_tf_fold_bound")]
    pub tf_fold_bound: usize,

    #[serde(default = "default_battery_interval_secs")]
    pub battery_interval_secs: u64,

    /// Depth mask intensity threshold.
    #[serde(default = "default_depth_threshold")]
    pub depth_threshold: u8,

    /// Initial state of the detection toggle.
    #[serde(default)]
    pub detection_enabled: bool,

    #[serde(default)]
    pub topics: TopicConfig,

    #[serde(default)]
    pub detection: DetectionParams,

    #[serde(default)]
    pub projection: ProjectionConfig,
}

fn default_rosbridge_url() -> String {
    "ws://localhost:9090".to_string()
}
fn default_camera_sample_ms() -> u64 {
    60
}
fn default_depth_sample_ms() -> u64 {
    100
}
fn default_tf_fold_bound() -> usize {
    50
}
fn default_battery_interval_secs() -> u64 {
    2
}
fn default_depth_threshold() -> u8 {
    150
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            rosbridge_url: default_rosbridge_url(),
            topics: TopicConfig::default(),
            camera_sample_ms: default_camera_sample_ms(),
            depth_sample_ms: default_depth_sample_ms(),
            tf_fold_bound: default_tf_fold_bound(),
            battery_interval_secs: default_battery_interval_secs(),
            depth_threshold: default_depth_threshold(),
            detection_enabled: false,
            detection: DetectionParams::default(),
            projection: ProjectionConfig::default(),
        }
    }
}

impl PanelConfig {
    pub fn camera_sample_period(&self) -> Duration {
        Duration::from_millis(self.camera_sample_ms)
    }

    pub fn depth_sample_period(&self) -> Duration {
        Duration::from_millis(self.depth_sample_ms)
    }

    pub fn battery_period(&self) -> Duration {
        Duration::from_secs(self.battery_interval_secs)
    }

    /// Reject settings no pipeline can run with.
    pub fn validate(&self) -> Result<(), PanelError> {
        let zero = [
            ("camera_sample_ms", self.camera_sample_ms == 0),
            ("depth_sample_ms", self.depth_sample_ms == 0),
            ("battery_interval_secs", self.battery_interval_secs == 0),
            ("tf_fold_bound", self.tf_fold_bound == 0),
        ];
        if let Some((field, _)) = zero.iter().find(|(_, is_zero)| *is_zero) {
            return Err(PanelError::Config(format!("{field} must be greater than zero")));
        }

        for (field, topic) in [
            ("topics.laser", &self.topics.laser),
            ("topics.camera", &self.topics.camera),
            ("topics.depth", &self.topics.depth),
            ("topics.tf", &self.topics.tf),
        ] {
            if topic.trim().is_empty() {
                return Err(PanelError::Config(format!("{field} must not be empty")));
            }
        }

        if !self.projection.cone_half_angle.is_finite() || self.projection.cone_half_angle <= 0.0 {
            return Err(PanelError::Config(
                "projection.cone_half_angle must be a positive angle".to_string(),
            ));
        }
        Ok(())
    }
}

/// Return the config path: `BOTPANEL_CONFIG` if set, else
/// `~/.botpanel/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("BOTPANEL_CONFIG") {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".botpanel").join("config.toml")
}

/// Load the effective configuration: the file at [`config_path`] (or the
/// defaults when it does not exist), then environment overrides, then
/// validation.
pub fn load() -> Result<PanelConfig, PanelError> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load the config from a specific path.  Returns `None` if the file does
/// not exist.
pub fn load_from(path: &Path) -> Result<Option<PanelConfig>, PanelError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        PanelError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| PanelError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `BOTPANEL_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `BOTPANEL_TRANSPORT` | `transport` |
/// | `BOTPANEL_ROSBRIDGE_URL` | `rosbridge_url` |
/// | `BOTPANEL_TF_FOLD_BOUND` | `tf_fold_bound` |
/// | `BOTPANEL_CAMERA_SAMPLE_MS` | `camera_sample_ms` |
///
/// An unknown transport name is an error; unparsable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut PanelConfig) -> Result<(), PanelError> {
    if let Ok(v) = std::env::var("BOTPANEL_TRANSPORT") {
        cfg.transport = v.parse()?;
    }
    if let Ok(v) = std::env::var("BOTPANEL_ROSBRIDGE_URL") {
        cfg.rosbridge_url = v;
    }
    if let Ok(v) = std::env::var("BOTPANEL_TF_FOLD_BOUND")
        && let Ok(bound) = v.parse::<usize>()
    {
        cfg.tf_fold_bound = bound;
    }
    if let Ok(v) = std::env::var("BOTPANEL_CAMERA_SAMPLE_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.camera_sample_ms = ms;
    }
    Ok(())
}

/// Save the config to [`config_path`], creating the directory if necessary.
pub fn save(cfg: &PanelConfig) -> Result<(), PanelError> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub fn save_to(cfg: &PanelConfig, path: &Path) -> Result<(), PanelError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| PanelError::Config(format!("failed to create config directory: {e}")))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| PanelError::Serialization(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw).map_err(|e| {
        PanelError::Config(format!("failed to write config at {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use botpanel_perception::HorizonPolicy;

    use super::*;

    #[test]
    fn defaults_match_the_reference_panel() {
        let cfg = PanelConfig::default();
        assert_eq!(cfg.topics.laser, "/scan");
        assert_eq!(cfg.topics.camera, "/camera/rgb/image_color");
        assert_eq!(cfg.topics.depth, "/camera/depth/image");
        assert_eq!(cfg.topics.tf, "/tf");
        assert_eq!(cfg.camera_sample_period(), Duration::from_millis(60));
        assert_eq!(cfg.depth_sample_period(), Duration::from_millis(100));
        assert_eq!(cfg.battery_period(), Duration::from_secs(2));
        assert_eq!(cfg.tf_fold_bound, 50);
        assert_eq!(cfg.depth_threshold, 150);
        assert_eq!(cfg.rosbridge_url, "ws://localhost:9090");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = PanelConfig::default();
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "transport = \"rosbridge\"\ntf_fold_bound = 10\n\n[projection]\nhorizon = \"upper_half\"\n\n[topics]\nlaser = \"/front_scan\"\n",
        )
        .expect("write");

        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.transport, TransportKind::Rosbridge);
        assert_eq!(cfg.tf_fold_bound, 10);
        assert_eq!(cfg.projection.horizon, HorizonPolicy::UpperHalf);
        assert!((cfg.projection.cone_half_angle - 0.3).abs() < f32::EPSILON);
        assert_eq!(cfg.topics.laser, "/front_scan");
        assert_eq!(cfg.topics.tf, "/tf");
        assert_eq!(cfg.camera_sample_ms, 60);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "camera_sample_ms = \"fast\"").expect("write");
        assert!(matches!(load_from(&path), Err(PanelError::Config(_))));
    }

    #[test]
    fn config_path_points_to_botpanel_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".botpanel"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        let result = load_from(&path).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn validate_rejects_zero_periods_and_bound() {
        let mut cfg = PanelConfig::default();
        cfg.camera_sample_ms = 0;
        assert!(matches!(cfg.validate(), Err(PanelError::Config(msg)) if msg.contains("camera_sample_ms")));

        let mut cfg = PanelConfig::default();
        cfg.tf_fold_bound = 0;
        assert!(matches!(cfg.validate(), Err(PanelError::Config(msg)) if msg.contains("tf_fold_bound")));

        let mut cfg = PanelConfig::default();
        cfg.battery_interval_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_topic() {
        let mut cfg = PanelConfig::default();
        cfg.topics.depth = "  ".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn transport_kind_parses_case_insensitively() {
        assert_eq!("ROSBRIDGE".parse::<TransportKind>(), Ok(TransportKind::Rosbridge));
        assert_eq!(" bus ".parse::<TransportKind>(), Ok(TransportKind::Bus));
        assert!("carrier-pigeon".parse::<TransportKind>().is_err());
        assert_eq!(TransportKind::Sim.to_string(), "sim");
    }

    #[test]
    fn apply_env_overrides_changes_transport() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("BOTPANEL_TRANSPORT", "bus") };
        let mut cfg = PanelConfig::default();
        let result = apply_env_overrides(&mut cfg);
        unsafe { std::env::remove_var("BOTPANEL_TRANSPORT") };
        assert!(result.is_ok());
        assert_eq!(cfg.transport, TransportKind::Bus);
    }

    #[test]
    fn apply_env_overrides_changes_rosbridge_url() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("BOTPANEL_ROSBRIDGE_URL", "ws://robot-host:9090") };
        let mut cfg = PanelConfig::default();
        let result = apply_env_overrides(&mut cfg);
        unsafe { std::env::remove_var("BOTPANEL_ROSBRIDGE_URL") };
        assert!(result.is_ok());
        assert_eq!(cfg.rosbridge_url, "ws://robot-host:9090");
    }

    #[test]
    fn apply_env_overrides_changes_tf_fold_bound() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("BOTPANEL_TF_FOLD_BOUND", "7") };
        let mut cfg = PanelConfig::default();
        let result = apply_env_overrides(&mut cfg);
        unsafe { std::env::remove_var("BOTPANEL_TF_FOLD_BOUND") };
        assert!(result.is_ok());
        assert_eq!(cfg.tf_fold_bound, 7);
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_sample_period() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("BOTPANEL_CAMERA_SAMPLE_MS", "soon") };
        let mut cfg = PanelConfig::default();
        let result = apply_env_overrides(&mut cfg);
        unsafe { std::env::remove_var("BOTPANEL_CAMERA_SAMPLE_MS") };
        assert!(result.is_ok());
        assert_eq!(cfg.camera_sample_ms, 60);
    }
}
