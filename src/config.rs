use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::analytics::TieBreak;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Capture device: an index (`0`, `1`, ...) or a file/stream path.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DeviceSpec {
    Index(i32),
    Path(String),
}

impl Default for DeviceSpec {
    fn default() -> Self {
        DeviceSpec::Index(0)
    }
}

impl std::fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceSpec::Index(i) => write!(f, "device:{i}"),
            DeviceSpec::Path(p) => f.write_str(p),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub device: DeviceSpec,
    #[serde(default = "default_width")]
    pub width: i32,
    #[serde(default = "default_height")]
    pub height: i32,
    #[serde(default = "default_fps")]
    pub fps: u32,
}

fn default_width() -> i32 {
    960
}

fn default_height() -> i32 {
    780
}

fn default_fps() -> u32 {
    30
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: DeviceSpec::default(),
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
        }
    }
}

fn default_smoothing_factor() -> f64 {
    0.00001
}

fn default_threshold_cutoff() -> f64 {
    50.0
}

fn default_min_contour_area() -> f64 {
    2000.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_smoothing_factor")]
    pub smoothing_factor: f64,
    #[serde(default = "default_threshold_cutoff")]
    pub threshold_cutoff: f64,
    #[serde(default = "default_min_contour_area")]
    pub min_contour_area: f64,
    #[serde(default)]
    pub tie_break: TieBreak,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            smoothing_factor: default_smoothing_factor(),
            threshold_cutoff: default_threshold_cutoff(),
            min_contour_area: default_min_contour_area(),
            tie_break: TieBreak::default(),
        }
    }
}

fn default_display_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_display_enabled")]
    pub enabled: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            enabled: default_display_enabled(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportConfig {
    /// Print one JSON line per frame with detections instead of bare labels.
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

impl Config {
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.width <= 0 || self.camera.height <= 0 {
            return Err(ConfigError::Invalid(format!(
                "frame size must be positive, got {}x{}",
                self.camera.width, self.camera.height
            )));
        }

        let alpha = self.analytics.smoothing_factor;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "smoothing_factor must be in (0, 1], got {alpha}"
            )));
        }

        let cutoff = self.analytics.threshold_cutoff;
        if !(0.0..255.0).contains(&cutoff) {
            return Err(ConfigError::Invalid(format!(
                "threshold_cutoff must be in [0, 255), got {cutoff}"
            )));
        }

        let min_area = self.analytics.min_contour_area;
        if !min_area.is_finite() || min_area < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "min_contour_area must be a non-negative number, got {min_area}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.camera.device, DeviceSpec::Index(0));
        assert_eq!(config.camera.width, 960);
        assert_eq!(config.camera.height, 780);
        assert_eq!(config.camera.fps, 30);
        assert_eq!(config.analytics.smoothing_factor, 0.00001);
        assert_eq!(config.analytics.threshold_cutoff, 50.0);
        assert_eq!(config.analytics.min_contour_area, 2000.0);
        assert_eq!(config.analytics.tie_break, TieBreak::FirstMatch);
        assert!(config.display.enabled);
        assert!(!config.report.json);
    }

    #[test]
    fn test_parse_overrides() {
        let config = Config::parse(
            r#"
            [camera]
            device = "/tmp/bench.mp4"
            width = 640
            height = 480

            [analytics]
            min_contour_area = 500.0
            tie_break = "edge_priority"

            [display]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.camera.device, DeviceSpec::Path("/tmp/bench.mp4".into()));
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.camera.height, 480);
        assert_eq!(config.camera.fps, 30);
        assert_eq!(config.analytics.min_contour_area, 500.0);
        assert_eq!(config.analytics.tie_break, TieBreak::EdgePriority);
        assert!(!config.display.enabled);
    }

    #[test]
    fn test_parse_side_overrides_front() {
        let config = Config::parse("[analytics]\ntie_break = \"side_overrides_front\"\n").unwrap();
        assert_eq!(config.analytics.tie_break, TieBreak::SideOverridesFront);
    }

    #[test]
    fn test_device_index() {
        let config = Config::parse("[camera]\ndevice = 1\n").unwrap();
        assert_eq!(config.camera.device, DeviceSpec::Index(1));
    }

    #[test]
    fn test_rejects_invalid_values() {
        for bad in [
            "[camera]\nwidth = 0\n",
            "[analytics]\nsmoothing_factor = 0.0\n",
            "[analytics]\nsmoothing_factor = 1.5\n",
            "[analytics]\nthreshold_cutoff = 255.0\n",
            "[analytics]\nmin_contour_area = -1.0\n",
        ] {
            assert!(
                matches!(Config::parse(bad), Err(ConfigError::Invalid(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_rejects_unknown_tie_break() {
        assert!(matches!(
            Config::parse("[analytics]\ntie_break = \"widest\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
