//! Runtime configuration, read from a TOML file.
//!
//! Every field has a default, so an empty file (or no file) is a valid config.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::detect::DetectionMode;
use crate::error::{Error, Result};
use crate::estimator::EstimatorKind;
use crate::texture::TexturePolicy;
use crate::tracker::{DecayRule, MaskPolicy};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub camera: CameraConfig,
    pub detection: DetectionConfig,
    pub tracker: TrackerConfig,
    pub mask: MaskConfig,
    pub compositor: CompositorConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

/// Where video frames come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device index (0 = default webcam).
    pub index: u32,
    /// Requested capture size; the device may pick something close.
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Loop this image instead of opening a camera.
    pub still_image: Option<PathBuf>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self { index: 0, width: 640, height: 480, fps: 30, still_image: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Run detection every `cadence` ticks. Unset: 5 for `decay`, 3 for `snapshot`.
    pub cadence: Option<u64>,
    pub mode: DetectionMode,
    pub estimator: EstimatorKind,
    /// Recorded detections, required by the `replay` estimator.
    pub replay_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub policy: MaskPolicy,
    pub decay_factor: f32,
    pub snap_below: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        let rule = DecayRule::default();
        Self { policy: MaskPolicy::default(), decay_factor: rule.factor, snap_below: rule.snap_below }
    }
}

impl TrackerConfig {
    pub fn decay_rule(&self) -> DecayRule {
        DecayRule { factor: self.decay_factor, snap_below: self.snap_below }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    /// Softness of the mask edge, in pixels.
    pub blur_radius: usize,
    /// Halo radius relative to the core (snapshot policy).
    pub halo_scale: f32,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self { blur_radius: 6, halo_scale: 1.2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Noise bitmap to load; generated from `noise_seed` when unset.
    pub noise_path: Option<PathBuf>,
    pub noise_seed: u32,
    pub texture_policy: TexturePolicy,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self { noise_path: None, noise_seed: 0x5EED_1234, texture_policy: TexturePolicy::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub title: String,
    /// 0 disables the frame cap.
    pub target_fps: usize,
    /// Soft blur applied when the effect is put on screen.
    pub post_blur_radius: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { title: "Pinch Reveal".to_string(), target_fps: 60, post_blur_radius: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter used when RUST_LOG is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Detection cadence, falling back to the mask policy's usual value.
    pub fn cadence(&self) -> u64 {
        self.detection.cadence.unwrap_or(match self.tracker.policy {
            MaskPolicy::Decay => 5,
            MaskPolicy::Snapshot => 3,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.detection.cadence == Some(0) {
            return Err(Error::Config("detection cadence must be at least 1".into()));
        }
        if self.detection.estimator == EstimatorKind::Replay && self.detection.replay_path.is_none() {
            return Err(Error::Config("the replay estimator needs detection.replay_path".into()));
        }

        let tracker = &self.tracker;
        if !(tracker.decay_factor > 0.0 && tracker.decay_factor < 1.0) {
            return Err(Error::Config(format!(
                "decay_factor must be in (0, 1), got {}",
                tracker.decay_factor
            )));
        }
        if !(tracker.snap_below >= 0.0) {
            return Err(Error::Config(format!("snap_below must be non-negative, got {}", tracker.snap_below)));
        }

        if !(self.mask.halo_scale >= 1.0) {
            return Err(Error::Config(format!("halo_scale must be at least 1, got {}", self.mask.halo_scale)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cadence(), 5);
        assert_eq!(config.tracker.decay_rule(), DecayRule::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(AppConfig::from_toml("").unwrap(), AppConfig::default());
    }

    #[test]
    fn example_file_spells_out_the_defaults() {
        let config = AppConfig::from_toml(include_str!("../pinch-reveal.example.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn snapshot_policy_defaults_to_cadence_three() {
        let config = AppConfig::from_toml("[tracker]\npolicy = \"snapshot\"\n").unwrap();
        assert_eq!(config.tracker.policy, MaskPolicy::Snapshot);
        assert_eq!(config.cadence(), 3);
    }

    #[test]
    fn parses_every_section() {
        let toml = r#"
            [camera]
            index = 2
            still_image = "frame.png"

            [detection]
            cadence = 4
            mode = "background"
            estimator = "replay"
            replay_path = "hands.json"

            [tracker]
            decay_factor = 0.8

            [mask]
            blur_radius = 3

            [compositor]
            texture_policy = "pooled"

            [display]
            title = "demo"

            [logging]
            level = "debug"
        "#;
        let config = AppConfig::from_toml(toml).unwrap();
        assert_eq!(config.camera.index, 2);
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.camera.still_image, Some(PathBuf::from("frame.png")));
        assert_eq!(config.cadence(), 4);
        assert_eq!(config.detection.mode, DetectionMode::Background);
        assert_eq!(config.detection.estimator, EstimatorKind::Replay);
        assert_eq!(config.tracker.decay_factor, 0.8);
        assert_eq!(config.tracker.snap_below, 10.0);
        assert_eq!(config.mask.blur_radius, 3);
        assert_eq!(config.compositor.texture_policy, TexturePolicy::Pooled);
        assert_eq!(config.display.title, "demo");
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.detection.cadence = Some(0);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.tracker.decay_factor = 1.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.tracker.snap_below = -1.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.mask.halo_scale = 0.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.detection.estimator = EstimatorKind::Replay;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn unknown_enum_value_is_a_config_error() {
        let err = AppConfig::from_toml("[detection]\nmode = \"sideways\"\n");
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pinch.toml");
        std::fs::write(&path, "[display]\ntarget_fps = 30\n").unwrap();
        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.display.target_fps, 30);
        assert!(AppConfig::from_file(dir.path().join("missing.toml")).is_err());
    }
}
