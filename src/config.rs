use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{invalid_config, TrackerErrorContext, TrackerResult};

/// Top-level configuration, usually loaded from a TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub scroll_viewer: ScrollViewerConfig,
}

/// Mesh tracker configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Keep tracked meshes when detaching instead of emitting a removal for each
    pub retain_meshes_on_detach: bool,

    /// Log how long each frame's provider fan-out took
    pub log_frame_timing: bool,
}

/// Scroll viewer geometry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollViewerConfig {
    /// Thickness of each scroll bar in pixels
    pub bar_size: f32,

    /// Bar value change per wheel notch
    pub wheel_precision: f32,

    /// Fraction of the track the thumb may occupy
    pub thumb_length: f32,

    /// Smallest thumb size as a fraction of the track
    pub min_thumb_ratio: f32,

    pub force_horizontal_bar: bool,
    pub force_vertical_bar: bool,
}

impl Default for ScrollViewerConfig {
    fn default() -> Self {
        Self {
            bar_size: 20.0,
            wheel_precision: 0.05,
            thumb_length: 0.5,
            min_thumb_ratio: 0.05,
            force_horizontal_bar: false,
            force_vertical_bar: false,
        }
    }
}

impl ScrollViewerConfig {
    pub fn validate(&self) -> TrackerResult<()> {
        if !(self.bar_size > 0.0) {
            return Err(invalid_config("bar_size", format!("must be positive, got {}", self.bar_size)));
        }
        if !(self.wheel_precision > 0.0 && self.wheel_precision <= 1.0) {
            return Err(invalid_config(
                "wheel_precision",
                format!("must be in (0, 1], got {}", self.wheel_precision),
            ));
        }
        if !(self.thumb_length > 0.0 && self.thumb_length <= 1.0) {
            return Err(invalid_config(
                "thumb_length",
                format!("must be in (0, 1], got {}", self.thumb_length),
            ));
        }
        if !(self.min_thumb_ratio >= 0.0 && self.min_thumb_ratio <= 1.0) {
            return Err(invalid_config(
                "min_thumb_ratio",
                format!("must be in [0, 1], got {}", self.min_thumb_ratio),
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Parse and validate a TOML document
    pub fn from_toml_str(raw: &str) -> TrackerResult<Self> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> TrackerResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).path_context(path)?;
        let config = Self::from_toml_str(&raw)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> TrackerResult<()> {
        self.scroll_viewer.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackerError;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.tracker.retain_meshes_on_detach);
        assert_eq!(config.scroll_viewer.bar_size, 20.0);
        assert_eq!(config.scroll_viewer.wheel_precision, 0.05);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [tracker]
            retain_meshes_on_detach = true

            [scroll_viewer]
            wheel_precision = 0.1
            "#,
        )
        .unwrap();

        assert!(config.tracker.retain_meshes_on_detach);
        assert!(!config.tracker.log_frame_timing);
        assert_eq!(config.scroll_viewer.wheel_precision, 0.1);
        assert_eq!(config.scroll_viewer.bar_size, 20.0);
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = Config::from_toml_str("[scroll_viewer]\nbar_size = 0.0\n").unwrap_err();
        assert!(matches!(err, TrackerError::InvalidConfig { field: "bar_size", .. }));

        let err = Config::from_toml_str("[scroll_viewer]\nwheel_precision = 2.0\n").unwrap_err();
        assert!(matches!(err, TrackerError::InvalidConfig { field: "wheel_precision", .. }));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = Config::from_toml_str("[tracker\n").unwrap_err();
        assert!(matches!(err, TrackerError::ConfigParse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[tracker]\nlog_frame_timing = true").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert!(config.tracker.log_frame_timing);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, TrackerError::ConfigIo { .. }));
    }
}
