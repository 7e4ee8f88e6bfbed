//! Run configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) describes the
//! stock setup: frames from `data/frames`, detections from
//! `data/detections.jsonl`, annotated output in `output1/`, and the event
//! log in `logs/detection_log.db`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;

use crate::render::RenderStyle;
use crate::tracker::TrackerConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub source: SourceConfig,
    pub output: OutputConfig,
    pub detector: DetectorConfig,
    pub tracker: TrackerConfig,
    pub store: StoreConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Directory of frame images
    pub path: PathBuf,
    /// Frame rate when the directory has no stream manifest
    pub fps: f64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/frames"),
            fps: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("output1"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorConfig {
    /// JSON Lines export of per-frame detections
    pub detections: PathBuf,
    pub min_confidence: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            detections: PathBuf::from("data/detections.jsonl"),
            min_confidence: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub database: PathBuf,
    /// chrono format string for record timestamps
    pub timestamp_format: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("logs/detection_log.db"),
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// TrueType/OpenType font for labels; the bundled DejaVu Sans when unset
    pub font: Option<PathBuf>,
    pub color: [u8; 3],
    pub thickness: u32,
    pub label_margin: i32,
    pub font_size: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let style = RenderStyle::default();
        Self {
            font: None,
            color: style.color,
            thickness: style.thickness,
            label_margin: style.label_margin,
            font_size: style.font_size,
        }
    }
}

impl RenderConfig {
    pub fn style(&self) -> RenderStyle {
        RenderStyle {
            color: self.color,
            thickness: self.thickness,
            label_margin: self.label_margin,
            font_size: self.font_size,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Reject values that cannot drive a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tracker
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if !(0.0..=1.0).contains(&self.detector.min_confidence) {
            return Err(ConfigError::Invalid(format!(
                "detector.min_confidence must be in [0, 1], got {}",
                self.detector.min_confidence
            )));
        }
        if !(self.source.fps.is_finite() && self.source.fps > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "source.fps must be positive, got {}",
                self.source.fps
            )));
        }
        if StrftimeItems::new(&self.store.timestamp_format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::Invalid(format!(
                "store.timestamp_format is not a valid format string: {:?}",
                self.store.timestamp_format
            )));
        }
        if self.render.font_size <= 0.0 {
            return Err(ConfigError::Invalid("render.font_size must be positive".into()));
        }
        Ok(())
    }
}
