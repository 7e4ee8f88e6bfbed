//! Detector that replays detections exported from an offline model run.
//!
//! The export is JSON Lines, one object per frame:
//!
//! ```text
//! {"frame": 0, "detections": [{"xyxy": [10, 12, 52, 90], "confidence": 0.91, "class_id": 39}]}
//! ```
//!
//! Frames missing from the file have no detections.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use super::{DetectionSource, RawDetection};
use crate::video::Frame;

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("cannot read detections {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct FrameDetections {
    frame: u64,
    #[serde(default)]
    detections: Vec<RawDetection>,
}

#[derive(Debug, Clone, Default)]
pub struct ReplayDetector {
    frames: HashMap<u64, Vec<RawDetection>>,
}

impl ReplayDetector {
    /// Load an export; an unreadable or invalid file is a setup error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let detector = Self::parse(&text).map_err(|(line, source)| ReplayError::Parse {
            path: path.to_path_buf(),
            line,
            source,
        })?;
        info!(
            path = %path.display(),
            frames = detector.frames.len(),
            "loaded detection replay"
        );
        Ok(detector)
    }

    fn parse(text: &str) -> Result<Self, (usize, serde_json::Error)> {
        let mut frames: HashMap<u64, Vec<RawDetection>> = HashMap::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: FrameDetections = serde_json::from_str(line).map_err(|e| (i + 1, e))?;
            frames.entry(entry.frame).or_default().extend(entry.detections);
        }
        Ok(Self { frames })
    }

    pub fn from_frames(frames: impl IntoIterator<Item = (u64, Vec<RawDetection>)>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl DetectionSource for ReplayDetector {
    type Error = std::convert::Infallible;

    fn detect(&mut self, frame: &Frame, min_confidence: f32) -> Result<Vec<RawDetection>, Self::Error> {
        let detections = self
            .frames
            .get(&frame.index)
            .map(|dets| {
                dets.iter()
                    // unscored entries pass through for the adapter to reject
                    .filter(|d| d.confidence.is_none_or(|c| c >= min_confidence))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(detections)
    }
}
