//! Multi-object tracking: turns per-frame detections into persistent identities.

mod kalman_filter;
mod matching;
mod multi_tracker;
mod rect;
mod track;
mod track_state;

pub use matching::{Detection, iou_distance, linear_assignment};
pub use multi_tracker::{MultiTracker, TrackerConfig};
pub use rect::Rect;
pub use track::Track;
pub use track_state::TrackState;

use crate::video::Frame;

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("invalid tracker configuration: {0}")]
    InvalidConfig(String),
    #[error("innovation covariance is singular")]
    SingularCovariance,
}

/// Cross-frame association of detections into tracks.
///
/// Implementations own all track memory; callers only read the returned
/// snapshot. Every live track carries a class id, and track ids are never
/// rewritten once assigned.
pub trait Tracker {
    /// Consume the current frame's detections and return every live track.
    fn update(&mut self, detections: Vec<Detection>, frame: &Frame) -> Result<Vec<Track>, TrackerError>;
}
