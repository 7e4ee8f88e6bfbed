//! Kalman + IoU multi-object tracker with a tentative/confirmed/deleted lifecycle.

use serde::Deserialize;

use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::{self, AssignmentResult, Detection};
use crate::tracker::rect::Rect;
use crate::tracker::track::{KalmanTrack, Track};
use crate::tracker::{Tracker, TrackerError};
use crate::video::Frame;

/// Lifecycle parameters for [`MultiTracker`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    /// Misses a confirmed track survives before deletion
    pub max_age: u32,
    /// Consecutive matches needed to confirm a track
    pub n_init: u32,
    /// Largest `1 - IoU` accepted for a track/detection pair
    pub max_iou_distance: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_age: 30,
            n_init: 3,
            max_iou_distance: 0.7,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.max_age == 0 {
            return Err(TrackerError::InvalidConfig(
                "max_age must be at least 1".into(),
            ));
        }
        if self.n_init == 0 {
            return Err(TrackerError::InvalidConfig(
                "n_init must be at least 1".into(),
            ));
        }
        if !(self.max_iou_distance > 0.0 && self.max_iou_distance <= 1.0) {
            return Err(TrackerError::InvalidConfig(format!(
                "max_iou_distance must be in (0, 1], got {}",
                self.max_iou_distance
            )));
        }
        Ok(())
    }
}

pub struct MultiTracker {
    tracks: Vec<KalmanTrack>,
    next_id: u64,
    frame_id: u64,
    config: TrackerConfig,
    kalman_filter: KalmanFilter,
}

impl MultiTracker {
    /// Build a tracker, rejecting invalid lifecycle parameters.
    pub fn new(config: TrackerConfig) -> Result<Self, TrackerError> {
        config.validate()?;
        Ok(Self {
            tracks: Vec::new(),
            next_id: 1,
            frame_id: 0,
            config,
            kalman_filter: KalmanFilter::default(),
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Number of frames consumed so far.
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    /// Associate one frame of detections and return every live track.
    pub fn step(&mut self, detections: Vec<Detection>) -> Result<Vec<Track>, TrackerError> {
        self.frame_id += 1;

        for track in &mut self.tracks {
            track.predict(&self.kalman_filter);
        }

        let (confirmed, tentative): (Vec<usize>, Vec<usize>) =
            (0..self.tracks.len()).partition(|&i| self.tracks[i].state.is_confirmed());
        let all_detections: Vec<usize> = (0..detections.len()).collect();

        // Step 1: confirmed tracks get first pick of the detections
        let first = self.associate(&confirmed, &all_detections, &detections);
        let mut matches = first.matches;
        let mut unmatched_tracks = first.unmatched_tracks;

        // Step 2: tentative tracks compete for what is left
        let second = self.associate(&tentative, &first.unmatched_detections, &detections);
        matches.extend(second.matches);
        unmatched_tracks.extend(second.unmatched_tracks);

        for (track_idx, det_idx) in matches {
            self.tracks[track_idx].update(
                &detections[det_idx],
                &self.kalman_filter,
                self.config.n_init,
            )?;
        }

        for track_idx in unmatched_tracks {
            self.tracks[track_idx].mark_missed(self.config.max_age);
        }

        // Step 3: seed new tracks from unclaimed detections
        for det_idx in second.unmatched_detections {
            let track = KalmanTrack::new(
                self.next_id,
                &detections[det_idx],
                &self.kalman_filter,
                self.config.n_init,
            );
            self.next_id += 1;
            self.tracks.push(track);
        }

        self.tracks.retain(|t| !t.is_deleted());

        Ok(self.tracks.iter().map(KalmanTrack::snapshot).collect())
    }

    /// Assign a subset of tracks to a subset of detections, returning indices
    /// into `self.tracks` and `detections`.
    fn associate(
        &self,
        track_indices: &[usize],
        detection_indices: &[usize],
        detections: &[Detection],
    ) -> AssignmentResult {
        let track_rects: Vec<Rect> = track_indices.iter().map(|&i| self.tracks[i].rect()).collect();
        let det_rects: Vec<Rect> = detection_indices
            .iter()
            .map(|&j| detections[j].rect())
            .collect();

        let dists = matching::iou_distance(&track_rects, &det_rects);
        let local = matching::linear_assignment(&dists, self.config.max_iou_distance);

        AssignmentResult {
            matches: local
                .matches
                .into_iter()
                .map(|(i, j)| (track_indices[i], detection_indices[j]))
                .collect(),
            unmatched_tracks: local
                .unmatched_tracks
                .into_iter()
                .map(|i| track_indices[i])
                .collect(),
            unmatched_detections: local
                .unmatched_detections
                .into_iter()
                .map(|j| detection_indices[j])
                .collect(),
        }
    }
}

impl Tracker for MultiTracker {
    fn update(&mut self, detections: Vec<Detection>, _frame: &Frame) -> Result<Vec<Track>, TrackerError> {
        self.step(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::TrackState;

    #[test]
    fn test_config_validation() {
        assert!(TrackerConfig::default().validate().is_ok());

        let bad = [
            TrackerConfig {
                max_age: 0,
                ..Default::default()
            },
            TrackerConfig {
                n_init: 0,
                ..Default::default()
            },
            TrackerConfig {
                max_iou_distance: 1.5,
                ..Default::default()
            },
            TrackerConfig {
                max_iou_distance: 0.0,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(matches!(
                MultiTracker::new(config),
                Err(TrackerError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_empty_frames_yield_empty_snapshots() {
        let mut tracker = MultiTracker::new(TrackerConfig::default()).unwrap();
        assert!(tracker.step(vec![]).unwrap().is_empty());
        assert!(tracker.step(vec![]).unwrap().is_empty());
        assert_eq!(tracker.frame_id(), 2);
    }

    #[test]
    fn test_class_follows_latest_detection() {
        let mut tracker = MultiTracker::new(TrackerConfig {
            n_init: 1,
            ..Default::default()
        })
        .unwrap();

        let first = tracker.step(vec![Detection::new([10, 10, 40, 40], 0.9, 39)]).unwrap();
        let second = tracker.step(vec![Detection::new([11, 10, 40, 40], 0.9, 41)]).unwrap();

        assert_eq!(first[0].track_id, second[0].track_id);
        assert_eq!(second[0].class_id, 41);
        assert_eq!(second[0].state, TrackState::Confirmed);
    }
}
