//! Track records: the public per-frame snapshot and the tracker's internal state.

use ndarray::{Array1, Array2};

use crate::tracker::TrackerError;
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::Detection;
use crate::tracker::rect::Rect;
use crate::tracker::track_state::TrackState;

/// Read-only view of one track as reported by a tracker for the current frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Stable identity for the lifetime of the track
    pub track_id: u64,
    /// Class of the most recently matched detection
    pub class_id: u32,
    pub state: TrackState,
    /// Current box estimate as (left, top, right, bottom)
    pub ltrb: [f32; 4],
    /// Frames elapsed since the last matched detection
    pub time_since_update: u32,
}

impl Track {
    pub fn is_confirmed(&self) -> bool {
        self.state == TrackState::Confirmed
    }

    /// Integer pixel centroid of the current box, truncated toward zero.
    pub fn centroid(&self) -> (i64, i64) {
        let [l, t, r, b] = self.ltrb;
        (((l + r) / 2.0) as i64, ((t + b) / 2.0) as i64)
    }
}

/// Kalman-filtered track owned by [`MultiTracker`](crate::tracker::MultiTracker).
#[derive(Debug, Clone)]
pub(crate) struct KalmanTrack {
    pub track_id: u64,
    pub class_id: u32,
    pub state: TrackState,
    /// Matched detections so far, including the seeding one
    pub hits: u32,
    /// Frames since creation
    pub age: u32,
    pub time_since_update: u32,
    mean: Array1<f64>,
    covariance: Array2<f64>,
}

impl KalmanTrack {
    pub fn new(
        track_id: u64,
        detection: &Detection,
        kalman_filter: &KalmanFilter,
        n_init: u32,
    ) -> Self {
        let (mean, covariance) = kalman_filter.initiate(detection.rect().to_xyah());
        let state = if n_init <= 1 {
            TrackState::Confirmed
        } else {
            TrackState::Tentative
        };
        Self {
            track_id,
            class_id: detection.class_id,
            state,
            hits: 1,
            age: 1,
            time_since_update: 0,
            mean,
            covariance,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::from_xyah(
            self.mean[0] as f32,
            self.mean[1] as f32,
            self.mean[2] as f32,
            self.mean[3] as f32,
        )
    }

    /// Advance the state one frame ahead; the track counts as unmatched until `update`.
    pub fn predict(&mut self, kalman_filter: &KalmanFilter) {
        let (mean, covariance) = kalman_filter.predict(&self.mean, &self.covariance);
        self.mean = mean;
        self.covariance = covariance;
        self.age += 1;
        self.time_since_update += 1;
    }

    pub fn update(
        &mut self,
        detection: &Detection,
        kalman_filter: &KalmanFilter,
        n_init: u32,
    ) -> Result<(), TrackerError> {
        let (mean, covariance) =
            kalman_filter.update(&self.mean, &self.covariance, detection.rect().to_xyah())?;
        self.mean = mean;
        self.covariance = covariance;
        self.class_id = detection.class_id;
        self.hits += 1;
        self.time_since_update = 0;

        if self.state == TrackState::Tentative && self.hits >= n_init {
            self.state = TrackState::Confirmed;
        }
        Ok(())
    }

    /// A missed tentative track dies immediately; a confirmed one survives `max_age` misses.
    pub fn mark_missed(&mut self, max_age: u32) {
        if self.state == TrackState::Tentative || self.time_since_update > max_age {
            self.state = TrackState::Deleted;
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.state == TrackState::Deleted
    }

    pub fn snapshot(&self) -> Track {
        Track {
            track_id: self.track_id,
            class_id: self.class_id,
            state: self.state,
            ltrb: self.rect().to_ltrb(),
            time_since_update: self.time_since_update,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection() -> Detection {
        Detection::new([10, 10, 40, 40], 0.9, 39)
    }

    #[test]
    fn test_confirmation_after_n_init_hits() {
        let kf = KalmanFilter::new();
        let mut track = KalmanTrack::new(1, &detection(), &kf, 3);
        assert_eq!(track.state, TrackState::Tentative);

        track.predict(&kf);
        track.update(&detection(), &kf, 3).unwrap();
        assert_eq!(track.state, TrackState::Tentative);

        track.predict(&kf);
        track.update(&detection(), &kf, 3).unwrap();
        assert_eq!(track.state, TrackState::Confirmed);
        assert_eq!(track.time_since_update, 0);
    }

    #[test]
    fn test_missed_tentative_is_deleted() {
        let kf = KalmanFilter::new();
        let mut track = KalmanTrack::new(1, &detection(), &kf, 3);
        track.predict(&kf);
        track.mark_missed(30);
        assert!(track.is_deleted());
    }

    #[test]
    fn test_confirmed_survives_until_max_age() {
        let kf = KalmanFilter::new();
        let mut track = KalmanTrack::new(1, &detection(), &kf, 1);
        assert_eq!(track.state, TrackState::Confirmed);

        for _ in 0..2 {
            track.predict(&kf);
            track.mark_missed(2);
        }
        assert!(!track.is_deleted());
        assert_eq!(track.time_since_update, 2);

        track.predict(&kf);
        track.mark_missed(2);
        assert!(track.is_deleted());
    }

    #[test]
    fn test_snapshot_centroid_truncates() {
        let track = Track {
            track_id: 4,
            class_id: 0,
            state: TrackState::Confirmed,
            ltrb: [10.0, 11.0, 21.0, 30.0],
            time_since_update: 0,
        };
        assert_eq!(track.centroid(), (15, 20));
    }
}
