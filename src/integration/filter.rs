//! Selection of tracks that are reported for the current frame.

use crate::tracker::Track;

/// Oldest match, in frames, a confirmed track may have and still be reported.
pub const MAX_STALE_FRAMES: u32 = 1;

/// Whether a track is logged and drawn this frame.
pub fn is_loggable(track: &Track) -> bool {
    track.is_confirmed() && track.time_since_update <= MAX_STALE_FRAMES
}

/// Loggable subset of a tracker snapshot, in snapshot order.
pub fn loggable_tracks(tracks: &[Track]) -> impl Iterator<Item = &Track> {
    tracks.iter().filter(|t| is_loggable(t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::TrackState;

    fn track(track_id: u64, state: TrackState, time_since_update: u32) -> Track {
        Track {
            track_id,
            class_id: 0,
            state,
            ltrb: [0.0, 0.0, 10.0, 10.0],
            time_since_update,
        }
    }

    #[test]
    fn test_empty_snapshot() {
        assert_eq!(loggable_tracks(&[]).count(), 0);
    }

    #[test]
    fn test_only_fresh_confirmed_tracks_pass() {
        let tracks = vec![
            track(1, TrackState::Confirmed, 0),
            track(2, TrackState::Confirmed, 1),
            track(3, TrackState::Confirmed, 2),
            track(4, TrackState::Tentative, 0),
            track(5, TrackState::Deleted, 0),
        ];
        let ids: Vec<u64> = loggable_tracks(&tracks).map(|t| t.track_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_exhaustive_state_grid() {
        for state in [TrackState::Tentative, TrackState::Confirmed, TrackState::Deleted] {
            for tsu in 0..5 {
                let expected = state == TrackState::Confirmed && tsu <= 1;
                assert_eq!(is_loggable(&track(1, state, tsu)), expected, "{state:?} {tsu}");
            }
        }
    }
}
