/// Track state enumeration for object tracking lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Newly created track, not yet confirmed
    #[default]
    Tentative,
    /// Matched for at least `n_init` consecutive frames
    Confirmed,
    /// Dropped by the tracker, never reported again
    Deleted,
}

impl TrackState {
    pub fn is_confirmed(self) -> bool {
        self == TrackState::Confirmed
    }
}
