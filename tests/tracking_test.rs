use bottletrack_rs::{Detection, MultiTracker, TrackState, TrackerConfig};

fn det(x: i32, y: i32) -> Detection {
    Detection::new([x, y, 40, 40], 0.9, 39)
}

#[test]
fn test_basic_tracking() {
    let mut tracker = MultiTracker::new(TrackerConfig::default()).unwrap();

    // Frames 1-2: tentative
    let tracks1 = tracker.step(vec![det(100, 100)]).unwrap();
    assert_eq!(tracks1.len(), 1);
    assert_eq!(tracks1[0].state, TrackState::Tentative);
    let id = tracks1[0].track_id;

    let tracks2 = tracker.step(vec![det(102, 101)]).unwrap();
    assert_eq!(tracks2[0].track_id, id);
    assert_eq!(tracks2[0].state, TrackState::Tentative);

    // Frame 3: third consecutive match confirms
    let tracks3 = tracker.step(vec![det(104, 102)]).unwrap();
    assert_eq!(tracks3[0].track_id, id);
    assert_eq!(tracks3[0].state, TrackState::Confirmed);
    assert_eq!(tracks3[0].time_since_update, 0);

    // Frames 4-5: occluded, track coasts
    let tracks4 = tracker.step(vec![]).unwrap();
    assert_eq!(tracks4.len(), 1);
    assert_eq!(tracks4[0].time_since_update, 1);
    let tracks5 = tracker.step(vec![]).unwrap();
    assert_eq!(tracks5[0].time_since_update, 2);
    assert_eq!(tracks5[0].state, TrackState::Confirmed);

    // Frame 6: reappears close to where it was lost
    let tracks6 = tracker.step(vec![det(108, 104)]).unwrap();
    assert_eq!(tracks6.len(), 1);
    assert_eq!(tracks6[0].track_id, id);
    assert_eq!(tracks6[0].time_since_update, 0);
}

#[test]
fn test_confirmed_track_deleted_after_max_age() {
    let mut tracker = MultiTracker::new(TrackerConfig {
        max_age: 3,
        n_init: 1,
        ..Default::default()
    })
    .unwrap();

    tracker.step(vec![det(10, 10)]).unwrap();
    for missed in 1..=3 {
        let tracks = tracker.step(vec![]).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].time_since_update, missed);
    }
    assert!(tracker.step(vec![]).unwrap().is_empty());
}

#[test]
fn test_ids_are_unique_and_not_reused() {
    let mut tracker = MultiTracker::new(TrackerConfig {
        n_init: 1,
        ..Default::default()
    })
    .unwrap();

    let first = tracker.step(vec![det(0, 0), det(200, 200)]).unwrap();
    let mut ids: Vec<u64> = first.iter().map(|t| t.track_id).collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2]);

    // Matched objects keep their ids, a new one gets the next id
    let second = tracker.step(vec![det(0, 0), det(200, 200), det(400, 0)]).unwrap();
    let new_ids: Vec<u64> = second
        .iter()
        .map(|t| t.track_id)
        .filter(|id| !ids.contains(id))
        .collect();
    assert_eq!(new_ids, vec![3]);
}

#[test]
fn test_two_objects_keep_identity_when_crossing_order() {
    let mut tracker = MultiTracker::new(TrackerConfig {
        n_init: 1,
        ..Default::default()
    })
    .unwrap();

    let first = tracker.step(vec![det(0, 0), det(300, 0)]).unwrap();
    let left_id = first.iter().find(|t| t.ltrb[0] < 150.0).unwrap().track_id;

    // Same objects, listed in reverse order
    let second = tracker.step(vec![det(302, 0), det(2, 0)]).unwrap();
    let left = second.iter().find(|t| t.ltrb[0] < 150.0).unwrap();
    assert_eq!(left.track_id, left_id);
}
