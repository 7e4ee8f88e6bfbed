//! Conversion from detector output to tracker input.

use tracing::trace;

use super::RawDetection;
use crate::tracker::Detection;

/// Convert one raw detection, or `None` if any field is missing or the box
/// size does not fit in `i32`.
///
/// Corners are truncated to integer pixels before the size is taken, so
/// `width == x2 - x1` and `height == y2 - y1` hold exactly on the integers.
pub fn adapt_detection(raw: &RawDetection) -> Option<Detection> {
    let [x1, y1, x2, y2] = raw.xyxy?;
    let confidence = raw.confidence?;
    let class_id = raw.class_id?;

    let (x1, y1, x2, y2) = (x1 as i32, y1 as i32, x2 as i32, y2 as i32);
    let width = x2.checked_sub(x1)?;
    let height = y2.checked_sub(y1)?;
    Some(Detection::new([x1, y1, width, height], confidence, class_id))
}

/// Convert a frame's detections, preserving order and skipping malformed entries.
pub fn adapt_detections(raw: &[RawDetection]) -> Vec<Detection> {
    raw.iter()
        .filter_map(|det| {
            let adapted = adapt_detection(det);
            if adapted.is_none() {
                trace!(?det, "skipping malformed detection");
            }
            adapted
        })
        .collect()
}
