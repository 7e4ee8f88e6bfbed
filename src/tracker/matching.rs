//! Detection input and IoU-gated assignment between tracks and detections.

use ndarray::Array2;

use crate::tracker::rect::Rect;

/// Cost assigned to padding cells so the solver never prefers them to a real pair.
const PADDING_COST: f64 = 1e6;

/// One detection in the shape the tracker consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Integer pixel box as (x, y, width, height)
    pub xywh: [i32; 4],
    pub confidence: f32,
    pub class_id: u32,
}

impl Detection {
    pub fn new(xywh: [i32; 4], confidence: f32, class_id: u32) -> Self {
        Self {
            xywh,
            confidence,
            class_id,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::from_xywh(self.xywh)
    }
}

/// IoU distance (1 - IoU) between every track box and every detection box.
pub fn iou_distance(track_boxes: &[Rect], det_boxes: &[Rect]) -> Array2<f32> {
    Array2::from_shape_fn((track_boxes.len(), det_boxes.len()), |(i, j)| {
        1.0 - track_boxes[i].iou(&det_boxes[j])
    })
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Minimum-cost assignment; pairs whose cost exceeds `max_distance` are rejected.
pub fn linear_assignment(cost_matrix: &Array2<f32>, max_distance: f32) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 || num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: (0..num_rows).collect(),
            unmatched_detections: (0..num_cols).collect(),
        };
    }

    let size = num_rows.max(num_cols);
    let padded = Array2::<f64>::from_shape_fn((size, size), |(i, j)| {
        if i < num_rows && j < num_cols {
            cost_matrix[[i, j]] as f64
        } else {
            PADDING_COST
        }
    });

    let mut matches = vec![];
    let mut unmatched_tracks = vec![];
    let mut detection_free = vec![true; num_cols];

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row, &col) in row_to_col.iter().enumerate().take(num_rows) {
                if col < num_cols && cost_matrix[[row, col]] <= max_distance {
                    matches.push((row, col));
                    detection_free[col] = false;
                } else {
                    unmatched_tracks.push(row);
                }
            }
        }
        Err(err) => {
            tracing::warn!(?err, "assignment solver failed, leaving frame unmatched");
            unmatched_tracks = (0..num_rows).collect();
        }
    }

    let unmatched_detections = detection_free
        .iter()
        .enumerate()
        .filter_map(|(i, &free)| free.then_some(i))
        .collect();

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}
