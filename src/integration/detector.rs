//! Trait for object detection inference backends.

use serde::Deserialize;

use crate::video::Frame;

/// One candidate object as reported by a detector, before validation.
///
/// Fields are optional so that incomplete backend output can be carried to
/// the format adapter, which drops it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawDetection {
    /// Box corners as (x1, y1, x2, y2) in pixels
    pub xyxy: Option<[f32; 4]>,
    pub confidence: Option<f32>,
    pub class_id: Option<u32>,
}

impl RawDetection {
    pub fn new(xyxy: [f32; 4], confidence: f32, class_id: u32) -> Self {
        Self {
            xyxy: Some(xyxy),
            confidence: Some(confidence),
            class_id: Some(class_id),
        }
    }
}

/// Trait for object detection inference backends.
///
/// Implement this trait to connect any detection model to the pipeline.
///
/// # Example
///
/// ```ignore
/// use bottletrack_rs::{DetectionSource, Frame, RawDetection};
///
/// struct MyDetector;
///
/// impl DetectionSource for MyDetector {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, frame: &Frame, min_confidence: f32) -> Result<Vec<RawDetection>, Self::Error> {
///         Ok(vec![])
///     }
/// }
/// ```
pub trait DetectionSource {
    /// Error type for detection failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Run inference on one frame.
    ///
    /// Detections scoring below `min_confidence` must not be returned.
    fn detect(&mut self, frame: &Frame, min_confidence: f32) -> Result<Vec<RawDetection>, Self::Error>;
}
