//! Burn inference backend for object detection.
//!
//! `BurnDetector` implements [`DetectionSource`] for detection networks
//! built with the Burn framework.
//!
//! # Example
//!
//! ```ignore
//! use bottletrack_rs::integration::{BurnDetector, BurnModel, ModelOutput};
//! use burn::backend::NdArray;
//!
//! struct MyYoloModel { /* ... */ }
//!
//! impl BurnModel<NdArray> for MyYoloModel {
//!     fn forward(&self, input: burn::tensor::Tensor<NdArray, 4>) -> Vec<ModelOutput> {
//!         // Run inference and NMS
//!     }
//! }
//!
//! let detector = BurnDetector::new(MyYoloModel::load("yolo.mpk"), Default::default());
//! ```

use burn::prelude::*;
use burn::tensor::Tensor;
use image::imageops::{self, FilterType};

use super::{DetectionSource, RawDetection};
use crate::video::Frame;

#[derive(Debug, Clone, thiserror::Error)]
pub enum BurnDetectorError {
    #[error("cannot resize a {got:?} frame to model input {expected:?}")]
    InputSize {
        expected: (u32, u32),
        got: (u32, u32),
    },
}

/// One post-NMS prediction from the network, in model input pixels.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    /// (x1, y1, x2, y2), or (cx, cy, w, h) when the model says so
    pub bbox: [f32; 4],
    pub score: f32,
    pub class_id: u32,
}

/// Trait for Burn-based detection models.
pub trait BurnModel<B: Backend>: Send + Sync {
    /// Forward pass on a `[1, 3, height, width]` tensor scaled to `[0, 1]`.
    fn forward(&self, input: Tensor<B, 4>) -> Vec<ModelOutput>;

    /// Expected input size as (width, height).
    fn input_size(&self) -> (u32, u32) {
        (640, 640)
    }

    /// Whether `bbox` is centre/size rather than two corners.
    fn bbox_is_cxcywh(&self) -> bool {
        true
    }
}

pub struct BurnDetector<B: Backend, M: BurnModel<B>> {
    model: M,
    device: B::Device,
}

impl<B: Backend, M: BurnModel<B>> BurnDetector<B, M> {
    pub fn new(model: M, device: B::Device) -> Self {
        Self { model, device }
    }

    /// Stretch an RGB frame to the model input size and convert it into a
    /// planar, normalised tensor.
    pub fn preprocess(&self, frame: &Frame) -> Result<Tensor<B, 4>, BurnDetectorError> {
        let expected = self.model.input_size();
        let got = frame.image.dimensions();
        if expected.0 == 0 || expected.1 == 0 || got.0 == 0 || got.1 == 0 {
            return Err(BurnDetectorError::InputSize { expected, got });
        }

        let resized;
        let image = if got == expected {
            &frame.image
        } else {
            resized = imageops::resize(&frame.image, expected.0, expected.1, FilterType::Triangle);
            &resized
        };

        let (width, height) = (expected.0 as usize, expected.1 as usize);
        let plane = width * height;
        let mut data = vec![0f32; 3 * plane];
        for (i, pixel) in image.pixels().enumerate() {
            for c in 0..3 {
                data[c * plane + i] = pixel[c] as f32 / 255.0;
            }
        }

        Ok(Tensor::<B, 1>::from_floats(data.as_slice(), &self.device).reshape([1, 3, height, width]))
    }

    /// Filter by confidence and map boxes from model input to frame pixels.
    fn postprocess(
        &self,
        outputs: Vec<ModelOutput>,
        frame_size: (u32, u32),
        min_confidence: f32,
    ) -> Vec<RawDetection> {
        let cxcywh = self.model.bbox_is_cxcywh();
        let (input_w, input_h) = self.model.input_size();
        let sx = frame_size.0 as f32 / input_w as f32;
        let sy = frame_size.1 as f32 / input_h as f32;

        outputs
            .into_iter()
            .filter(|o| o.score >= min_confidence)
            .map(|o| {
                let [a, b, c, d] = o.bbox;
                let [x1, y1, x2, y2] = if cxcywh {
                    [a - c / 2.0, b - d / 2.0, a + c / 2.0, b + d / 2.0]
                } else {
                    o.bbox
                };
                RawDetection::new([x1 * sx, y1 * sy, x2 * sx, y2 * sy], o.score, o.class_id)
            })
            .collect()
    }
}

impl<B: Backend, M: BurnModel<B>> DetectionSource for BurnDetector<B, M> {
    type Error = BurnDetectorError;

    fn detect(&mut self, frame: &Frame, min_confidence: f32) -> Result<Vec<RawDetection>, Self::Error> {
        let tensor = self.preprocess(frame)?;
        let outputs = self.model.forward(tensor);
        Ok(self.postprocess(outputs, frame.image.dimensions(), min_confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use image::{Rgb, RgbImage};

    /// Fixed-output model that checks the tensor it is fed.
    struct StubModel {
        input: (u32, u32),
        corners: bool,
        outputs: Vec<ModelOutput>,
    }

    impl BurnModel<NdArray> for StubModel {
        fn forward(&self, input: Tensor<NdArray, 4>) -> Vec<ModelOutput> {
            let (w, h) = self.input;
            assert_eq!(input.dims(), [1, 3, h as usize, w as usize]);
            self.outputs.clone()
        }

        fn input_size(&self) -> (u32, u32) {
            self.input
        }

        fn bbox_is_cxcywh(&self) -> bool {
            !self.corners
        }
    }

    fn detector(model: StubModel) -> BurnDetector<NdArray, StubModel> {
        BurnDetector::new(model, Default::default())
    }

    #[test]
    fn test_frame_resized_and_boxes_mapped_back() {
        let mut det = detector(StubModel {
            input: (320, 320),
            corners: false,
            outputs: vec![
                ModelOutput {
                    bbox: [160.0, 160.0, 64.0, 32.0],
                    score: 0.9,
                    class_id: 39,
                },
                ModelOutput {
                    bbox: [10.0, 10.0, 4.0, 4.0],
                    score: 0.2,
                    class_id: 39,
                },
            ],
        });
        let frame = Frame::new(0, RgbImage::new(640, 480));

        let raw = det.detect(&frame, 0.4).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].xyxy, Some([256.0, 216.0, 384.0, 264.0]));
        assert_eq!(raw[0].confidence, Some(0.9));
        assert_eq!(raw[0].class_id, Some(39));
    }

    #[test]
    fn test_corner_boxes_at_native_size() {
        let mut det = detector(StubModel {
            input: (8, 6),
            corners: true,
            outputs: vec![ModelOutput {
                bbox: [1.0, 2.0, 5.0, 4.0],
                score: 0.5,
                class_id: 0,
            }],
        });
        let frame = Frame::new(0, RgbImage::from_pixel(8, 6, Rgb([255, 0, 51])));

        let tensor = det.preprocess(&frame).unwrap();
        let values = tensor.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values.len(), 3 * 8 * 6);
        assert_eq!(values[0], 1.0);
        assert_eq!(values[48], 0.0);
        assert!((values[96] - 0.2).abs() < 1e-6);

        let raw = det.detect(&frame, 0.4).unwrap();
        assert_eq!(raw[0].xyxy, Some([1.0, 2.0, 5.0, 4.0]));
    }

    #[test]
    fn test_empty_frame_rejected() {
        let mut det = detector(StubModel {
            input: (8, 8),
            corners: true,
            outputs: vec![],
        });
        let frame = Frame::new(0, RgbImage::new(0, 0));
        assert!(matches!(
            det.detect(&frame, 0.4),
            Err(BurnDetectorError::InputSize { .. })
        ));
    }
}
