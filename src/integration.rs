//! Glue between a detector, the tracker, the event log and the renderer.
//!
//! Detector output is adapted into tracker input, the tracker snapshot is
//! filtered down to loggable tracks, and [`Pipeline`] drives the whole loop
//! frame by frame.

mod adapter;
mod detector;
mod filter;
mod pipeline;
mod replay;

pub use adapter::{adapt_detection, adapt_detections};
pub use detector::{DetectionSource, RawDetection};
pub use filter::{MAX_STALE_FRAMES, is_loggable, loggable_tracks};
pub use pipeline::{
    DEFAULT_TIMESTAMP_FORMAT, Pipeline, PipelineError, PipelineState, RunSummary, StopReason,
    StopSignal,
};
pub use replay::{ReplayDetector, ReplayError};

#[cfg(feature = "burn-backend")]
mod burn_backend;

#[cfg(feature = "burn-backend")]
pub use burn_backend::{BurnDetector, BurnDetectorError, BurnModel, ModelOutput};
