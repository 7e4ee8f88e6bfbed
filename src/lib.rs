//! Track objects across video frames and keep a durable log of where each
//! confirmed track was seen.
//!
//! Per frame: a [`DetectionSource`] proposes boxes, the format adapter turns
//! them into tracker input, a [`Tracker`] associates them into persistent
//! identities, and every confirmed, fresh track is logged to an
//! [`EventLog`] and drawn onto the frame before it is written out.

pub mod config;
pub mod integration;
pub mod render;
pub mod store;
pub mod tracker;
pub mod video;

pub use config::{Config, ConfigError};
pub use integration::{
    DetectionSource, Pipeline, PipelineError, PipelineState, RawDetection, ReplayDetector,
    RunSummary, StopReason, StopSignal,
};
pub use render::{RenderStyle, Renderer};
pub use store::{EventLog, LogRecord, SqliteEventLog, StoreError};
pub use tracker::{Detection, MultiTracker, Track, TrackState, Tracker, TrackerConfig};
pub use video::{Frame, FrameSink, FrameSource, ImageSequenceSink, ImageSequenceSource, StreamInfo};
