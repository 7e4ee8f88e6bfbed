//! Frame loop combining detection, tracking, event logging and rendering.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;
use tracing::{debug, error, info, warn};

use super::{DetectionSource, RawDetection, adapt_detections, loggable_tracks};
use crate::render::Renderer;
use crate::store::{EventLog, LogRecord, StoreError};
use crate::tracker::{Tracker, TrackerError};
use crate::video::{Frame, FrameError, FrameSink, FrameSource};

pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The frame source ran out of frames
    Exhausted,
    /// A [`StopSignal`] was raised
    Requested,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("event log setup failed: {0}")]
    Setup(#[source] StoreError),
    #[error("reading frame failed: {0}")]
    Source(#[source] FrameError),
    #[error("writing frame {frame} failed: {source}")]
    Sink {
        frame: u64,
        #[source]
        source: FrameError,
    },
    #[error("detector failed on frame {frame}: {source}")]
    Detector {
        frame: u64,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("tracker failed on frame {frame}: {source}")]
    Tracker {
        frame: u64,
        #[source]
        source: TrackerError,
    },
    #[error("pipeline has already stopped")]
    Stopped,
}

/// Cooperative stop request, observed between frames.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Underlying flag, for registering OS signal handlers.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub records_logged: u64,
    pub log_failures: u64,
    /// Errors raised while closing the source or sink
    pub release_errors: u64,
    pub stop_reason: Option<StopReason>,
}

/// Single-threaded driver: one frame is read, detected, tracked, logged,
/// drawn and written before the next is read.
///
/// The source and sink are released exactly once, on success, on error, or
/// when the pipeline is dropped mid-run.
pub struct Pipeline<S, K, D, T, L>
where
    S: FrameSource,
    K: FrameSink,
    D: DetectionSource,
    T: Tracker,
    L: EventLog,
{
    source: S,
    sink: K,
    detector: D,
    tracker: T,
    event_log: L,
    renderer: Renderer,
    min_confidence: f32,
    timestamp_format: String,
    stop: StopSignal,
    state: PipelineState,
    history: Vec<PipelineState>,
    summary: RunSummary,
    released: bool,
}

impl<S, K, D, T, L> Pipeline<S, K, D, T, L>
where
    S: FrameSource,
    K: FrameSink,
    D: DetectionSource,
    T: Tracker,
    L: EventLog,
{
    /// Prepare the event log and enter `Running`.
    ///
    /// On failure the source and sink are released before returning.
    pub fn new(
        source: S,
        sink: K,
        detector: D,
        tracker: T,
        event_log: L,
        renderer: Renderer,
    ) -> Result<Self, PipelineError> {
        let mut pipeline = Self {
            source,
            sink,
            detector,
            tracker,
            event_log,
            renderer,
            min_confidence: 0.4,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            stop: StopSignal::new(),
            state: PipelineState::Running,
            history: vec![PipelineState::Running],
            summary: RunSummary::default(),
            released: false,
        };

        if let Err(e) = pipeline.event_log.init() {
            pipeline.shutdown();
            return Err(PipelineError::Setup(e));
        }
        Ok(pipeline)
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// `timestamp_format` must be a valid chrono format string.
    pub fn with_timestamp_format(mut self, timestamp_format: impl Into<String>) -> Self {
        self.timestamp_format = timestamp_format.into();
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Every state entered so far, starting with `Running`.
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn event_log(&self) -> &L {
        &self.event_log
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Process frames until the source is exhausted, a stop is requested,
    /// or a fatal error occurs, then release all resources.
    pub fn run(&mut self) -> Result<RunSummary, PipelineError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::Stopped);
        }
        info!(
            fps = self.source.info().fps,
            width = self.source.info().width,
            height = self.source.info().height,
            "pipeline running"
        );

        let outcome = self.run_frames();
        self.shutdown();

        match outcome {
            Ok(reason) => {
                self.summary.stop_reason = Some(reason);
                info!(
                    frames = self.summary.frames,
                    records = self.summary.records_logged,
                    log_failures = self.summary.log_failures,
                    ?reason,
                    "pipeline finished"
                );
                Ok(self.summary.clone())
            }
            Err(e) => {
                error!(error = %e, frames = self.summary.frames, "pipeline aborted");
                Err(e)
            }
        }
    }

    fn run_frames(&mut self) -> Result<StopReason, PipelineError> {
        loop {
            if self.stop.is_requested() {
                info!("stop requested");
                return Ok(StopReason::Requested);
            }

            let Some(mut frame) = self.source.next_frame().map_err(PipelineError::Source)? else {
                return Ok(StopReason::Exhausted);
            };

            self.process_frame(&mut frame)?;
            self.sink
                .write_frame(&frame)
                .map_err(|source| PipelineError::Sink {
                    frame: frame.index,
                    source,
                })?;
            self.summary.frames += 1;
        }
    }

    fn process_frame(&mut self, frame: &mut Frame) -> Result<(), PipelineError> {
        let raw = self.detect(frame)?;
        let detections = adapt_detections(&raw);
        let tracks = self
            .tracker
            .update(detections, frame)
            .map_err(|source| PipelineError::Tracker {
                frame: frame.index,
                source,
            })?;

        let timestamp = Local::now().format(&self.timestamp_format).to_string();
        let mut reported = 0usize;

        for track in loggable_tracks(&tracks) {
            let (center_x, center_y) = track.centroid();
            let record = LogRecord {
                bottle_id: track.track_id,
                class_id: track.class_id,
                timestamp: timestamp.clone(),
                center_x,
                center_y,
            };
            match self.event_log.log(&record) {
                Ok(()) => self.summary.records_logged += 1,
                Err(e) => {
                    self.summary.log_failures += 1;
                    warn!(
                        frame = frame.index,
                        track_id = track.track_id,
                        error = %e,
                        "failed to log track observation"
                    );
                }
            }
            self.renderer
                .draw(frame, track.ltrb, track.class_id, track.track_id);
            reported += 1;
        }

        debug!(
            frame = frame.index,
            detections = raw.len(),
            tracks = tracks.len(),
            reported,
            "frame processed"
        );
        Ok(())
    }

    /// Run the detector, retrying once on failure.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>, PipelineError> {
        match self.detector.detect(frame, self.min_confidence) {
            Ok(detections) => Ok(detections),
            Err(first) => {
                warn!(frame = frame.index, error = %first, "detector failed, retrying once");
                self.detector
                    .detect(frame, self.min_confidence)
                    .map_err(|source| PipelineError::Detector {
                        frame: frame.index,
                        source: Box::new(source),
                    })
            }
        }
    }

    fn transition(&mut self, next: PipelineState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "pipeline state change");
            self.state = next;
            self.history.push(next);
        }
    }

    /// Move through `Stopping` to `Stopped`, releasing resources once.
    fn shutdown(&mut self) {
        if self.released {
            return;
        }
        self.transition(PipelineState::Stopping);
        self.released = true;

        if let Err(e) = self.sink.release() {
            self.summary.release_errors += 1;
            warn!(error = %e, "failed to release frame sink");
        }
        if let Err(e) = self.source.release() {
            self.summary.release_errors += 1;
            warn!(error = %e, "failed to release frame source");
        }
        self.transition(PipelineState::Stopped);
    }
}

impl<S, K, D, T, L> Drop for Pipeline<S, K, D, T, L>
where
    S: FrameSource,
    K: FrameSink,
    D: DetectionSource,
    T: Tracker,
    L: EventLog,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}
