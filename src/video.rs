//! Frame input and annotated-frame output.
//!
//! Video containers are not decoded here. A stream is a directory of still
//! images read in file-name order, and output is written the same way with a
//! `stream.json` manifest recording frame rate and geometry.

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Manifest file written next to output frames and honoured on input.
pub const MANIFEST_FILE: &str = "stream.json";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{path}: invalid stream manifest: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no image frames found in {0}")]
    Empty(PathBuf),
    #[error("frame {index} is {got:?}, stream is {expected:?}")]
    DimensionMismatch {
        index: u64,
        expected: (u32, u32),
        got: (u32, u32),
    },
    #[error("stream already released")]
    Released,
}

/// One decoded frame, numbered from 0 in source order.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Frame rate and geometry shared by the input and the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

/// Producer of successive frames.
pub trait FrameSource {
    fn info(&self) -> StreamInfo;

    /// Next frame, or `Ok(None)` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, FrameError>;

    fn release(&mut self) -> Result<(), FrameError>;
}

/// Consumer of annotated frames.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), FrameError>;

    /// Flush and close the output.
    fn release(&mut self) -> Result<(), FrameError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    #[serde(flatten)]
    info: StreamInfo,
    #[serde(default)]
    frames: u64,
}

/// Reads a directory of images as a video stream.
pub struct ImageSequenceSource {
    dir: PathBuf,
    paths: std::vec::IntoIter<PathBuf>,
    info: StreamInfo,
    next_index: u64,
    released: bool,
}

impl ImageSequenceSource {
    /// Open `dir`; `fallback_fps` is used unless the directory carries a manifest.
    pub fn open(dir: impl AsRef<Path>, fallback_fps: f64) -> Result<Self, FrameError> {
        let dir = dir.as_ref().to_path_buf();
        let paths = list_images(&dir)?;
        let first = paths
            .first()
            .ok_or_else(|| FrameError::Empty(dir.clone()))?;
        let (width, height) = image::image_dimensions(first).map_err(|source| FrameError::Image {
            path: first.clone(),
            source,
        })?;

        let fps = match read_manifest(&dir.join(MANIFEST_FILE))? {
            Some(manifest) => manifest.info.fps,
            None => fallback_fps,
        };

        info!(dir = %dir.display(), frames = paths.len(), width, height, fps, "opened frame source");

        Ok(Self {
            dir,
            paths: paths.into_iter(),
            info: StreamInfo { fps, width, height },
            next_index: 0,
            released: false,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FrameSource for ImageSequenceSource {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        if self.released {
            return Err(FrameError::Released);
        }
        let Some(path) = self.paths.next() else {
            return Ok(None);
        };

        let image = image::open(&path)
            .map_err(|source| FrameError::Image {
                path: path.clone(),
                source,
            })?
            .to_rgb8();

        let index = self.next_index;
        let got = image.dimensions();
        let expected = (self.info.width, self.info.height);
        if got != expected {
            return Err(FrameError::DimensionMismatch {
                index,
                expected,
                got,
            });
        }

        self.next_index += 1;
        Ok(Some(Frame::new(index, image)))
    }

    fn release(&mut self) -> Result<(), FrameError> {
        self.released = true;
        self.paths = Vec::new().into_iter();
        Ok(())
    }
}

/// Writes annotated frames as numbered PNG files plus a manifest.
pub struct ImageSequenceSink {
    dir: PathBuf,
    info: StreamInfo,
    written: u64,
    released: bool,
}

impl ImageSequenceSink {
    pub fn create(dir: impl AsRef<Path>, info: StreamInfo) -> Result<Self, FrameError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| FrameError::Io {
            path: dir.clone(),
            source,
        })?;
        let removed = clear_previous_output(&dir)?;
        if removed > 0 {
            debug!(removed, "removed frames of an earlier run");
        }
        info!(dir = %dir.display(), "opened frame sink");
        Ok(Self {
            dir,
            info,
            written: 0,
            released: false,
        })
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{index:06}.png"))
    }

    pub fn frames_written(&self) -> u64 {
        self.written
    }
}

impl FrameSink for ImageSequenceSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), FrameError> {
        if self.released {
            return Err(FrameError::Released);
        }
        let expected = (self.info.width, self.info.height);
        let got = (frame.width(), frame.height());
        if got != expected {
            return Err(FrameError::DimensionMismatch {
                index: frame.index,
                expected,
                got,
            });
        }

        let path = self.frame_path(self.written);
        frame
            .image
            .save(&path)
            .map_err(|source| FrameError::Image { path, source })?;
        self.written += 1;
        Ok(())
    }

    fn release(&mut self) -> Result<(), FrameError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let path = self.dir.join(MANIFEST_FILE);
        let manifest = Manifest {
            info: self.info,
            frames: self.written,
        };
        let json = serde_json::to_vec_pretty(&manifest).map_err(|source| FrameError::Manifest {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|source| FrameError::Io { path, source })?;
        debug!(frames = self.written, "frame sink closed");
        Ok(())
    }
}

/// Delete `frame_*.png` files and the manifest left by an earlier run, so a
/// shorter run does not leave stale frames behind. Other files are kept.
fn clear_previous_output(dir: &Path) -> Result<usize, FrameError> {
    let entries = fs::read_dir(dir).map_err(|source| FrameError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut removed = 0;
    for entry in entries {
        let path = entry
            .map_err(|source| FrameError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let is_output = name == MANIFEST_FILE || (name.starts_with("frame_") && name.ends_with(".png"));
        if is_output && path.is_file() {
            fs::remove_file(&path).map_err(|source| FrameError::Io {
                path: path.clone(),
                source,
            })?;
            removed += 1;
        }
    }
    Ok(removed)
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, FrameError> {
    let entries = fs::read_dir(dir).map_err(|source| FrameError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| FrameError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_image && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn read_manifest(path: &Path) -> Result<Option<Manifest>, FrameError> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path).map_err(|source| FrameError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| FrameError::Manifest {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn write_frames(dir: &Path, count: u32, width: u32, height: u32) {
        for i in 0..count {
            let img = RgbImage::from_pixel(width, height, Rgb([i as u8, 0, 0]));
            img.save(dir.join(format!("{i:03}.png"))).unwrap();
        }
    }

    #[test]
    fn test_source_reads_frames_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 3, 8, 6);
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), 25.0).unwrap();
        assert_eq!(
            source.info(),
            StreamInfo {
                fps: 25.0,
                width: 8,
                height: 6
            }
        );

        for expected in 0..3u64 {
            let frame = source.next_frame().unwrap().unwrap();
            assert_eq!(frame.index, expected);
            assert_eq!(frame.image.get_pixel(0, 0)[0], expected as u8);
        }
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequenceSource::open(dir.path(), 30.0),
            Err(FrameError::Empty(_))
        ));
    }

    #[test]
    fn test_missing_input_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequenceSource::open(dir.path().join("missing"), 30.0),
            Err(FrameError::Io { .. })
        ));
    }

    #[test]
    fn test_sink_manifest_feeds_back_into_source() {
        let input = tempfile::tempdir().unwrap();
        write_frames(input.path(), 2, 4, 4);
        let output = tempfile::tempdir().unwrap();

        let info = StreamInfo {
            fps: 12.5,
            width: 4,
            height: 4,
        };
        let mut source = ImageSequenceSource::open(input.path(), 12.5).unwrap();
        let mut sink = ImageSequenceSink::create(output.path(), info).unwrap();
        while let Some(frame) = source.next_frame().unwrap() {
            sink.write_frame(&frame).unwrap();
        }
        sink.release().unwrap();
        assert_eq!(sink.frames_written(), 2);

        let reopened = ImageSequenceSource::open(output.path(), 30.0).unwrap();
        assert_eq!(reopened.info(), info);
    }

    #[test]
    fn test_sink_clears_frames_of_an_earlier_run() {
        let output = tempfile::tempdir().unwrap();
        let info = StreamInfo {
            fps: 30.0,
            width: 4,
            height: 4,
        };

        let mut sink = ImageSequenceSink::create(output.path(), info).unwrap();
        for i in 0..3 {
            sink.write_frame(&Frame::new(i, RgbImage::new(4, 4))).unwrap();
        }
        sink.release().unwrap();
        fs::write(output.path().join("notes.txt"), "kept").unwrap();

        let mut sink = ImageSequenceSink::create(output.path(), info).unwrap();
        assert!(!output.path().join(MANIFEST_FILE).exists());
        sink.write_frame(&Frame::new(0, RgbImage::new(4, 4))).unwrap();
        sink.release().unwrap();

        assert!(output.path().join("frame_000000.png").exists());
        assert!(!output.path().join("frame_000001.png").exists());
        assert!(!output.path().join("frame_000002.png").exists());
        assert!(output.path().join("notes.txt").exists());

        let mut replay = ImageSequenceSource::open(output.path(), 30.0).unwrap();
        assert!(replay.next_frame().unwrap().is_some());
        assert!(replay.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_sink_rejects_wrong_geometry() {
        let output = tempfile::tempdir().unwrap();
        let info = StreamInfo {
            fps: 30.0,
            width: 4,
            height: 4,
        };
        let mut sink = ImageSequenceSink::create(output.path(), info).unwrap();
        let frame = Frame::new(0, RgbImage::new(5, 4));
        assert!(matches!(
            sink.write_frame(&frame),
            Err(FrameError::DimensionMismatch { .. })
        ));
    }
}
