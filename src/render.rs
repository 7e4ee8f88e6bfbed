//! Box and label annotation of frames.

use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect as PixelRect;

use crate::video::Frame;

/// DejaVu Sans, used for labels when no font file is configured.
pub const DEFAULT_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("cannot read font {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}: not a usable TrueType/OpenType font")]
    InvalidFont(String),
}

/// Drawing parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderStyle {
    pub color: [u8; 3],
    /// Box outline width in pixels
    pub thickness: u32,
    /// Gap between the label's baseline and the box's top edge
    pub label_margin: i32,
    /// Label height in pixels
    pub font_size: f32,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            color: [0, 255, 0],
            thickness: 2,
            label_margin: 10,
            font_size: 16.0,
        }
    }
}

pub struct Renderer {
    style: RenderStyle,
    font: Option<FontVec>,
}

impl Renderer {
    /// A renderer without a font draws boxes only.
    pub fn new(style: RenderStyle, font: Option<FontVec>) -> Self {
        Self { style, font }
    }

    pub fn with_font_file(style: RenderStyle, path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|_| RenderError::InvalidFont(path.display().to_string()))?;
        Ok(Self::new(style, Some(font)))
    }

    /// Renderer labelling with the bundled [`DEFAULT_FONT`].
    pub fn with_default_font(style: RenderStyle) -> Result<Self, RenderError> {
        let font = FontVec::try_from_vec(DEFAULT_FONT.to_vec())
            .map_err(|_| RenderError::InvalidFont("bundled DejaVu Sans".into()))?;
        Ok(Self::new(style, Some(font)))
    }

    pub fn style(&self) -> &RenderStyle {
        &self.style
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw one track's box and `ID:<track> Class:<class>` label onto the frame.
    pub fn draw(&self, frame: &mut Frame, ltrb: [f32; 4], class_id: u32, track_id: u64) {
        let [l, t, r, b] = ltrb.map(|v| v as i32);
        let color = Rgb(self.style.color);
        draw_box(&mut frame.image, (l, t, r, b), self.style.thickness, color);

        let Some(font) = &self.font else {
            return;
        };
        let label = label_text(track_id, class_id);
        let scale = PxScale::from(self.style.font_size);
        let (text_w, text_h) = text_size(scale, font, &label);
        let (x, y) = label_origin(
            (l, t),
            (text_w, text_h),
            self.style.label_margin,
            frame.image.dimensions(),
        );
        draw_text_mut(&mut frame.image, color, x, y, scale, font, &label);
    }
}

pub fn label_text(track_id: u64, class_id: u32) -> String {
    format!("ID:{track_id} Class:{class_id}")
}

/// Top-left corner for a label sitting `margin` pixels above the box, kept
/// inside the frame when the box touches the top or right edge.
pub fn label_origin(
    (left, top): (i32, i32),
    (text_w, text_h): (u32, u32),
    margin: i32,
    (frame_w, frame_h): (u32, u32),
) -> (i32, i32) {
    let max_x = (frame_w as i32 - text_w as i32).max(0);
    let max_y = (frame_h as i32 - text_h as i32).max(0);
    let x = left.clamp(0, max_x);
    let y = top
        .saturating_sub(margin)
        .saturating_sub(text_h as i32)
        .clamp(0, max_y);
    (x, y)
}

/// Outline covering both corners inclusively, with `thickness` nested rings
/// growing inward.
fn draw_box(image: &mut RgbImage, (l, t, r, b): (i32, i32, i32, i32), thickness: u32, color: Rgb<u8>) {
    let rings = i64::from(thickness.max(1));
    let (w, h) = (i64::from(image.width()), i64::from(image.height()));
    // Edges further off-frame than any ring can reach are pulled in, keeping
    // them off-frame while bounding the arithmetic below.
    let clip = |v: i32, size: i64| i64::from(v).clamp(-rings - 1, size + rings);
    let (l, r) = (clip(l, w), clip(r, w));
    let (t, b) = (clip(t, h), clip(b, h));

    for inset in 0..rings {
        let width = r - l + 1 - 2 * inset;
        let height = b - t + 1 - 2 * inset;
        if width <= 0 || height <= 0 {
            break;
        }
        let rect = PixelRect::at((l + inset) as i32, (t + inset) as i32)
            .of_size(width as u32, height as u32);
        draw_hollow_rect_mut(image, rect, color);
    }
}
