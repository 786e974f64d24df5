use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{ExtendedColorType, ImageFormat, Rgb, RgbImage};

use crate::preview::domain::preview_sink::PreviewSink;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

const OVERLAY_COLOR: [u8; 3] = [0, 255, 0];
const OVERLAY_THICKNESS: i32 = 2;

/// Watermark glyph height and its margins from the bottom-left corner.
const WATERMARK_PX: f32 = 22.0;
const WATERMARK_MARGIN_X: i32 = 10;
const WATERMARK_MARGIN_BOTTOM: i32 = 20;

struct Watermark {
    text: String,
    font: FontVec,
}

/// Loads a TrueType/OpenType font for the preview watermark.
pub fn load_font(path: &Path) -> Result<FontVec, Box<dyn std::error::Error>> {
    let bytes = fs::read(path)?;
    FontVec::try_from_vec(bytes)
        .map_err(|e| format!("invalid font {}: {e}", path.display()).into())
}

/// Writes the latest frame, with accepted faces outlined and an optional
/// branding watermark, to a single image file that an external viewer can
/// poll.
pub struct SnapshotPreview {
    path: PathBuf,
    format: ImageFormat,
    watermark: Option<Watermark>,
    released: bool,
}

impl SnapshotPreview {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = ImageFormat::from_path(&path).unwrap_or(ImageFormat::Jpeg);
        Self {
            path,
            format,
            watermark: None,
            released: false,
        }
    }

    /// Stamps `text` in the bottom-left corner of every snapshot. Empty text
    /// leaves snapshots unmarked.
    pub fn with_watermark(mut self, text: impl Into<String>, font: FontVec) -> Self {
        let text = text.into();
        self.watermark = (!text.trim().is_empty()).then_some(Watermark { text, font });
        self
    }

    fn write(&self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let color = match frame.channels() {
            1 => ExtendedColorType::L8,
            3 => ExtendedColorType::Rgb8,
            n => return Err(format!("unsupported channel count {n}").into()),
        };
        if let (Some(mark), ExtendedColorType::Rgb8) = (&self.watermark, color) {
            let mut canvas =
                RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
                    .ok_or("frame buffer does not match its dimensions")?;
            let (x, y) = watermark_origin(frame.height());
            imageproc::drawing::draw_text_mut(
                &mut canvas,
                Rgb(OVERLAY_COLOR),
                x,
                y,
                PxScale::from(WATERMARK_PX),
                &mark.font,
                &mark.text,
            );
            return self.save(canvas.as_raw(), frame.width(), frame.height(), color);
        }
        self.save(frame.data(), frame.width(), frame.height(), color)
    }

    fn save(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        color: ExtendedColorType,
    ) -> Result<(), Box<dyn std::error::Error>> {
        // Write to a temp file first, then rename so viewers never see a torn image
        let temp_path = self.path.with_extension("part");
        image::save_buffer_with_format(&temp_path, data, width, height, color, self.format)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl PreviewSink for SnapshotPreview {
    fn render(&mut self, frame: &Frame, faces: &[BoundingBox]) {
        if self.released {
            return;
        }
        let mut annotated = frame.clone();
        for bbox in faces {
            draw_outline(&mut annotated, bbox);
        }
        if let Err(e) = self.write(&annotated) {
            log::warn!("Preview write to {} failed: {e}", self.path.display());
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            log::debug!("Preview released: {}", self.path.display());
        }
    }
}

/// Top-left of the watermark text, kept inside short frames.
fn watermark_origin(frame_height: u32) -> (i32, i32) {
    let y = frame_height as i32 - WATERMARK_MARGIN_BOTTOM - WATERMARK_PX as i32;
    (WATERMARK_MARGIN_X, y.max(0))
}

/// Draws a rectangle border inside `bbox`, clipped to the frame.
fn draw_outline(frame: &mut Frame, bbox: &BoundingBox) {
    let Some(visible) = bbox.clamp_to(frame.width(), frame.height()) else {
        return;
    };
    let channels = frame.channels() as usize;
    let (x1, y1) = (visible.x, visible.y);
    let (x2, y2) = (visible.x + visible.width, visible.y + visible.height);
    let t = OVERLAY_THICKNESS;

    let mut pixels = frame.as_ndarray_mut();
    for y in y1..y2 {
        for x in x1..x2 {
            let on_edge = x < x1 + t || x >= x2 - t || y < y1 + t || y >= y2 - t;
            if !on_edge {
                continue;
            }
            for c in 0..channels.min(3) {
                pixels[[y as usize, x as usize, c]] = OVERLAY_COLOR[c];
            }
        }
    }
}
