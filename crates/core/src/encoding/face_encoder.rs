use std::io::Cursor;

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use thiserror::Error;

use crate::remote::domain::records::{timestamp_now, FaceRecord};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::constants::DEFAULT_JPEG_QUALITY;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("face region {0:?} lies outside the frame")]
    EmptyCrop(BoundingBox),
    #[error("unsupported channel count {0}")]
    Channels(u8),
    #[error("JPEG encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),
}

/// Turns a detected face into upload-ready text: crop, JPEG, base64.
#[derive(Debug, Clone, Copy)]
pub struct FaceEncoder {
    quality: u8,
}

impl FaceEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn encode(&self, frame: &Frame, bbox: &BoundingBox) -> Result<String, EncodeError> {
        let crop = frame.crop(bbox).ok_or(EncodeError::EmptyCrop(*bbox))?;
        let color = match crop.channels() {
            1 => ExtendedColorType::L8,
            3 => ExtendedColorType::Rgb8,
            n => return Err(EncodeError::Channels(n)),
        };

        let mut jpeg = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut jpeg, self.quality).write_image(
            crop.data(),
            crop.width(),
            crop.height(),
            color,
        )?;
        Ok(base64::engine::general_purpose::STANDARD.encode(jpeg.into_inner()))
    }

    /// Encodes `bbox` and stamps it with the current local time.
    pub fn face_record(&self, frame: &Frame, bbox: &BoundingBox) -> Result<FaceRecord, EncodeError> {
        Ok(FaceRecord {
            timestamp: timestamp_now(),
            image: self.encode(frame, bbox)?,
        })
    }
}

impl Default for FaceEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}
