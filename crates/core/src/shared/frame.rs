use ndarray::{ArrayView3, ArrayViewMut3};

use crate::shared::bounding_box::BoundingBox;

/// A single camera frame: contiguous RGB bytes in row-major order.
///
/// Pixel format conversion happens inside the camera backends; everything
/// downstream of [`CameraHandle`](crate::camera::domain::camera_handle::CameraHandle)
/// sees packed 8-bit channels.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    sequence: u64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, sequence: u64) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            sequence,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Monotonic read counter assigned by the camera that produced the frame.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        let shape = self.shape();
        ArrayViewMut3::from_shape(shape, &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels under `bbox`, clamped to the frame bounds.
    ///
    /// Returns `None` when nothing of the box lies inside the frame.
    pub fn crop(&self, bbox: &BoundingBox) -> Option<Frame> {
        let visible = bbox.clamp_to(self.width, self.height)?;

        let x1 = visible.x as usize;
        let y1 = visible.y as usize;
        let x2 = x1 + visible.width as usize;
        let y2 = y1 + visible.height as usize;
        let channels = self.channels as usize;

        let src = self.as_ndarray();
        let mut data = Vec::with_capacity((x2 - x1) * (y2 - y1) * channels);
        for row in y1..y2 {
            for col in x1..x2 {
                for c in 0..channels {
                    data.push(src[[row, col, c]]);
                }
            }
        }

        Some(Frame::new(
            data,
            visible.width as u32,
            visible.height as u32,
            self.channels,
            self.sequence,
        ))
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
