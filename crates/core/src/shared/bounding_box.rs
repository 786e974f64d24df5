/// Axis-aligned face box in frame pixel coordinates.
///
/// Produced by a [`FaceDetector`](crate::detection::domain::face_detector::FaceDetector)
/// and consumed within the same capture iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Width divided by height. `None` for a zero or negative height.
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.height <= 0 {
            return None;
        }
        Some(self.width as f64 / self.height as f64)
    }

    /// Intersection of this box with a `frame_w` x `frame_h` frame.
    pub fn clamp_to(&self, frame_w: u32, frame_h: u32) -> Option<BoundingBox> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = (self.x.saturating_add(self.width)).min(frame_w as i32);
        let y2 = (self.y.saturating_add(self.height)).min(frame_h as i32);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(BoundingBox::new(x1, y1, x2 - x1, y2 - y1))
    }
}
