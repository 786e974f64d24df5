use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Optional local view of what the camera sees.
///
/// Rendering is best effort: implementations log their own failures and
/// never affect the capture loop.
pub trait PreviewSink: Send {
    fn render(&mut self, frame: &Frame, faces: &[BoundingBox]);

    /// Frees display resources. Later renders are ignored.
    fn release(&mut self);
}

/// Headless deployments.
pub struct NullPreview;

impl PreviewSink for NullPreview {
    fn render(&mut self, _frame: &Frame, _faces: &[BoundingBox]) {}
    fn release(&mut self) {}
}
