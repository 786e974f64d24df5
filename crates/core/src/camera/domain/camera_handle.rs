use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("camera open failed: {0}")]
    Open(String),
    #[error("camera read failed: {0}")]
    Read(String),
    #[error("camera is not open")]
    NotOpen,
}

/// Lifecycle of one capture device.
///
/// `open` and `close` are idempotent: opening an open camera and closing a
/// closed one are no-ops. A camera has exactly one owner at a time, so the
/// methods take `&mut self` and implementations need no internal locking.
pub trait CameraHandle: Send {
    fn open(&mut self) -> Result<(), CameraError>;

    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Reads the next frame. Fails with [`CameraError::NotOpen`] when closed.
    fn read_frame(&mut self) -> Result<Frame, CameraError>;
}
