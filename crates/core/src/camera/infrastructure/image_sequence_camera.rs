use std::fs;
use std::path::{Path, PathBuf};

use crate::camera::domain::camera_handle::{CameraError, CameraHandle};
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

/// Adapts a directory of still images to the [`CameraHandle`] interface.
///
/// Images are replayed in file-name order and the sequence loops, so a
/// headless box without a webcam can run the full control loop.
pub struct ImageSequenceCamera {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    sequence: u64,
    open: bool,
}

impl ImageSequenceCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Vec::new(),
            cursor: 0,
            sequence: 0,
            open: false,
        }
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_image(path))
        .collect();
    files.sort();
    Ok(files)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

impl CameraHandle for ImageSequenceCamera {
    fn open(&mut self) -> Result<(), CameraError> {
        if self.open {
            return Ok(());
        }
        let files = list_images(&self.dir)
            .map_err(|e| CameraError::Open(format!("{}: {e}", self.dir.display())))?;
        if files.is_empty() {
            return Err(CameraError::Open(format!(
                "no images found in {}",
                self.dir.display()
            )));
        }
        log::info!(
            "Replaying {} images from {}",
            files.len(),
            self.dir.display()
        );
        self.files = files;
        self.cursor = 0;
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.files.clear();
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        if !self.open {
            return Err(CameraError::NotOpen);
        }
        let path = &self.files[self.cursor % self.files.len()];
        self.cursor = (self.cursor + 1) % self.files.len();

        let img = image::open(path)
            .map_err(|e| CameraError::Read(format!("{}: {e}", path.display())))?
            .to_rgb8();
        let (width, height) = img.dimensions();
        let frame = Frame::new(img.into_raw(), width, height, 3, self.sequence);
        self.sequence += 1;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_image(dir: &Path, name: &str, width: u32, height: u32, shade: u8) {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([shade, shade, shade]));
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_read_before_open_is_not_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut camera = ImageSequenceCamera::new(dir.path());
        assert!(matches!(camera.read_frame(), Err(CameraError::NotOpen)));
    }

    #[test]
    fn test_open_empty_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut camera = ImageSequenceCamera::new(dir.path());
        assert!(matches!(camera.open(), Err(CameraError::Open(_))));
        assert!(!camera.is_open());
    }

    #[test]
    fn test_open_missing_dir_fails() {
        let mut camera = ImageSequenceCamera::new("/nonexistent/facewatch/frames");
        assert!(camera.open().is_err());
    }

    #[test]
    fn test_replays_in_name_order_and_loops() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "b.png", 4, 2, 20);
        write_image(dir.path(), "a.png", 4, 2, 10);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut camera = ImageSequenceCamera::new(dir.path());
        camera.open().unwrap();

        let shades: Vec<u8> = (0..3)
            .map(|_| camera.read_frame().unwrap().data()[0])
            .collect();
        assert_eq!(shades, vec![10, 20, 10]);
    }

    #[test]
    fn test_frames_carry_dimensions_and_sequence() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "a.png", 6, 3, 0);
        let mut camera = ImageSequenceCamera::new(dir.path());
        camera.open().unwrap();

        let first = camera.read_frame().unwrap();
        let second = camera.read_frame().unwrap();
        assert_eq!((first.width(), first.height(), first.channels()), (6, 3, 3));
        assert_eq!(first.sequence(), 0);
        assert_eq!(second.sequence(), 1);
    }

    #[test]
    fn test_open_and_close_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "a.png", 2, 2, 0);
        let mut camera = ImageSequenceCamera::new(dir.path());

        camera.close();
        camera.open().unwrap();
        camera.open().unwrap();
        assert!(camera.is_open());
        camera.close();
        camera.close();
        assert!(!camera.is_open());
        assert!(matches!(camera.read_frame(), Err(CameraError::NotOpen)));
    }
}
