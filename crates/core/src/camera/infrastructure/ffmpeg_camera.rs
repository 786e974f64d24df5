use crate::camera::domain::camera_handle::{CameraError, CameraHandle};
use crate::shared::frame::Frame;

/// Upper bound on packets pulled per `read_frame` before giving up.
const MAX_PACKETS_PER_FRAME: usize = 64;

/// Live capture device opened through libavdevice (`v4l2`, `avfoundation`,
/// `dshow`, ...).
///
/// Each read decodes the next video packet and converts it to RGB24.
pub struct FfmpegCamera {
    device: String,
    format: Option<String>,
    session: Option<CaptureSession>,
    sequence: u64,
}

struct CaptureSession {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
}

// Safety: FfmpegCamera is owned by a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegCamera {}

impl FfmpegCamera {
    pub fn new(device: impl Into<String>, format: Option<String>) -> Self {
        Self {
            device: device.into(),
            format,
            session: None,
            sequence: 0,
        }
    }

    fn open_input(&self) -> Result<ffmpeg_next::format::context::Input, CameraError> {
        let open_err = |e: ffmpeg_next::Error| CameraError::Open(format!("{}: {e}", self.device));

        let Some(name) = self.format.as_deref() else {
            return ffmpeg_next::format::input(&self.device).map_err(open_err);
        };

        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name() == name)
            .ok_or_else(|| CameraError::Open(format!("input format '{name}' not available")))?;
        let ctx = ffmpeg_next::format::open_with(
            &self.device,
            &format,
            ffmpeg_next::Dictionary::new(),
        )
        .map_err(open_err)?;
        if !ctx.is_input() {
            return Err(CameraError::Open(format!(
                "{} did not open as an input device",
                self.device
            )));
        }
        Ok(ctx.input())
    }

    fn start_session(&self) -> Result<CaptureSession, CameraError> {
        ffmpeg_next::init().map_err(|e| CameraError::Open(e.to_string()))?;
        ffmpeg_next::device::register_all();

        let ictx = self.open_input()?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| CameraError::Open(format!("{}: no video stream", self.device)))?;
        let stream_index = stream.index();

        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .and_then(|ctx| ctx.decoder().video())
            .map_err(|e| CameraError::Open(format!("decoder: {e}")))?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| CameraError::Open(format!("scaler: {e}")))?;

        Ok(CaptureSession {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
        })
    }
}

impl CaptureSession {
    fn next_rgb(&mut self) -> Result<Vec<u8>, CameraError> {
        for _ in 0..MAX_PACKETS_PER_FRAME {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                return Err(CameraError::Read("device stream ended".into()));
            };
            if stream.index() != self.stream_index {
                continue;
            }
            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }

            let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
                self.scaler
                    .run(&decoded, &mut rgb)
                    .map_err(|e| CameraError::Read(format!("scale: {e}")))?;
                return Ok(extract_rgb_pixels(&rgb, self.width, self.height));
            }
        }
        Err(CameraError::Read("no decodable frame".into()))
    }
}

fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;

    let mut pixels = Vec::with_capacity(w * height as usize * 3);
    for row in 0..height as usize {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}

impl CameraHandle for FfmpegCamera {
    fn open(&mut self) -> Result<(), CameraError> {
        if self.session.is_some() {
            return Ok(());
        }
        let session = self.start_session()?;
        log::info!(
            "Camera started: {} ({}x{})",
            self.device,
            session.width,
            session.height
        );
        self.session = Some(session);
        Ok(())
    }

    fn close(&mut self) {
        if self.session.take().is_some() {
            log::info!("Camera released: {}", self.device);
        }
    }

    fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        let session = self.session.as_mut().ok_or(CameraError::NotOpen)?;
        let pixels = session.next_rgb()?;
        let frame = Frame::new(pixels, session.width, session.height, 3, self.sequence);
        self.sequence += 1;
        Ok(frame)
    }
}

impl Drop for FfmpegCamera {
    fn drop(&mut self) {
        self.close();
    }
}
