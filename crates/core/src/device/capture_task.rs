use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::camera::domain::camera_handle::CameraHandle;
use crate::config::{DeviceConfig, StatusPolicy};
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_filter::FaceFilter;
use crate::device::capture_logger::{CaptureLogger, NullCaptureLogger};
use crate::device::control_watcher::CameraCommand;
use crate::device::device_state::DeviceState;
use crate::device::shutdown::Shutdown;
use crate::device::status_reporter::StatusReporter;
use crate::encoding::face_encoder::FaceEncoder;
use crate::preview::domain::preview_sink::{NullPreview, PreviewSink};
use crate::remote::domain::control_plane::RemoteControlPlane;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::constants::{
    STATUS_ERROR_NONE, STATUS_ERROR_OPEN_FAILED, STATUS_ERROR_READ_FAILED,
};
use crate::shared::frame::Frame;

/// Owned resources handed back when the capture loop exits, so the
/// supervisor can release them.
pub struct CaptureResources {
    pub camera: Box<dyn CameraHandle>,
    pub preview: Box<dyn PreviewSink>,
    pub logger: Box<dyn CaptureLogger>,
}

/// What one pass of the capture loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Not running or camera closed; no frame I/O attempted.
    Idle,
    ReadFailed,
    Captured { accepted: usize },
}

/// Enforces a minimum spacing between successive face uploads.
///
/// Persists across loop iterations, so the spacing also holds between the
/// last upload of one frame and the first of the next.
#[derive(Debug)]
pub struct UploadPacer {
    spacing: Duration,
    last: Option<Instant>,
}

impl UploadPacer {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last: None,
        }
    }

    /// Blocks until the next upload may start. Returns `false` if shutdown
    /// was triggered, in which case nothing should be uploaded.
    pub fn wait(&mut self, shutdown: &Shutdown) -> bool {
        if shutdown.is_triggered() {
            return false;
        }
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.spacing && shutdown.sleep(self.spacing - elapsed) {
                return false;
            }
        }
        true
    }

    pub fn mark(&mut self) {
        self.last = Some(Instant::now());
    }
}

/// The camera-owning loop: applies open/close commands, reads frames,
/// detects and uploads faces, and publishes activity status.
///
/// Sole writer of `camera_open`. Every I/O error is turned into a status
/// publish or a log line; nothing escapes the loop.
pub struct CaptureTask {
    camera: Box<dyn CameraHandle>,
    detector: Box<dyn FaceDetector>,
    preview: Box<dyn PreviewSink>,
    logger: Box<dyn CaptureLogger>,
    plane: Arc<dyn RemoteControlPlane>,
    status: StatusReporter,
    state: Arc<DeviceState>,
    commands: Receiver<CameraCommand>,
    filter: FaceFilter,
    encoder: FaceEncoder,
    pacer: UploadPacer,
    status_policy: StatusPolicy,
    last_activity: Option<bool>,
    idle_interval: Duration,
    frame_delay: Duration,
}

impl CaptureTask {
    pub fn new(
        camera: Box<dyn CameraHandle>,
        detector: Box<dyn FaceDetector>,
        plane: Arc<dyn RemoteControlPlane>,
        status: StatusReporter,
        state: Arc<DeviceState>,
        commands: Receiver<CameraCommand>,
        config: &DeviceConfig,
    ) -> Self {
        Self {
            camera,
            detector,
            preview: Box::new(NullPreview),
            logger: Box::new(NullCaptureLogger),
            plane,
            status,
            state,
            commands,
            filter: FaceFilter::from_config(config),
            encoder: FaceEncoder::new(config.jpeg_quality),
            pacer: UploadPacer::new(config.upload_spacing()),
            status_policy: config.status_policy,
            last_activity: None,
            idle_interval: config.idle_interval(),
            frame_delay: config.frame_delay(),
        }
    }

    pub fn with_preview(mut self, preview: Box<dyn PreviewSink>) -> Self {
        self.preview = preview;
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn CaptureLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Runs until shutdown and hands back the camera, preview and logger.
    /// The camera is left as is; closing it is the caller's job.
    pub fn run(mut self, shutdown: &Shutdown) -> CaptureResources {
        log::debug!("Capture loop started");
        while !shutdown.is_triggered() {
            let stopped = match self.step(shutdown) {
                StepOutcome::Idle => {
                    self.wait_idle(shutdown);
                    false
                }
                StepOutcome::ReadFailed => shutdown.sleep(self.idle_interval),
                StepOutcome::Captured { .. } => shutdown.sleep(self.frame_delay),
            };
            if stopped {
                break;
            }
        }
        log::debug!("Capture loop stopped");
        CaptureResources {
            camera: self.camera,
            preview: self.preview,
            logger: self.logger,
        }
    }

    /// One iteration: pending commands, then at most one frame.
    pub fn step(&mut self, shutdown: &Shutdown) -> StepOutcome {
        self.apply_pending();

        if !self.state.snapshot().should_capture() {
            return StepOutcome::Idle;
        }

        let frame = match self.camera.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Frame read failed: {e}");
                self.logger.count("read_failures");
                self.state.record_error(STATUS_ERROR_READ_FAILED);
                self.publish_event(STATUS_ERROR_READ_FAILED);
                return StepOutcome::ReadFailed;
            }
        };
        self.state.clear_error();

        let accepted = self.process(&frame, shutdown);
        StepOutcome::Captured { accepted }
    }

    /// Applies every queued command without blocking.
    pub fn apply_pending(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: CameraCommand) {
        match command {
            CameraCommand::Open => self.open_camera(),
            CameraCommand::Close => self.close_camera(),
        }
    }

    fn open_camera(&mut self) {
        if !self.state.desired_running() {
            log::debug!("Ignoring stale open request");
            return;
        }
        if self.camera.is_open() {
            self.state.set_camera_open(true);
            return;
        }
        match self.camera.open() {
            Ok(()) => {
                self.state.set_camera_open(true);
                self.state.clear_error();
                log::info!("Camera opened");
            }
            Err(e) => {
                log::error!("Camera open failed: {e}");
                self.state.record_error(STATUS_ERROR_OPEN_FAILED);
                self.publish_event(STATUS_ERROR_OPEN_FAILED);
            }
        }
    }

    fn close_camera(&mut self) {
        self.camera.close();
        self.state.set_camera_open(false);
        log::info!("Camera closed");
        self.publish_event(STATUS_ERROR_NONE);
    }

    /// Sleeps one idle interval, waking early for a command or shutdown.
    fn wait_idle(&mut self, shutdown: &Shutdown) {
        let commands = self.commands.clone();
        let idle = self.idle_interval;
        crossbeam_channel::select! {
            recv(commands) -> msg => match msg {
                Ok(command) => self.apply(command),
                // Watcher gone: nothing can change the state any more
                Err(_) => {
                    shutdown.sleep(idle);
                }
            },
            recv(shutdown.receiver()) -> _ => {},
            default(idle) => {},
        }
    }

    fn process(&mut self, frame: &Frame, shutdown: &Shutdown) -> usize {
        let t0 = Instant::now();
        let detected = match self.detector.detect(frame) {
            Ok(boxes) => boxes,
            Err(e) => {
                log::warn!("Face detection failed: {e}");
                self.logger.count("detect_failures");
                Vec::new()
            }
        };
        self.logger
            .timing("detect", t0.elapsed().as_secs_f64() * 1000.0);

        let faces = self.filter.apply(&detected);
        if detected.len() != faces.len() {
            log::debug!(
                "Frame {}: {} of {} detections rejected by shape filter",
                frame.sequence(),
                detected.len() - faces.len(),
                detected.len()
            );
        }

        let t0 = Instant::now();
        self.upload_faces(frame, &faces, shutdown);
        if !faces.is_empty() {
            self.logger
                .timing("upload", t0.elapsed().as_secs_f64() * 1000.0);
        }

        self.preview.render(frame, &faces);
        self.publish_activity(!faces.is_empty());
        self.logger.frame_processed(faces.len());
        faces.len()
    }

    fn upload_faces(&mut self, frame: &Frame, faces: &[BoundingBox], shutdown: &Shutdown) {
        for (i, bbox) in faces.iter().enumerate() {
            if !self.pacer.wait(shutdown) {
                log::info!(
                    "Shutdown during uploads, skipping {} face(s)",
                    faces.len() - i
                );
                return;
            }
            let record = match self.encoder.face_record(frame, bbox) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("Skipping face {bbox:?}: {e}");
                    self.logger.count("encode_failures");
                    continue;
                }
            };
            self.pacer.mark();
            match self.plane.publish_face(&record) {
                Ok(()) => {
                    log::info!("Face uploaded ({}x{})", bbox.width, bbox.height);
                    self.logger.count("faces_uploaded");
                }
                Err(e) => {
                    log::warn!("Face upload failed: {e}");
                    self.logger.count("upload_failures");
                }
            }
        }
    }

    fn publish_activity(&mut self, active: bool) {
        if self.status_policy == StatusPolicy::OnChange && self.last_activity == Some(active) {
            return;
        }
        self.status.publish(active, STATUS_ERROR_NONE);
        self.last_activity = Some(active);
    }

    /// Open/close/read events always go out and reset the activity memo.
    fn publish_event(&mut self, error: &str) {
        self.status.publish(false, error);
        self.last_activity = None;
    }
}
