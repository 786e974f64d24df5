use std::sync::Arc;
use std::thread::JoinHandle;

use thiserror::Error;

use crate::camera::domain::camera_handle::CameraHandle;
use crate::config::DeviceConfig;
use crate::detection::domain::face_detector::FaceDetector;
use crate::device::capture_logger::CaptureLogger;
use crate::device::capture_task::{CaptureResources, CaptureTask};
use crate::device::control_watcher::ControlWatcher;
use crate::device::device_state::DeviceState;
use crate::device::shutdown::Shutdown;
use crate::device::status_reporter::StatusReporter;
use crate::preview::domain::preview_sink::PreviewSink;
use crate::remote::domain::control_plane::RemoteControlPlane;
use crate::remote::domain::records::BrandingInfo;
use crate::shared::constants::STATUS_ERROR_STOPPED;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("failed to spawn device thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("{0} thread panicked")]
    TaskPanicked(&'static str),
}

/// Everything the device needs, built by the entry point.
pub struct DeviceComponents {
    pub camera: Box<dyn CameraHandle>,
    pub detector: Box<dyn FaceDetector>,
    pub plane: Arc<dyn RemoteControlPlane>,
    pub preview: Box<dyn PreviewSink>,
    pub logger: Box<dyn CaptureLogger>,
    pub branding: BrandingInfo,
    pub config: DeviceConfig,
}

/// Runs the control watcher and capture threads until shutdown, then
/// releases the device.
///
/// Release order on every exit path: close camera, publish the final
/// `"stopped"` status, release the preview, log the capture summary.
pub struct Supervisor {
    shutdown: Shutdown,
    state: Arc<DeviceState>,
}

impl Supervisor {
    pub fn new(shutdown: Shutdown) -> Self {
        Self {
            shutdown,
            state: Arc::new(DeviceState::new()),
        }
    }

    pub fn state(&self) -> Arc<DeviceState> {
        Arc::clone(&self.state)
    }

    /// Blocks until shutdown is triggered or a device thread dies.
    pub fn run(&self, components: DeviceComponents) -> Result<(), SupervisorError> {
        let DeviceComponents {
            camera,
            detector,
            plane,
            preview,
            logger,
            branding,
            config,
        } = components;

        let status = StatusReporter::new(Arc::clone(&plane), branding);
        let mut guard = ReleaseGuard::new(status.clone(), Arc::clone(&self.state));
        let (command_tx, command_rx) = crossbeam_channel::unbounded();

        let capture = CaptureTask::new(
            camera,
            detector,
            Arc::clone(&plane),
            status,
            Arc::clone(&self.state),
            command_rx,
            &config,
        )
        .with_preview(preview)
        .with_logger(logger);
        let watcher = ControlWatcher::new(
            plane,
            Arc::clone(&self.state),
            command_tx,
            config.control_poll(),
        );

        let capture_handle = self.spawn("capture", move |shutdown| capture.run(shutdown))?;
        let watcher_handle = match self.spawn("control-watcher", move |shutdown| watcher.run(shutdown)) {
            Ok(handle) => handle,
            Err(e) => {
                self.shutdown.trigger();
                if let Ok(resources) = capture_handle.join() {
                    guard.adopt(resources);
                }
                return Err(e);
            }
        };
        log::info!("Device running");

        let mut result = match capture_handle.join() {
            Ok(resources) => {
                guard.adopt(resources);
                Ok(())
            }
            Err(_) => {
                log::error!("Capture thread panicked, shutting down");
                Err(SupervisorError::TaskPanicked("capture"))
            }
        };
        self.shutdown.trigger();

        if watcher_handle.join().is_err() {
            log::error!("Control watcher thread panicked");
            result = result.and(Err(SupervisorError::TaskPanicked("control-watcher")));
        }

        guard.finish();
        result
    }

    fn spawn<T, F>(&self, name: &'static str, body: F) -> Result<JoinHandle<T>, SupervisorError>
    where
        T: Send + 'static,
        F: FnOnce(&Shutdown) -> T + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _stop = StopOnPanic(shutdown.clone());
                body(&shutdown)
            })
            .map_err(SupervisorError::Spawn)
    }
}

/// Brings the whole device down if its thread unwinds, so a dead watcher
/// never leaves capture running unsupervised.
struct StopOnPanic(Shutdown);

impl Drop for StopOnPanic {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.trigger();
        }
    }
}

/// Runs the release sequence exactly once, on the normal path or on unwind.
struct ReleaseGuard {
    status: StatusReporter,
    state: Arc<DeviceState>,
    resources: Option<CaptureResources>,
    done: bool,
}

impl ReleaseGuard {
    fn new(status: StatusReporter, state: Arc<DeviceState>) -> Self {
        Self {
            status,
            state,
            resources: None,
            done: false,
        }
    }

    fn adopt(&mut self, resources: CaptureResources) {
        self.resources = Some(resources);
    }

    fn finish(&mut self) {
        if self.done {
            return;
        }
        self.done = true;

        match self.resources.as_mut() {
            Some(resources) => resources.camera.close(),
            None => log::warn!("Capture resources lost; camera released on unwind"),
        }
        self.state.set_camera_open(false);
        self.status.publish(false, STATUS_ERROR_STOPPED);

        if let Some(resources) = self.resources.as_mut() {
            resources.preview.release();
            resources.logger.summary();
        }
        log::info!("Device stopped");
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.finish();
    }
}
