use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;

use crate::device::device_state::DeviceState;
use crate::device::shutdown::Shutdown;
use crate::remote::domain::control_plane::RemoteControlPlane;

/// Camera transition requested by the watcher and applied by the capture
/// thread, which owns the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraCommand {
    Open,
    Close,
}

/// Polls the remote desired-running flag and turns it into camera commands.
///
/// Sole writer of `desired_running`. While running is desired and the camera
/// is not open, `Open` is re-sent on every tick, so a failed open is retried.
/// `Close` is sent only on a true to false transition.
pub struct ControlWatcher {
    plane: Arc<dyn RemoteControlPlane>,
    state: Arc<DeviceState>,
    commands: Sender<CameraCommand>,
    poll_interval: Duration,
}

impl ControlWatcher {
    pub fn new(
        plane: Arc<dyn RemoteControlPlane>,
        state: Arc<DeviceState>,
        commands: Sender<CameraCommand>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            plane,
            state,
            commands,
            poll_interval,
        }
    }

    /// One poll. Returns the command sent, if any.
    ///
    /// A failed flag read leaves the device state untouched.
    pub fn tick(&self) -> Option<CameraCommand> {
        let running = match self.plane.running_flag() {
            Ok(flag) => flag,
            Err(e) => {
                log::warn!("Control flag unavailable, keeping last state: {e}");
                return None;
            }
        };

        let changed = self.state.set_desired_running(running);
        if changed {
            log::info!(
                "Remote control: {}",
                if running { "start requested" } else { "stop requested" }
            );
        }

        let command = match (running, changed) {
            (true, _) if !self.state.camera_open() => CameraCommand::Open,
            (false, true) => CameraCommand::Close,
            _ => return None,
        };
        if self.commands.send(command).is_err() {
            log::debug!("Capture thread gone, dropping {command:?}");
            return None;
        }
        Some(command)
    }

    /// Polls until shutdown. The first poll happens immediately.
    pub fn run(self, shutdown: &Shutdown) {
        log::debug!("Control watcher started ({:?} poll)", self.poll_interval);
        while !shutdown.is_triggered() {
            self.tick();
            if shutdown.sleep(self.poll_interval) {
                break;
            }
        }
        log::debug!("Control watcher stopped");
    }
}
