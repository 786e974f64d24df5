use std::sync::{Mutex, MutexGuard};

/// Consistent copy of [`DeviceState`] taken under a single lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub desired_running: bool,
    pub camera_open: bool,
    pub last_error: Option<String>,
}

impl DeviceSnapshot {
    /// Frames may be read only while both flags hold.
    pub fn should_capture(&self) -> bool {
        self.desired_running && self.camera_open
    }
}

/// State shared by the watcher and capture threads.
///
/// `desired_running` is written only by the watcher, `camera_open` only by
/// the capture thread that owns the camera. The lock is held for field
/// access only, never across camera or network I/O.
#[derive(Debug, Default)]
pub struct DeviceState {
    inner: Mutex<DeviceSnapshot>,
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DeviceSnapshot> {
        // A panicking writer cannot leave the plain fields half-written.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        self.lock().clone()
    }

    pub fn desired_running(&self) -> bool {
        self.lock().desired_running
    }

    pub fn camera_open(&self) -> bool {
        self.lock().camera_open
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Returns `true` when the stored value changed.
    pub fn set_desired_running(&self, running: bool) -> bool {
        let mut state = self.lock();
        let changed = state.desired_running != running;
        state.desired_running = running;
        changed
    }

    pub fn set_camera_open(&self, open: bool) {
        self.lock().camera_open = open;
    }

    pub fn record_error(&self, error: impl Into<String>) {
        self.lock().last_error = Some(error.into());
    }

    pub fn clear_error(&self) {
        self.lock().last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_initial_state_is_stopped() {
        let state = DeviceState::new();
        assert_eq!(state.snapshot(), DeviceSnapshot::default());
        assert!(!state.snapshot().should_capture());
    }

    #[test]
    fn test_set_desired_running_reports_change() {
        let state = DeviceState::new();
        assert!(!state.set_desired_running(false));
        assert!(state.set_desired_running(true));
        assert!(!state.set_desired_running(true));
        assert!(state.set_desired_running(false));
    }

    #[test]
    fn test_should_capture_requires_both_flags() {
        let state = DeviceState::new();
        state.set_camera_open(true);
        assert!(!state.snapshot().should_capture());
        state.set_desired_running(true);
        assert!(state.snapshot().should_capture());
    }

    #[test]
    fn test_error_recorded_and_cleared() {
        let state = DeviceState::new();
        state.record_error("camera read failed");
        assert_eq!(state.last_error().as_deref(), Some("camera read failed"));
        state.clear_error();
        assert!(state.last_error().is_none());
    }

    #[test]
    fn test_poisoned_lock_still_readable() {
        let state = Arc::new(DeviceState::new());
        state.set_desired_running(true);
        let poisoner = Arc::clone(&state);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.inner.lock().unwrap();
            panic!("poison");
        })
        .join();

        assert!(state.desired_running());
        state.set_camera_open(true);
        assert!(state.camera_open());
    }
}
