//! Fakes for the device capabilities. Camera and control plane can share one
//! event log so cross-component ordering is observable.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::camera::domain::camera_handle::{CameraError, CameraHandle};
use crate::config::DeviceConfig;
use crate::detection::domain::face_detector::FaceDetector;
use crate::remote::domain::control_plane::{ControlPlaneError, RemoteControlPlane};
use crate::remote::domain::records::{FaceRecord, StatusRecord};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open,
    OpenFailed,
    Close,
    Read,
    Status { active: bool, error: String },
    Face,
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

pub fn new_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn count(log: &EventLog, event: &Event) -> usize {
    log.lock().unwrap().iter().filter(|e| *e == event).count()
}

pub fn status(active: bool, error: &str) -> Event {
    Event::Status {
        active,
        error: error.to_string(),
    }
}

/// Millisecond intervals so loops spin quickly under test.
pub fn fast_config() -> DeviceConfig {
    DeviceConfig {
        control_poll_ms: 10,
        idle_interval_ms: 5,
        frame_delay_ms: 5,
        upload_spacing_ms: 0,
        ..DeviceConfig::default()
    }
}

pub struct FakeCamera {
    events: EventLog,
    open: bool,
    fail_open: bool,
    fail_reads: bool,
    sequence: u64,
}

impl FakeCamera {
    pub const WIDTH: u32 = 640;
    pub const HEIGHT: u32 = 480;

    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            open: false,
            fail_open: false,
            fail_reads: false,
            sequence: 0,
        }
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl CameraHandle for FakeCamera {
    fn open(&mut self) -> Result<(), CameraError> {
        if self.open {
            return Ok(());
        }
        if self.fail_open {
            self.push(Event::OpenFailed);
            return Err(CameraError::Open("no device".into()));
        }
        self.push(Event::Open);
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            self.push(Event::Close);
            self.open = false;
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        if !self.open {
            return Err(CameraError::NotOpen);
        }
        if self.fail_reads {
            return Err(CameraError::Read("device unplugged".into()));
        }
        self.push(Event::Read);
        self.sequence += 1;
        let size = (Self::WIDTH * Self::HEIGHT * 3) as usize;
        Ok(Frame::new(
            vec![90u8; size],
            Self::WIDTH,
            Self::HEIGHT,
            3,
            self.sequence,
        ))
    }
}

/// Control plane whose flag reads follow a script. `None` entries fail with
/// a transient error; once the script runs out every read returns
/// `fallback`.
pub struct ScriptedControlPlane {
    flags: Mutex<VecDeque<Option<bool>>>,
    fallback: bool,
    fail_publishes: bool,
    events: EventLog,
    statuses: Mutex<Vec<StatusRecord>>,
    faces: Mutex<Vec<(Instant, FaceRecord)>>,
}

impl ScriptedControlPlane {
    pub fn new(flags: Vec<Option<bool>>) -> Self {
        Self {
            flags: Mutex::new(flags.into()),
            fallback: false,
            fail_publishes: false,
            events: new_log(),
            statuses: Mutex::new(Vec::new()),
            faces: Mutex::new(Vec::new()),
        }
    }

    pub fn with_log(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    pub fn with_fallback(mut self, flag: bool) -> Self {
        self.fallback = flag;
        self
    }

    pub fn failing_publishes(mut self) -> Self {
        self.fail_publishes = true;
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<StatusRecord> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn face_times(&self) -> Vec<Instant> {
        self.faces.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    pub fn faces(&self) -> Vec<FaceRecord> {
        self.faces
            .lock()
            .unwrap()
            .iter()
            .map(|(_, f)| f.clone())
            .collect()
    }

    fn publish_result(&self) -> Result<(), ControlPlaneError> {
        if self.fail_publishes {
            return Err(ControlPlaneError::Unavailable("scripted failure".into()));
        }
        Ok(())
    }
}

impl RemoteControlPlane for ScriptedControlPlane {
    fn running_flag(&self) -> Result<bool, ControlPlaneError> {
        match self.flags.lock().unwrap().pop_front() {
            Some(Some(flag)) => Ok(flag),
            Some(None) => Err(ControlPlaneError::Unavailable("scripted outage".into())),
            None => Ok(self.fallback),
        }
    }

    fn publish_status(&self, status: &StatusRecord) -> Result<(), ControlPlaneError> {
        self.events.lock().unwrap().push(Event::Status {
            active: status.active,
            error: status.error.clone(),
        });
        self.statuses.lock().unwrap().push(status.clone());
        self.publish_result()
    }

    fn publish_face(&self, face: &FaceRecord) -> Result<(), ControlPlaneError> {
        self.events.lock().unwrap().push(Event::Face);
        self.faces
            .lock()
            .unwrap()
            .push((Instant::now(), face.clone()));
        self.publish_result()
    }
}

/// Returns the same boxes for every frame, or fails when `fail` is set.
pub struct ScriptedDetector {
    boxes: Vec<BoundingBox>,
    fail: bool,
}

impl ScriptedDetector {
    pub fn returning(boxes: Vec<BoundingBox>) -> Self {
        Self { boxes, fail: false }
    }

    pub fn empty() -> Self {
        Self::returning(Vec::new())
    }

    pub fn failing() -> Self {
        Self {
            boxes: Vec::new(),
            fail: true,
        }
    }
}

impl FaceDetector for ScriptedDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>> {
        if self.fail {
            return Err("model exploded".into());
        }
        Ok(self.boxes.clone())
    }
}
