use thiserror::Error;

use crate::remote::domain::records::{FaceRecord, StatusRecord};

/// Failure talking to the control plane. Every variant is transient: callers
/// log it and retry on their next tick.
#[derive(Error, Debug)]
pub enum ControlPlaneError {
    #[error("request to {path} failed: {source}")]
    Request {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} returned HTTP {status}")]
    Http { path: String, status: u16 },
    #[error("unexpected response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("control plane unavailable: {0}")]
    Unavailable(String),
}

/// Remote store that commands the device and receives its output.
///
/// Shared between the watcher and capture threads, so implementations must
/// be `Sync`. Each publish sends one complete record; no partial writes.
pub trait RemoteControlPlane: Send + Sync {
    /// Desired-running flag set by the remote dashboard.
    fn running_flag(&self) -> Result<bool, ControlPlaneError>;

    /// Overwrites the device status record.
    fn publish_status(&self, status: &StatusRecord) -> Result<(), ControlPlaneError>;

    /// Appends one captured face.
    fn publish_face(&self, face: &FaceRecord) -> Result<(), ControlPlaneError>;
}
