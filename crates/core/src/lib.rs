//! Unattended face-capture device: a remote flag switches the camera on and
//! off, detected faces are shape-filtered and uploaded, and the device
//! reports its activity back to the same remote store.

pub mod camera;
pub mod config;
pub mod detection;
pub mod device;
pub mod encoding;
pub mod preview;
pub mod remote;
pub mod shared;
