use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_CONFIDENCE, DEFAULT_CONTROL_PATH, DEFAULT_CONTROL_POLL_MS, DEFAULT_FACES_PATH, DEFAULT_FRAME_DELAY_MS,
    DEFAULT_IDLE_INTERVAL_MS, DEFAULT_JPEG_QUALITY, DEFAULT_MAX_ASPECT_RATIO,
    DEFAULT_MIN_ASPECT_RATIO, DEFAULT_MIN_FACE_SIZE, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_STATUS_PATH, DEFAULT_UPLOAD_SPACING_MS,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// When the capture loop republishes its activity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPolicy {
    /// Publish after every processed frame.
    Every,
    /// Publish only when `active` differs from the last activity published.
    OnChange,
}

/// Timing and filtering knobs of the control/capture loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub control_poll_ms: u64,
    pub idle_interval_ms: u64,
    pub frame_delay_ms: u64,
    pub upload_spacing_ms: u64,
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
    pub min_face_size: i32,
    pub jpeg_quality: u8,
    pub status_policy: StatusPolicy,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            control_poll_ms: DEFAULT_CONTROL_POLL_MS,
            idle_interval_ms: DEFAULT_IDLE_INTERVAL_MS,
            frame_delay_ms: DEFAULT_FRAME_DELAY_MS,
            upload_spacing_ms: DEFAULT_UPLOAD_SPACING_MS,
            min_aspect_ratio: DEFAULT_MIN_ASPECT_RATIO,
            max_aspect_ratio: DEFAULT_MAX_ASPECT_RATIO,
            min_face_size: DEFAULT_MIN_FACE_SIZE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            status_policy: StatusPolicy::Every,
        }
    }
}

impl DeviceConfig {
    pub fn control_poll(&self) -> Duration {
        Duration::from_millis(self.control_poll_ms)
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn frame_delay(&self) -> Duration {
        Duration::from_millis(self.frame_delay_ms)
    }

    pub fn upload_spacing(&self) -> Duration {
        Duration::from_millis(self.upload_spacing_ms)
    }
}

/// Location of the remote control plane (Firebase Realtime Database).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub database_url: String,
    pub auth_token: Option<String>,
    pub control_path: String,
    pub status_path: String,
    pub faces_path: String,
    pub request_timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            auth_token: None,
            control_path: DEFAULT_CONTROL_PATH.to_string(),
            status_path: DEFAULT_STATUS_PATH.to_string(),
            faces_path: DEFAULT_FACES_PATH.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl RemoteConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Capture device, e.g. `/dev/video0` or `0` on macOS.
    pub device: String,
    /// libavdevice input format (`v4l2`, `avfoundation`, `dshow`).
    pub format: Option<String>,
    /// Replay still images from this directory instead of a device.
    pub image_dir: Option<PathBuf>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            format: None,
            image_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub model_path: Option<PathBuf>,
    pub model_url: Option<String>,
    pub confidence: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            model_url: None,
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandingConfig {
    pub made_by: String,
    pub company: String,
    pub text: String,
    pub logo_path: Option<PathBuf>,
}

impl Default for BrandingConfig {
    fn default() -> Self {
        Self {
            made_by: String::new(),
            company: String::new(),
            text: String::new(),
            logo_path: Some(PathBuf::from("logo.png")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Write the annotated latest frame here. No preview when unset.
    pub path: Option<PathBuf>,
    /// Font for the branding watermark. Snapshots are unmarked when unset.
    pub font_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub remote: RemoteConfig,
    pub camera: CameraConfig,
    pub detector: DetectorConfig,
    pub branding: BrandingConfig,
    pub preview: PreviewConfig,
}

impl AppConfig {
    /// Platform config location, e.g. `~/.config/FaceWatch/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("FaceWatch").join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Explicit path if given, else the platform default if it exists,
    /// else built-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.device;
        if self.remote.database_url.trim().is_empty() {
            return Err(ConfigError::Invalid("database URL is required".into()));
        }
        if d.control_poll_ms == 0 || d.idle_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "control poll and idle intervals must be positive".into(),
            ));
        }
        if !(d.min_aspect_ratio > 0.0 && d.min_aspect_ratio < d.max_aspect_ratio) {
            return Err(ConfigError::Invalid(format!(
                "aspect ratio bounds must satisfy 0 < min < max, got ({}, {})",
                d.min_aspect_ratio, d.max_aspect_ratio
            )));
        }
        if d.min_face_size < 0 {
            return Err(ConfigError::Invalid(format!(
                "minimum face size must not be negative, got {}",
                d.min_face_size
            )));
        }
        if !(1..=100).contains(&d.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "JPEG quality must be between 1 and 100, got {}",
                d.jpeg_quality
            )));
        }
        if !(0.0..=1.0).contains(&self.detector.confidence) {
            return Err(ConfigError::Invalid(format!(
                "confidence must be between 0.0 and 1.0, got {}",
                self.detector.confidence
            )));
        }
        Ok(())
    }
}
