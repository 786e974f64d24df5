pub const DEFAULT_CONTROL_POLL_MS: u64 = 2000;
pub const DEFAULT_IDLE_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_FRAME_DELAY_MS: u64 = 500;
pub const DEFAULT_UPLOAD_SPACING_MS: u64 = 2000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Open interval of accepted width/height ratios for a detected face.
pub const DEFAULT_MIN_ASPECT_RATIO: f64 = 0.75;
pub const DEFAULT_MAX_ASPECT_RATIO: f64 = 1.3;

/// Smallest face edge, in pixels, worth uploading.
pub const DEFAULT_MIN_FACE_SIZE: i32 = 80;

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

pub const DEFAULT_CONFIDENCE: f64 = 0.5;

pub const DEFAULT_CONTROL_PATH: &str = "control/start_recognition";
pub const DEFAULT_STATUS_PATH: &str = "status";
pub const DEFAULT_FACES_PATH: &str = "faces";

pub const STATUS_ERROR_NONE: &str = "";
pub const STATUS_ERROR_OPEN_FAILED: &str = "camera open failed";
pub const STATUS_ERROR_READ_FAILED: &str = "camera read failed";
pub const STATUS_ERROR_STOPPED: &str = "stopped";

/// `strftime` layout shared by status and face records.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

pub const BLAZEFACE_MODEL_NAME: &str = "blazeface.onnx";
