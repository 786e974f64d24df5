use std::io::BufRead;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;

use facewatch_core::camera::domain::camera_handle::CameraHandle;
use facewatch_core::camera::infrastructure::image_sequence_camera::ImageSequenceCamera;
use facewatch_core::config::{AppConfig, StatusPolicy};
use facewatch_core::detection::domain::face_detector::FaceDetector;
use facewatch_core::device::capture_logger::LogCaptureLogger;
use facewatch_core::device::shutdown::Shutdown;
use facewatch_core::device::supervisor::{DeviceComponents, Supervisor};
use facewatch_core::preview::domain::preview_sink::{NullPreview, PreviewSink};
use facewatch_core::preview::infrastructure::snapshot_preview::{load_font, SnapshotPreview};
use facewatch_core::remote::domain::records::BrandingInfo;
use facewatch_core::remote::infrastructure::firebase_control_plane::FirebaseControlPlane;

/// Remote-controlled face capture: polls a start flag, uploads detected
/// faces and reports device status.
#[derive(Parser)]
#[command(name = "facewatch")]
struct Cli {
    /// JSON config file (defaults to the platform config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Realtime Database URL, e.g. https://my-app.firebaseio.com.
    #[arg(long)]
    database_url: Option<String>,

    /// Database secret or ID token sent as `?auth=`.
    #[arg(long)]
    auth_token: Option<String>,

    /// Capture device (e.g. /dev/video0).
    #[arg(long)]
    camera: Option<String>,

    /// libavdevice input format (v4l2, avfoundation, dshow).
    #[arg(long)]
    camera_format: Option<String>,

    /// Replay images from this directory instead of a capture device.
    #[arg(long)]
    image_dir: Option<PathBuf>,

    /// BlazeFace ONNX model path.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Write the annotated latest frame to this image file.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Remote flag poll interval in milliseconds.
    #[arg(long)]
    control_poll_ms: Option<u64>,

    /// Minimum spacing between face uploads in milliseconds.
    #[arg(long)]
    upload_spacing_ms: Option<u64>,

    /// Publish activity status only when it changes.
    #[arg(long)]
    status_on_change: bool,

    /// Stop when `q` is entered on stdin.
    #[arg(long)]
    interactive: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let shutdown = Shutdown::new();
    let on_signal = shutdown.clone();
    ctrlc::set_handler(move || on_signal.trigger())?;
    if cli.interactive {
        spawn_quit_listener(shutdown.clone());
    }

    let components = DeviceComponents {
        camera: build_camera(&config)?,
        detector: build_detector(&config)?,
        plane: Arc::new(FirebaseControlPlane::new(&config.remote)?),
        preview: build_preview(&config),
        logger: Box::new(LogCaptureLogger::default()),
        branding: BrandingInfo::from_config(&config.branding),
        config: config.device.clone(),
    };

    log::info!("Watching {}", config.remote.database_url);
    Supervisor::new(shutdown).run(components)?;
    Ok(())
}

/// File values first, then command-line overrides.
fn load_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;

    if let Some(url) = &cli.database_url {
        config.remote.database_url = url.clone();
    }
    if let Some(token) = &cli.auth_token {
        config.remote.auth_token = Some(token.clone());
    }
    if let Some(device) = &cli.camera {
        config.camera.device = device.clone();
    }
    if let Some(format) = &cli.camera_format {
        config.camera.format = Some(format.clone());
    }
    if let Some(dir) = &cli.image_dir {
        config.camera.image_dir = Some(dir.clone());
    }
    if let Some(model) = &cli.model {
        config.detector.model_path = Some(model.clone());
    }
    if let Some(confidence) = cli.confidence {
        config.detector.confidence = confidence;
    }
    if let Some(path) = &cli.preview {
        config.preview.path = Some(path.clone());
    }
    if let Some(ms) = cli.control_poll_ms {
        config.device.control_poll_ms = ms;
    }
    if let Some(ms) = cli.upload_spacing_ms {
        config.device.upload_spacing_ms = ms;
    }
    if cli.status_on_change {
        config.device.status_policy = StatusPolicy::OnChange;
    }

    config.validate()?;
    Ok(config)
}

fn build_camera(config: &AppConfig) -> Result<Box<dyn CameraHandle>, Box<dyn std::error::Error>> {
    if let Some(dir) = &config.camera.image_dir {
        log::info!("Replaying images from {}", dir.display());
        return Ok(Box::new(ImageSequenceCamera::new(dir)));
    }
    build_device_camera(config)
}

#[cfg(feature = "ffmpeg")]
fn build_device_camera(
    config: &AppConfig,
) -> Result<Box<dyn CameraHandle>, Box<dyn std::error::Error>> {
    use facewatch_core::camera::infrastructure::ffmpeg_camera::FfmpegCamera;

    Ok(Box::new(FfmpegCamera::new(
        config.camera.device.clone(),
        config.camera.format.clone(),
    )))
}

#[cfg(not(feature = "ffmpeg"))]
fn build_device_camera(
    _config: &AppConfig,
) -> Result<Box<dyn CameraHandle>, Box<dyn std::error::Error>> {
    Err("built without the ffmpeg feature; enable it or pass --image-dir".into())
}

#[cfg(feature = "onnx")]
fn build_detector(config: &AppConfig) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    use facewatch_core::detection::infrastructure::model_resolver;
    use facewatch_core::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceDetector;
    use facewatch_core::shared::constants::BLAZEFACE_MODEL_NAME;

    let model_path = model_resolver::resolve(
        BLAZEFACE_MODEL_NAME,
        config.detector.model_path.as_deref(),
        config.detector.model_url.as_deref(),
    )?;
    Ok(Box::new(OnnxBlazefaceDetector::new(
        &model_path,
        config.detector.confidence,
    )?))
}

#[cfg(not(feature = "onnx"))]
fn build_detector(_config: &AppConfig) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    Err("built without the onnx feature; face detection is unavailable".into())
}

fn build_preview(config: &AppConfig) -> Box<dyn PreviewSink> {
    let Some(path) = &config.preview.path else {
        return Box::new(NullPreview);
    };
    log::info!("Preview snapshots: {}", path.display());
    let preview = SnapshotPreview::new(path);

    let text = &config.branding.text;
    match (&config.preview.font_path, text.is_empty()) {
        (_, true) => Box::new(preview),
        (None, false) => {
            log::warn!("preview.font_path is not set; watermark disabled");
            Box::new(preview)
        }
        (Some(font_path), false) => match load_font(font_path) {
            Ok(font) => Box::new(preview.with_watermark(text.clone(), font)),
            Err(e) => {
                log::warn!("Watermark disabled: {e}");
                Box::new(preview)
            }
        },
    }
}

/// Operator cancel for attended runs. The reader thread is detached; it
/// blocks on stdin until the process exits.
fn spawn_quit_listener(shutdown: Shutdown) {
    std::thread::spawn(move || {
        log::info!("Type q and Enter to stop");
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(input) if input.trim().eq_ignore_ascii_case("q") => {
                    shutdown.trigger();
                    return;
                }
                Ok(_) => {}
                Err(_) => return,
            }
        }
    });
}
