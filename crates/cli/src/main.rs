use std::path::PathBuf;
use std::process;
use std::sync::{Arc, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;

use facetrack_core::annotation::infrastructure::overlay_annotator::OverlayAnnotator;
use facetrack_core::capture::infrastructure::ffmpeg_camera::{
    CaptureMode, FfmpegCamera, DEFAULT_DEVICE,
};
use facetrack_core::config::TrackerConfig;
use facetrack_core::detection::infrastructure::onnx_detection_provider::OnnxDetectionProvider;
use facetrack_core::recording::infrastructure::download_dir_sink::DownloadDirSink;
use facetrack_core::recording::infrastructure::ffmpeg_recorder::FfmpegRecorderBackend;
use facetrack_core::session::tracker_session::{SessionPorts, TrackerSession};

/// How often the shell pumps the session.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Upper bound on waiting for the recorder to flush after stop.
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Live face expression tracking with an annotated recording.
#[derive(Parser)]
#[command(name = "facetrack")]
struct Cli {
    /// Camera device (v4l2 path, avfoundation index, or dshow name).
    #[arg(long, default_value = DEFAULT_DEVICE)]
    device: String,

    /// Requested capture width.
    #[arg(long, default_value = "640")]
    width: u32,

    /// Requested capture height.
    #[arg(long, default_value = "480")]
    height: u32,

    /// Requested capture frame rate.
    #[arg(long, default_value = "30")]
    fps: u32,

    /// Seconds to track (and record) before stopping.
    #[arg(long, default_value = "10")]
    duration: f64,

    /// Directory the recording is saved into (default: downloads folder).
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Settings file to use instead of the per-user one.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory with bundled ONNX models, checked before the cache.
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Annotate only; do not record.
    #[arg(long)]
    no_record: bool,

    /// Draw the unmirrored camera view.
    #[arg(long)]
    no_mirror: bool,

    /// Do not tally dominant expressions.
    #[arg(long)]
    no_tally: bool,

    /// Save the last annotated frame as an image.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Print the final tally as JSON.
    #[arg(long)]
    json: bool,

    /// Write the effective settings back to the settings file.
    #[arg(long)]
    save_config: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = build_config(&cli)?;
    if cli.save_config {
        config.save();
    }

    let camera = FfmpegCamera::new(
        cli.device.clone(),
        CaptureMode {
            width: cli.width,
            height: cli.height,
            fps: cli.fps,
        },
    );
    let sink = match &cli.output_dir {
        Some(dir) => DownloadDirSink::new(dir.clone()),
        None => DownloadDirSink::default(),
    };
    log::info!("Recordings go to {}", sink.dir().display());

    let mut session = TrackerSession::new(
        config,
        SessionPorts {
            camera: Box::new(camera),
            provider: Box::new(OnnxDetectionProvider::new(cli.models_dir.clone())),
            annotator: Arc::new(OverlayAnnotator::new()),
            recorder: Box::new(FfmpegRecorderBackend::new()),
            sink: Box::new(sink),
        },
    );

    session.request_camera_access()?;
    eprintln!("Loading face models...");
    session.load_models()?;
    session.start_annotation()?;

    if !cli.no_record {
        wait_for_first_frame(&mut session, Duration::from_secs(5))?;
        let codec = session.start_recording()?;
        log::info!("Recording as {}", codec.mime_type);
    }

    track_for(&mut session, Duration::from_secs_f64(cli.duration));
    eprintln!();

    if session.status().recording {
        session.stop_recording()?;
        if !session.wait_for_recording(STOP_TIMEOUT) {
            log::warn!("Recorder did not finish within {STOP_TIMEOUT:?}");
        }
        match session.download_artifact()? {
            Some(path) => eprintln!("Saved recording to {}", path.display()),
            None => {
                let reason = session
                    .status()
                    .last_error
                    .unwrap_or_else(|| "no recording available".to_string());
                eprintln!("No recording saved: {reason}");
            }
        }
    }

    if let Some(path) = &cli.snapshot {
        let surface = session.surface();
        let surface = surface.lock().unwrap_or_else(PoisonError::into_inner);
        surface.image().save(path)?;
        eprintln!("Saved snapshot to {}", path.display());
    }

    let status = session.status();
    session.shutdown();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&status.tally)?);
    } else {
        println!("{}", status.tally);
    }
    Ok(())
}

/// Pumps the session until `duration` passes, showing the live tally.
fn track_for(session: &mut TrackerSession, duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        session.poll();
        let status = session.status();
        eprint!("\r{status}");
        if !status.camera.is_ready() {
            log::warn!("Camera stopped; ending early");
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn wait_for_first_frame(
    session: &mut TrackerSession,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let surface = session.surface();
    let deadline = Instant::now() + timeout;
    loop {
        session.poll();
        let empty = surface
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty();
        if !empty {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err("Camera produced no frames".into());
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn build_config(cli: &Cli) -> Result<TrackerConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => TrackerConfig::load_from(path)?,
        None => TrackerConfig::load(),
    };
    if let Some(confidence) = cli.confidence {
        config.min_confidence = confidence;
    }
    if cli.no_mirror {
        config.mirror = false;
    }
    if cli.no_tally {
        config.track_counts = false;
    }
    config.recording_fps = cli.fps;
    Ok(config)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !(cli.duration > 0.0 && cli.duration.is_finite()) {
        return Err(format!("Duration must be a positive number of seconds, got {}", cli.duration).into());
    }
    if let Some(c) = cli.confidence {
        if !(0.0..=1.0).contains(&c) {
            return Err(format!("Confidence must be between 0.0 and 1.0, got {c}").into());
        }
    }
    if cli.width == 0 || cli.height == 0 {
        return Err("Capture width and height must be positive".into());
    }
    if cli.fps == 0 {
        return Err("Frame rate must be positive".into());
    }
    if let Some(dir) = &cli.output_dir {
        if !dir.is_dir() {
            return Err(format!("Output directory not found: {}", dir.display()).into());
        }
    }
    Ok(())
}
