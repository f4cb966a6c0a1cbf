use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crate::capture::domain::camera_device::CameraDevice;
use crate::capture::domain::capture_state::CameraError;
use crate::capture::domain::video_source::VideoSource;
use crate::shared::frame::Frame;

const EBUSY: i32 = 16;

#[cfg(target_os = "linux")]
const INPUT_FORMAT: &str = "v4l2";
#[cfg(target_os = "linux")]
pub const DEFAULT_DEVICE: &str = "/dev/video0";

#[cfg(target_os = "macos")]
const INPUT_FORMAT: &str = "avfoundation";
#[cfg(target_os = "macos")]
pub const DEFAULT_DEVICE: &str = "0";

#[cfg(target_os = "windows")]
const INPUT_FORMAT: &str = "dshow";
#[cfg(target_os = "windows")]
pub const DEFAULT_DEVICE: &str = "video=Integrated Camera";

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const INPUT_FORMAT: &str = "v4l2";
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub const DEFAULT_DEVICE: &str = "/dev/video0";

/// Requested capture mode. The driver may pick the nearest supported one.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureMode {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CaptureMode {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

/// Opens the platform camera through libavdevice (v4l2, avfoundation, dshow).
pub struct FfmpegCamera {
    device: String,
    mode: CaptureMode,
}

impl FfmpegCamera {
    pub fn new(device: impl Into<String>, mode: CaptureMode) -> Self {
        Self {
            device: device.into(),
            mode,
        }
    }
}

impl Default for FfmpegCamera {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE, CaptureMode::default())
    }
}

impl CameraDevice for FfmpegCamera {
    fn open(&mut self) -> Result<Arc<dyn VideoSource>, CameraError> {
        ffmpeg_next::init().map_err(|e| CameraError::Other(e.to_string()))?;
        ffmpeg_next::device::register_all();

        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name() == INPUT_FORMAT)
            .ok_or_else(|| CameraError::Other(format!("{INPUT_FORMAT} capture not available")))?;

        let mut options = ffmpeg_next::Dictionary::new();
        options.set(
            "video_size",
            &format!("{}x{}", self.mode.width, self.mode.height),
        );
        options.set("framerate", &self.mode.fps.to_string());

        let ictx = ffmpeg_next::format::open_with(
            &self.device,
            &ffmpeg_next::format::Format::Input(format),
            options,
        )
        .map_err(classify)?
        .input();

        let decode = DecodeState::new(ictx).map_err(classify)?;
        log::info!("Opened {} via {INPUT_FORMAT}", self.device);

        let signal = Arc::new(LiveSignal::default());
        let worker_signal = signal.clone();
        let handle = std::thread::spawn(move || decode.run(&worker_signal));
        *signal.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        Ok(signal)
    }
}

/// Maps an ffmpeg open failure onto the camera failure taxonomy.
fn classify(err: ffmpeg_next::Error) -> CameraError {
    match err {
        ffmpeg_next::Error::Other { errno } => {
            match std::io::Error::from_raw_os_error(errno).kind() {
                ErrorKind::PermissionDenied => CameraError::PermissionDenied,
                ErrorKind::NotFound => CameraError::NotFound,
                _ if errno == EBUSY => CameraError::Unavailable,
                _ => CameraError::Other(err.to_string()),
            }
        }
        other => CameraError::Other(other.to_string()),
    }
}

/// Live signal state shared between the decode thread and readers.
#[derive(Default)]
struct LiveSignal {
    latest: Mutex<Option<Frame>>,
    paused: AtomicBool,
    ended: AtomicBool,
    stop_requested: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl VideoSource for LiveSignal {
    fn dimensions(&self) -> (u32, u32) {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or((0, 0), Frame::dimensions)
    }

    fn current_frame(&self) -> Option<Frame> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Relaxed)
    }

    fn stop(&self) {
        self.stop_requested.store(true, Ordering::Relaxed);
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::warn!("Camera decode thread panicked");
            }
        }
        self.ended.store(true, Ordering::Relaxed);
    }
}

struct DecodeState {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
}

// Safety: DecodeState is moved into the decode thread once and never shared.
// The raw pointers inside ffmpeg types are not accessed from other threads.
unsafe impl Send for DecodeState {}

impl DecodeState {
    fn new(ictx: ffmpeg_next::format::context::Input) -> Result<Self, ffmpeg_next::Error> {
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or(ffmpeg_next::Error::StreamNotFound)?;
        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        Ok(Self {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
        })
    }

    fn run(mut self, signal: &LiveSignal) {
        let mut index = 0usize;
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();

        while !signal.stop_requested.load(Ordering::Relaxed) {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                log::info!("Camera stream ended");
                break;
            };
            if stream.index() != self.stream_index || self.decoder.send_packet(&packet).is_err() {
                continue;
            }

            while self.decoder.receive_frame(&mut decoded).is_ok() {
                if signal.paused.load(Ordering::Relaxed) {
                    continue;
                }
                if let Err(e) = self.scaler.run(&decoded, &mut rgb) {
                    log::warn!("Dropping camera frame: {e}");
                    continue;
                }
                let pixels = extract_rgb_pixels(&rgb, self.width, self.height);
                let frame = Frame::new(pixels, self.width, self.height, index);
                index += 1;
                *signal.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
            }
        }

        signal.ended.store(true, Ordering::Relaxed);
    }
}

/// Copies RGB24 rows out of an ffmpeg frame, dropping stride padding.
fn extract_rgb_pixels(frame: &ffmpeg_next::util::frame::video::Video, w: u32, h: u32) -> Vec<u8> {
    let stride = frame.stride(0);
    let data = frame.data(0);
    let row_bytes = w as usize * 3;
    let mut out = Vec::with_capacity(row_bytes * h as usize);
    for row in 0..h as usize {
        let start = row * stride;
        out.extend_from_slice(&data[start..start + row_bytes]);
    }
    out
}
