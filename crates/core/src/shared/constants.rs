pub const FACE_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const FACE_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EXPRESSION_MODEL_NAME: &str = "emotion-ferplus-8.onnx";
pub const EXPRESSION_MODEL_URL: &str =
    "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/emotion_ferplus/model/emotion-ferplus-8.onnx";

/// Application directory name under the platform config/cache dirs.
pub const APP_DIR_NAME: &str = "FaceTrack";

/// Codec candidates in negotiation order. Each entry expands to a MIME type
/// via [`crate::recording::domain::codec::candidate_mime`].
pub const CODEC_PRIORITY: &[&str] = &["vp9,opus", "vp8,opus", "vp9", "vp8", "webm", "mp4/avc1"];

pub const DOWNLOAD_FILENAME_PREFIX: &str = "face-tracking-video";

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;
pub const DEFAULT_DIMENSION_BACKOFF_MS: u64 = 100;
pub const DEFAULT_STABILIZATION_DELAY_MS: u64 = 200;
/// Recorder flush interval: one data segment per timeslice.
pub const DEFAULT_TIMESLICE_MS: u64 = 2000;
pub const DEFAULT_RECORDING_FPS: u32 = 30;
