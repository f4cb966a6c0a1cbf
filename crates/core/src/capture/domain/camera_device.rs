use std::sync::Arc;

use super::capture_state::CameraError;
use super::video_source::VideoSource;

/// Platform camera access.
///
/// `open` either yields a live signal or a classified failure; it never
/// retries on its own.
pub trait CameraDevice: Send {
    fn open(&mut self) -> Result<Arc<dyn VideoSource>, CameraError>;
}
