use crate::shared::frame::Frame;

use super::detected_face::DetectedFace;

/// Detector tuning passed with every detection call.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorOptions {
    /// Faces scoring below this are discarded.
    pub min_confidence: f64,
    /// Square network input resolution; `0` lets the model decide.
    pub input_size: u32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            input_size: 416,
        }
    }
}

/// External face analysis capability: boxes, landmarks, and expressions.
///
/// All sub-models must be loaded before `detect` is called. Implementations
/// may keep per-stream state, hence `&mut self`.
pub trait DetectionProvider: Send {
    /// Loads every sub-model. Calling it again after success is a no-op.
    fn load_models(&mut self) -> Result<(), Box<dyn std::error::Error>>;

    fn is_loaded(&self) -> bool;

    /// Analyses one frame. Geometry is in the frame's native pixel space.
    fn detect(
        &mut self,
        frame: &Frame,
        options: &DetectorOptions,
    ) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>>;
}
