use crate::shared::frame::Frame;

/// A live video signal, the native counterpart of a playing video element.
///
/// Shared between the capture source (which owns its lifetime) and the
/// annotation loop (which reads frames), hence `&self` everywhere.
pub trait VideoSource: Send + Sync {
    /// Natural frame size; `(0, 0)` until the first frame has arrived.
    fn dimensions(&self) -> (u32, u32);

    /// Most recent frame, if any has been decoded yet.
    fn current_frame(&self) -> Option<Frame>;

    fn is_paused(&self) -> bool;

    fn set_paused(&self, paused: bool);

    /// True once the signal can produce no more frames (stopped or failed).
    fn is_ended(&self) -> bool;

    /// Stops all underlying tracks and releases the device. Idempotent.
    fn stop(&self);
}
