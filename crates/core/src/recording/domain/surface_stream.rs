use std::sync::PoisonError;
use std::time::Duration;

use crate::annotation::domain::drawing_surface::SharedSurface;
use crate::shared::frame::Frame;

/// Live pixel stream captured from the drawing surface at a fixed rate.
///
/// Frames are copies of whatever is on the surface when sampled, so the
/// recording includes every annotation drawn so far.
#[derive(Clone)]
pub struct SurfaceStream {
    surface: SharedSurface,
    fps: u32,
}

impl SurfaceStream {
    pub fn new(surface: SharedSurface, fps: u32) -> Self {
        Self {
            surface,
            fps: fps.max(1),
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps as f64)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.surface
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .dimensions()
    }

    /// Samples the surface. `None` while it has no pixels.
    pub fn sample(&self, index: usize) -> Option<Frame> {
        let surface = self.surface.lock().unwrap_or_else(PoisonError::into_inner);
        if surface.is_empty() {
            return None;
        }
        Some(surface.snapshot(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::domain::drawing_surface::DrawingSurface;
    use approx::assert_relative_eq;

    #[test]
    fn test_sample_copies_surface() {
        let surface = DrawingSurface::shared(4, 2);
        let stream = SurfaceStream::new(surface.clone(), 25);
        let frame = stream.sample(3).unwrap();
        assert_eq!(frame.dimensions(), (4, 2));
        assert_eq!(frame.index(), 3);
        assert_eq!(stream.dimensions(), (4, 2));
    }

    #[test]
    fn test_empty_surface_yields_nothing() {
        let stream = SurfaceStream::new(DrawingSurface::shared(0, 0), 30);
        assert!(stream.sample(0).is_none());
    }

    #[test]
    fn test_frame_interval() {
        let stream = SurfaceStream::new(DrawingSurface::shared(1, 1), 0);
        assert_eq!(stream.fps(), 1);
        let stream = SurfaceStream::new(DrawingSurface::shared(1, 1), 50);
        assert_relative_eq!(stream.frame_interval().as_secs_f64(), 0.02, epsilon = 1e-9);
    }
}
