use crate::detection::domain::detected_face::DetectedFace;

use super::drawing_surface::DrawingSurface;

/// Draws detection results on top of the frame already on the surface.
///
/// Geometry is expected in surface coordinates (already rescaled).
pub trait FaceAnnotator: Send + Sync {
    fn draw_regions(&self, surface: &mut DrawingSurface, faces: &[DetectedFace]);

    fn draw_landmarks(&self, surface: &mut DrawingSurface, faces: &[DetectedFace]);

    fn draw_expressions(&self, surface: &mut DrawingSurface, faces: &[DetectedFace]);

    /// Boxes first, then landmarks, then labels on top.
    fn annotate(&self, surface: &mut DrawingSurface, faces: &[DetectedFace]) {
        self.draw_regions(surface, faces);
        self.draw_landmarks(surface, faces);
        self.draw_expressions(surface, faces);
    }
}
