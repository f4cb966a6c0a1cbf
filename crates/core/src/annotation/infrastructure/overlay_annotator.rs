use image::Rgb;
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::annotation::domain::drawing_surface::DrawingSurface;
use crate::annotation::domain::face_annotator::FaceAnnotator;
use crate::detection::domain::detected_face::DetectedFace;
use crate::shared::expression::Expression;

use super::glyphs::{self, draw_text_mut, text_height, text_width};

const BOX_COLOR: Rgb<u8> = Rgb([0, 180, 255]);
const LANDMARK_COLOR: Rgb<u8> = Rgb([255, 64, 64]);
const LABEL_BG: Rgb<u8> = Rgb([0, 0, 0]);
const LABEL_FG: Rgb<u8> = Rgb([255, 255, 255]);
const BAR_COLOR: Rgb<u8> = Rgb([0, 220, 120]);
const BAR_TRACK: Rgb<u8> = Rgb([40, 40, 40]);

const LABEL_PAD: u32 = 2;
const BAR_MAX_WIDTH: u32 = 60;

/// Draws boxes, landmark dots, a dominant-expression label above each box,
/// and a per-label probability chart below it.
#[derive(Clone, Debug)]
pub struct OverlayAnnotator {
    line_width: u32,
    landmark_radius: i32,
    text_scale: u32,
    show_chart: bool,
}

impl OverlayAnnotator {
    pub fn new() -> Self {
        Self {
            line_width: 2,
            landmark_radius: 2,
            text_scale: 1,
            show_chart: true,
        }
    }

    pub fn with_text_scale(mut self, scale: u32) -> Self {
        self.text_scale = scale.max(1);
        self
    }

    pub fn with_chart(mut self, show: bool) -> Self {
        self.show_chart = show;
        self
    }

    fn draw_label(&self, surface: &mut DrawingSurface, x: i32, y: i32, text: &str) {
        let w = text_width(text, self.text_scale) + 2 * LABEL_PAD;
        let h = text_height(self.text_scale) + 2 * LABEL_PAD;
        let image = surface.image_mut();
        draw_filled_rect_mut(image, Rect::at(x, y).of_size(w, h), LABEL_BG);
        draw_text_mut(
            image,
            x + LABEL_PAD as i32,
            y + LABEL_PAD as i32,
            text,
            LABEL_FG,
            self.text_scale,
        );
    }

    fn draw_chart(&self, surface: &mut DrawingSurface, face: &DetectedFace) {
        let scale = self.text_scale;
        let row_h = (text_height(scale) + LABEL_PAD) as i32;
        let label_w = longest_label_width(scale) as i32;
        let x = face.region.x.round() as i32;
        let mut y = face.region.bottom().round() as i32 + LABEL_PAD as i32;

        let image = surface.image_mut();
        for (expression, score) in face.expressions.iter() {
            draw_text_mut(image, x, y, expression.label(), LABEL_FG, scale);
            let bar_x = x + label_w + (glyphs::ADVANCE * scale) as i32;
            let bar_h = text_height(scale);
            draw_filled_rect_mut(
                image,
                Rect::at(bar_x, y).of_size(BAR_MAX_WIDTH * scale, bar_h),
                BAR_TRACK,
            );
            let filled = (score * (BAR_MAX_WIDTH * scale) as f64).round() as u32;
            if filled > 0 {
                draw_filled_rect_mut(image, Rect::at(bar_x, y).of_size(filled, bar_h), BAR_COLOR);
            }
            y += row_h;
        }
    }
}

impl Default for OverlayAnnotator {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceAnnotator for OverlayAnnotator {
    fn draw_regions(&self, surface: &mut DrawingSurface, faces: &[DetectedFace]) {
        let image = surface.image_mut();
        for face in faces {
            let r = &face.region;
            for inset in 0..self.line_width {
                let w = (r.width.round() as i64 - 2 * inset as i64).max(0) as u32;
                let h = (r.height.round() as i64 - 2 * inset as i64).max(0) as u32;
                if w == 0 || h == 0 {
                    break;
                }
                let x = r.x.round() as i32 + inset as i32;
                let y = r.y.round() as i32 + inset as i32;
                draw_hollow_rect_mut(image, Rect::at(x, y).of_size(w, h), BOX_COLOR);
            }
        }
    }

    fn draw_landmarks(&self, surface: &mut DrawingSurface, faces: &[DetectedFace]) {
        let image = surface.image_mut();
        for point in faces.iter().flat_map(|f| f.landmarks.iter()) {
            draw_filled_circle_mut(
                image,
                (point.x.round() as i32, point.y.round() as i32),
                self.landmark_radius,
                LANDMARK_COLOR,
            );
        }
    }

    fn draw_expressions(&self, surface: &mut DrawingSurface, faces: &[DetectedFace]) {
        for face in faces {
            let text = dominant_label(face);
            let label_h = (text_height(self.text_scale) + 2 * LABEL_PAD) as i32;
            let x = face.region.x.round() as i32;
            let above = face.region.y.round() as i32 - label_h;
            // Flip inside the box when there is no room above it.
            let y = if above >= 0 { above } else { face.region.y.round() as i32 };
            self.draw_label(surface, x, y, &text);
            if self.show_chart {
                self.draw_chart(surface, face);
            }
        }
    }
}

/// `"happy 87%"`
fn dominant_label(face: &DetectedFace) -> String {
    let dominant = face.dominant_expression();
    let pct = (face.expressions.get(dominant) * 100.0).round() as u32;
    format!("{dominant} {pct}%")
}

fn longest_label_width(scale: u32) -> u32 {
    Expression::ALL
        .iter()
        .map(|e| text_width(e.label(), scale))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detected_face::Point;
    use crate::shared::expression::ExpressionScores;
    use crate::shared::region::Region;

    fn face(x: f64, y: f64) -> DetectedFace {
        DetectedFace {
            region: Region::new(x, y, 40.0, 40.0, 0.9),
            landmarks: vec![Point::new(x + 20.0, y + 20.0)],
            expressions: ExpressionScores::new([0.1, 0.87, 0.0, 0.0, 0.0, 0.0, 0.03]),
        }
    }

    #[test]
    fn test_dominant_label_text() {
        assert_eq!(dominant_label(&face(0.0, 0.0)), "happy 87%");
    }

    #[test]
    fn test_draw_regions_outlines_box() {
        let mut surface = DrawingSurface::new(100, 100);
        OverlayAnnotator::new().draw_regions(&mut surface, &[face(10.0, 20.0)]);
        assert_eq!(*surface.image().get_pixel(10, 20), BOX_COLOR);
        assert_eq!(*surface.image().get_pixel(11, 21), BOX_COLOR);
        // interior untouched
        assert_eq!(*surface.image().get_pixel(30, 40), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_draw_landmarks_marks_points() {
        let mut surface = DrawingSurface::new(100, 100);
        OverlayAnnotator::new().draw_landmarks(&mut surface, &[face(10.0, 20.0)]);
        assert_eq!(*surface.image().get_pixel(30, 40), LANDMARK_COLOR);
    }

    #[test]
    fn test_label_drawn_above_box() {
        let mut surface = DrawingSurface::new(200, 200);
        OverlayAnnotator::new()
            .with_chart(false)
            .draw_expressions(&mut surface, &[face(10.0, 50.0)]);
        let label_h = text_height(1) + 2 * LABEL_PAD;
        let y = 50 - label_h;
        let row_has_ink = (10..60).any(|x| *surface.image().get_pixel(x, y + LABEL_PAD + 3) == LABEL_FG);
        assert!(row_has_ink);
    }

    #[test]
    fn test_annotate_faces_near_edges_does_not_panic() {
        let mut surface = DrawingSurface::new(50, 50);
        let faces = vec![face(-20.0, -20.0), face(45.0, 45.0)];
        OverlayAnnotator::new().with_text_scale(2).annotate(&mut surface, &faces);
    }

    #[test]
    fn test_annotate_with_no_faces_leaves_surface() {
        let mut surface = DrawingSurface::new(10, 10);
        OverlayAnnotator::default().annotate(&mut surface, &[]);
        assert!(surface.image().pixels().all(|p| *p == Rgb([0, 0, 0])));
    }
}
