use crate::shared::expression::{Expression, ExpressionScores};
use crate::shared::region::Region;

/// A landmark point in pixel space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One face found in one analysed frame.
///
/// Produced fresh each detection and consumed immediately by drawing and
/// tallying; nothing holds on to it across ticks.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectedFace {
    pub region: Region,
    /// Ordered landmark set as reported by the provider.
    pub landmarks: Vec<Point>,
    pub expressions: ExpressionScores,
}

impl DetectedFace {
    pub fn dominant_expression(&self) -> Expression {
        self.expressions.dominant()
    }

    /// Maps geometry from a `from` sized frame onto a `to` sized surface.
    pub fn rescaled(&self, from: (u32, u32), to: (u32, u32)) -> DetectedFace {
        if from == to || from.0 == 0 || from.1 == 0 {
            return self.clone();
        }
        let sx = to.0 as f64 / from.0 as f64;
        let sy = to.1 as f64 / from.1 as f64;
        DetectedFace {
            region: self.region.scaled(sx, sy),
            landmarks: self
                .landmarks
                .iter()
                .map(|p| Point::new(p.x * sx, p.y * sy))
                .collect(),
            expressions: self.expressions,
        }
    }

    /// Reflects geometry about the vertical axis of a surface `width` wide.
    pub fn mirrored(&self, width: u32) -> DetectedFace {
        let w = width as f64;
        DetectedFace {
            region: self.region.mirrored(w),
            landmarks: self
                .landmarks
                .iter()
                .map(|p| Point::new(w - p.x, p.y))
                .collect(),
            expressions: self.expressions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn face() -> DetectedFace {
        DetectedFace {
            region: Region::new(100.0, 50.0, 200.0, 100.0, 0.9),
            landmarks: vec![Point::new(150.0, 80.0), Point::new(250.0, 80.0)],
            expressions: ExpressionScores::new([0.1, 0.8, 0.0, 0.0, 0.0, 0.0, 0.1]),
        }
    }

    #[test]
    fn test_rescaled_maps_region_and_landmarks() {
        let scaled = face().rescaled((640, 480), (320, 240));
        assert_relative_eq!(scaled.region.x, 50.0);
        assert_relative_eq!(scaled.region.y, 25.0);
        assert_relative_eq!(scaled.region.width, 100.0);
        assert_relative_eq!(scaled.region.height, 50.0);
        assert_relative_eq!(scaled.landmarks[1].x, 125.0);
        assert_relative_eq!(scaled.landmarks[1].y, 40.0);
        assert_eq!(scaled.expressions, face().expressions);
    }

    #[test]
    fn test_rescaled_same_size_is_identity() {
        assert_eq!(face().rescaled((640, 480), (640, 480)), face());
    }

    #[test]
    fn test_rescaled_from_zero_size_is_identity() {
        assert_eq!(face().rescaled((0, 0), (640, 480)), face());
    }

    #[test]
    fn test_mirrored_flips_landmarks() {
        let m = face().mirrored(640);
        assert_relative_eq!(m.region.x, 340.0);
        assert_relative_eq!(m.landmarks[0].x, 490.0);
        assert_relative_eq!(m.landmarks[0].y, 80.0);
    }

    #[test]
    fn test_dominant_expression() {
        assert_eq!(face().dominant_expression(), Expression::Happy);
    }
}
