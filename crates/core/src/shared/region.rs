/// An axis-aligned face bounding box in pixel space.
///
/// Coordinates are fractional so results can be rescaled between the
/// capture resolution and the drawing surface without accumulating
/// rounding error.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Detector confidence in `[0, 1]`.
    pub score: f64,
}

impl Region {
    pub fn new(x: f64, y: f64, width: f64, height: f64, score: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            score,
        }
    }

    /// Builds a region from corner coordinates `(x1, y1, x2, y2)`.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64, score: f64) -> Self {
        Self::new(x1, y1, (x2 - x1).max(0.0), (y2 - y1).max(0.0), score)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Multiplies all geometry by independent horizontal/vertical factors.
    pub fn scaled(&self, sx: f64, sy: f64) -> Region {
        Region {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
            score: self.score,
        }
    }

    /// Reflects the box about the vertical axis of a surface `surface_width` wide.
    pub fn mirrored(&self, surface_width: f64) -> Region {
        Region {
            x: surface_width - self.right(),
            ..*self
        }
    }

    /// Clips the box to `[0, width) x [0, height)`.
    ///
    /// Returns `None` when nothing of the box remains visible.
    pub fn clamped(&self, width: f64, height: f64) -> Option<Region> {
        let x1 = self.x.max(0.0);
        let y1 = self.y.max(0.0);
        let x2 = self.right().min(width);
        let y2 = self.bottom().min(height);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Region::from_corners(x1, y1, x2, y2, self.score))
    }
}
