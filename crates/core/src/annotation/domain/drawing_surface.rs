use std::sync::{Arc, Mutex};

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::shared::frame::Frame;

/// Surface shared between the annotation loop (writer) and the recorder (reader).
pub type SharedSurface = Arc<Mutex<DrawingSurface>>;

const CLEAR_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// The pixel buffer video frames and annotations are composited onto.
#[derive(Clone, Debug)]
pub struct DrawingSurface {
    image: RgbImage,
}

impl DrawingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, CLEAR_COLOR),
        }
    }

    pub fn shared(width: u32, height: u32) -> SharedSurface {
        Arc::new(Mutex::new(Self::new(width, height)))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// A surface with no pixels cannot be drawn to or recorded.
    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    /// Reallocates the buffer when the size changes. Contents are discarded.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.image.dimensions() != (width, height) {
            self.image = RgbImage::from_pixel(width, height, CLEAR_COLOR);
        }
    }

    pub fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = CLEAR_COLOR;
        }
    }

    /// Draws `frame` scaled to fill the surface, flipped horizontally when
    /// `mirror` is set.
    pub fn draw_frame(&mut self, frame: &Frame, mirror: bool) {
        if self.is_empty() {
            return;
        }
        let Some(source) = frame.to_rgb_image() else {
            return;
        };
        let mut scaled = if source.dimensions() == self.image.dimensions() {
            source
        } else {
            imageops::resize(&source, self.width(), self.height(), FilterType::Triangle)
        };
        if mirror {
            imageops::flip_horizontal_in_place(&mut scaled);
        }
        self.image = scaled;
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    /// Copies the current pixels out as a frame, e.g. for encoding.
    pub fn snapshot(&self, index: usize) -> Frame {
        Frame::from_rgb_image(self.image.clone(), index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(w: u32, h: u32) -> Frame {
        let mut data = Vec::with_capacity((w * h * 3) as usize);
        for _y in 0..h {
            for x in 0..w {
                data.extend_from_slice(&[x as u8, 0, 0]);
            }
        }
        Frame::new(data, w, h, 0)
    }

    #[test]
    fn test_new_surface_is_black() {
        let surface = DrawingSurface::new(4, 2);
        assert_eq!(surface.dimensions(), (4, 2));
        assert!(surface.image().pixels().all(|p| *p == CLEAR_COLOR));
    }

    #[test]
    fn test_resize_changes_dimensions() {
        let mut surface = DrawingSurface::new(0, 0);
        assert!(surface.is_empty());
        surface.resize(8, 6);
        assert_eq!(surface.dimensions(), (8, 6));
        assert!(!surface.is_empty());
    }

    #[test]
    fn test_draw_frame_without_mirror_keeps_orientation() {
        let mut surface = DrawingSurface::new(4, 1);
        surface.draw_frame(&gradient_frame(4, 1), false);
        assert_eq!(surface.image().get_pixel(0, 0)[0], 0);
        assert_eq!(surface.image().get_pixel(3, 0)[0], 3);
    }

    #[test]
    fn test_draw_frame_mirrored_flips_columns() {
        let mut surface = DrawingSurface::new(4, 1);
        surface.draw_frame(&gradient_frame(4, 1), true);
        assert_eq!(surface.image().get_pixel(0, 0)[0], 3);
        assert_eq!(surface.image().get_pixel(3, 0)[0], 0);
    }

    #[test]
    fn test_draw_frame_scales_to_surface() {
        let mut surface = DrawingSurface::new(8, 4);
        surface.draw_frame(&Frame::new(vec![200; 4 * 2 * 3], 4, 2, 0), false);
        assert_eq!(surface.dimensions(), (8, 4));
        assert_eq!(surface.image().get_pixel(7, 3)[1], 200);
    }

    #[test]
    fn test_clear_blanks_pixels() {
        let mut surface = DrawingSurface::new(2, 2);
        surface.draw_frame(&Frame::new(vec![255; 12], 2, 2, 0), false);
        surface.clear();
        assert!(surface.image().pixels().all(|p| *p == CLEAR_COLOR));
    }

    #[test]
    fn test_snapshot_matches_pixels() {
        let mut surface = DrawingSurface::new(2, 2);
        surface.draw_frame(&Frame::new(vec![9; 12], 2, 2, 0), false);
        let frame = surface.snapshot(5);
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.dimensions(), (2, 2));
        assert!(frame.data().iter().all(|&b| b == 9));
    }
}
