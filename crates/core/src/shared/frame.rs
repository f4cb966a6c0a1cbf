use image::RgbImage;
use ndarray::ArrayView3;

/// A single captured camera frame: contiguous RGB24 bytes in row-major order.
///
/// Pixel format conversion happens at the capture boundary; everything
/// downstream (detection, drawing, encoding) sees RGB24.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: usize,
}

impl Frame {
    pub const CHANNELS: usize = 3;

    pub fn new(data: Vec<u8>, width: u32, height: u32, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * Self::CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            index,
        }
    }

    /// Wraps an RGB image produced by the drawing surface.
    pub fn from_rgb_image(image: RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Capture sequence number.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> Option<ArrayView3<'_, u8>> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, Self::CHANNELS),
            &self.data,
        )
        .ok()
    }

    /// Copies the pixels into an `RgbImage` for drawing.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.dimensions(), (2, 2));
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * 3")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 0);
    }

    #[test]
    fn test_as_ndarray_pixel_access() {
        // 2x2 RGB: pixel (row=1, col=0) is red
        let mut data = vec![0u8; 12];
        data[6] = 255;
        let frame = Frame::new(data, 2, 2, 0);
        let arr = frame.as_ndarray().unwrap();
        assert_eq!(arr.shape(), &[2, 2, 3]);
        assert_eq!(arr[[1, 0, 0]], 255);
        assert_eq!(arr[[1, 0, 1]], 0);
    }

    #[test]
    fn test_rgb_image_conversion_keeps_pixels() {
        let mut data = vec![0u8; 4 * 2 * 3];
        data[3] = 7; // (x=1, y=0) R
        let frame = Frame::new(data, 4, 2, 3);
        let image = frame.to_rgb_image().unwrap();
        assert_eq!(image.get_pixel(1, 0).0, [7, 0, 0]);

        let back = Frame::from_rgb_image(image, 9);
        assert_eq!(back.dimensions(), (4, 2));
        assert_eq!(back.index(), 9);
        assert_eq!(back.data()[3], 7);
    }
}
