//! Video frame types and preprocessing

use image::{GrayImage, RgbImage};
use imageproc::contrast::equalize_histogram;

use crate::CameraError;

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds since source start)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        timestamp_ns: u64,
        sequence: u32,
    ) -> Result<Self, CameraError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(CameraError::Format(format!(
                "expected {} RGB bytes for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        })
    }

    /// Solid-colour frame, handy for tests and static sources
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            data,
            width,
            height,
            timestamp_ns: 0,
            sequence: 0,
        }
    }

    /// Wrap a decoded image
    pub fn from_rgb_image(img: RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        let (width, height) = img.dimensions();
        Self {
            data: img.into_raw(),
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Borrow the pixels as an `image` buffer
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Convert to grayscale
    pub fn to_grayscale(&self) -> Vec<u8> {
        let mut gray = Vec::with_capacity((self.width * self.height) as usize);
        for pixel in self.data.chunks(3) {
            // Luminance formula: 0.299*R + 0.587*G + 0.114*B
            let y = (pixel[0] as f32 * 0.299
                   + pixel[1] as f32 * 0.587
                   + pixel[2] as f32 * 0.114) as u8;
            gray.push(y);
        }
        gray
    }

    /// Grayscale + histogram equalization, expanded back to three channels.
    ///
    /// Evens out cabin lighting before the frame reaches the detector.
    pub fn equalized(&self) -> VideoFrame {
        let gray = match GrayImage::from_raw(self.width, self.height, self.to_grayscale()) {
            Some(gray) => gray,
            None => return self.clone(),
        };
        let equalized = equalize_histogram(&gray);

        let mut data = Vec::with_capacity(equalized.len() * 3);
        for &v in equalized.as_raw() {
            data.extend_from_slice(&[v, v, v]);
        }

        VideoFrame {
            data,
            width: self.width,
            height: self.height,
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        }
    }

    /// Resize frame (nearest neighbour)
    pub fn resize(&self, new_width: u32, new_height: u32) -> VideoFrame {
        if new_width == self.width && new_height == self.height {
            return self.clone();
        }

        let mut resized = Vec::with_capacity((new_width * new_height * 3) as usize);

        let x_ratio = self.width as f32 / new_width as f32;
        let y_ratio = self.height as f32 / new_height as f32;

        for y in 0..new_height {
            for x in 0..new_width {
                let x0 = (x as f32 * x_ratio).floor() as u32;
                let y0 = (y as f32 * y_ratio).floor() as u32;

                if let Some(pixel) = self.get_pixel(
                    x0.min(self.width.saturating_sub(1)),
                    y0.min(self.height.saturating_sub(1)),
                ) {
                    resized.extend_from_slice(&pixel);
                } else {
                    resized.extend_from_slice(&[0, 0, 0]);
                }
            }
        }

        VideoFrame {
            data: resized,
            width: new_width,
            height: new_height,
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_wrong_length() {
        assert!(VideoFrame::new(vec![0; 10], 2, 2, 0, 0).is_err());
        assert!(VideoFrame::new(vec![0; 12], 2, 2, 0, 0).is_ok());
    }

    #[test]
    fn test_grayscale_white() {
        let frame = VideoFrame::filled(2, 2, [255, 255, 255]);
        let gray = frame.to_grayscale();
        assert_eq!(gray.len(), 4);
        assert!(gray.iter().all(|&v| v >= 254));
    }

    #[test]
    fn test_equalize_stretches_contrast() {
        // Two dark intensities side by side
        let data = vec![10, 10, 10, 20, 20, 20];
        let frame = VideoFrame::new(data, 2, 1, 0, 0).unwrap();
        let eq = frame.equalized();

        assert_eq!(eq.data.len(), 6);
        assert!(eq.data[0] < eq.data[3]);
        assert_eq!(eq.data[3], 255);
        // Wider gap than the input's 10 levels
        assert!(eq.data[3] - eq.data[0] > 100);
        // Channels stay equal
        assert_eq!(eq.data[3], eq.data[4]);
    }

    #[test]
    fn test_equalize_uniform_frame_is_stable() {
        let frame = VideoFrame::filled(4, 4, [90, 90, 90]);
        let eq = frame.equalized();
        assert_eq!(eq.width, 4);
        assert!(eq.data.iter().all(|&v| v == eq.data[0]));
    }

    #[test]
    fn test_resize_dimensions() {
        let frame = VideoFrame::filled(8, 6, [1, 2, 3]);
        let small = frame.resize(4, 3);
        assert_eq!(small.width, 4);
        assert_eq!(small.height, 3);
        assert_eq!(small.data.len(), 4 * 3 * 3);
        assert_eq!(small.get_pixel(0, 0), Some([1, 2, 3]));
    }

    #[test]
    fn test_rgb_image_round_trip_dimensions() {
        let frame = VideoFrame::filled(3, 2, [5, 6, 7]);
        let img = frame.to_rgb_image().unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        let back = VideoFrame::from_rgb_image(img, 42, 7);
        assert_eq!(back.timestamp_ns, 42);
        assert_eq!(back.sequence, 7);
    }
}
