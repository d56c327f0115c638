//! Video frame types and JPEG encoding

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbImage};

use crate::CameraError;

/// Default JPEG quality for uploaded frames (0.8 on a 0..1 scale)
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds since the stream was opened)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Wrap a decoded RGB image
    pub fn from_rgb_image(image: RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, timestamp_ns, sequence)
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        self.data
            .get(idx..idx + 3)
            .map(|p| [p[0], p[1], p[2]])
    }

    /// Resize frame (nearest neighbour)
    pub fn resize(&self, new_width: u32, new_height: u32) -> VideoFrame {
        let mut resized = Vec::with_capacity((new_width * new_height * 3) as usize);

        let x_ratio = self.width as f32 / new_width.max(1) as f32;
        let y_ratio = self.height as f32 / new_height.max(1) as f32;

        for y in 0..new_height {
            for x in 0..new_width {
                let x0 = (x as f32 * x_ratio).floor() as u32;
                let y0 = (y as f32 * y_ratio).floor() as u32;

                match self.get_pixel(
                    x0.min(self.width.saturating_sub(1)),
                    y0.min(self.height.saturating_sub(1)),
                ) {
                    Some(pixel) => resized.extend_from_slice(&pixel),
                    None => resized.extend_from_slice(&[0, 0, 0]),
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

    /// Encode as JPEG for upload
    ///
    /// `quality` is clamped to 1..=100.
    pub fn encode_jpeg(&self, quality: u8) -> Result<EncodedFrame, CameraError> {
        if self.width == 0 || self.height == 0 {
            return Err(CameraError::Encode("frame has no pixels".to_string()));
        }
        let expected = (self.width * self.height * 3) as usize;
        if self.data.len() != expected {
            return Err(CameraError::Format(format!(
                "expected {} bytes of RGB data, got {}",
                expected,
                self.data.len()
            )));
        }

        let mut bytes = Vec::with_capacity(expected / 8);
        JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
            .encode(&self.data, self.width, self.height, ExtendedColorType::Rgb8)
            .map_err(|e| CameraError::Encode(e.to_string()))?;

        Ok(EncodedFrame {
            bytes,
            width: self.width,
            height: self.height,
            sequence: self.sequence,
        })
    }
}

/// JPEG-encoded frame, alive for the duration of one upload
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// JPEG bytes
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Sequence number of the source frame
    pub sequence: u32,
}

impl EncodedFrame {
    /// MIME type of the payload
    pub fn content_type(&self) -> &'static str {
        "image/jpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> VideoFrame {
        let data = rgb.repeat((width * height) as usize);
        VideoFrame::new(data, width, height, 0, 7)
    }

    #[test]
    fn test_get_pixel_bounds() {
        let frame = solid(4, 2, [10, 20, 30]);
        assert_eq!(frame.get_pixel(3, 1), Some([10, 20, 30]));
        assert_eq!(frame.get_pixel(4, 0), None);
        assert_eq!(frame.get_pixel(0, 2), None);
    }

    #[test]
    fn test_encode_jpeg_produces_jpeg_markers() {
        let frame = solid(64, 48, [200, 100, 50]);
        let encoded = frame.encode_jpeg(DEFAULT_JPEG_QUALITY).unwrap();

        assert_eq!(&encoded.bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(&encoded.bytes[encoded.bytes.len() - 2..], &[0xFF, 0xD9]);
        assert_eq!(encoded.width, 64);
        assert_eq!(encoded.height, 48);
        assert_eq!(encoded.sequence, 7);
        assert_eq!(encoded.content_type(), "image/jpeg");
    }

    #[test]
    fn test_encode_rejects_empty_frame() {
        let frame = VideoFrame::new(Vec::new(), 0, 0, 0, 0);
        assert!(matches!(frame.encode_jpeg(80), Err(CameraError::Encode(_))));
    }

    #[test]
    fn test_encode_rejects_short_buffer() {
        let frame = VideoFrame::new(vec![0; 10], 4, 4, 0, 0);
        assert!(matches!(frame.encode_jpeg(80), Err(CameraError::Format(_))));
    }

    #[test]
    fn test_encoded_frame_decodes_to_same_size() {
        let frame = solid(32, 16, [0, 255, 0]);
        let encoded = frame.encode_jpeg(80).unwrap();
        let decoded = image::load_from_memory(&encoded.bytes).unwrap();
        assert_eq!(decoded.width(), 32);
        assert_eq!(decoded.height(), 16);
    }

    proptest! {
        #[test]
        fn resize_produces_requested_dimensions(w in 1u32..64, h in 1u32..64) {
            let frame = solid(20, 10, [1, 2, 3]);
            let resized = frame.resize(w, h);
            prop_assert_eq!(resized.width, w);
            prop_assert_eq!(resized.height, h);
            prop_assert_eq!(resized.data.len(), (w * h * 3) as usize);
        }
    }
}
