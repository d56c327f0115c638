//! Overlay canvas and annotated-image decoding

use std::path::Path;

use base64::Engine;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbImage, RgbaImage};

use crate::DisplayError;

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Decode the server's base64 annotated frame and scale it to `width`x`height`
pub fn decode_annotated(encoded: &str, width: u32, height: u32) -> Result<RgbImage, DisplayError> {
    if width == 0 || height == 0 {
        return Err(DisplayError::EmptyOverlay);
    }

    let encoded = encoded.strip_prefix(DATA_URL_PREFIX).unwrap_or(encoded);
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| DisplayError::Base64(e.to_string()))?;
    let decoded = image::load_from_memory(&bytes)
        .map_err(|e| DisplayError::Decode(e.to_string()))?
        .to_rgb8();

    if decoded.dimensions() == (width, height) {
        Ok(decoded)
    } else {
        Ok(imageops::resize(&decoded, width, height, FilterType::Triangle))
    }
}

/// Transparent RGBA canvas drawn over the live video
#[derive(Debug, Clone)]
pub struct OverlayCanvas {
    pixels: RgbaImage,
}

impl OverlayCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Resize, discarding contents
    pub fn resize(&mut self, width: u32, height: u32) {
        self.pixels = RgbaImage::new(width, height);
    }

    /// Make every pixel transparent
    pub fn clear(&mut self) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    /// Replace contents with `image`, stretched to the canvas size
    pub fn draw(&mut self, image: &RgbImage) {
        let (width, height) = self.pixels.dimensions();
        if width == 0 || height == 0 {
            return;
        }

        let scaled;
        let source = if image.dimensions() == (width, height) {
            image
        } else {
            scaled = imageops::resize(image, width, height, FilterType::Triangle);
            &scaled
        };

        for (dst, src) in self.pixels.pixels_mut().zip(source.pixels()) {
            *dst = Rgba([src[0], src[1], src[2], 255]);
        }
    }

    /// True when nothing has been drawn since the last clear
    pub fn is_blank(&self) -> bool {
        self.pixels.pixels().all(|p| p[3] == 0)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        Some(self.pixels.get_pixel(x, y).0)
    }

    /// Write the canvas as a PNG
    pub fn save(&self, path: &Path) -> Result<(), DisplayError> {
        self.pixels
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| DisplayError::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::{ExtendedColorType, Rgb};
    use proptest::prelude::*;

    fn jpeg_base64(width: u32, height: u32) -> String {
        let image = RgbImage::from_pixel(width, height, Rgb([0, 200, 0]));
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, 90)
            .encode(image.as_raw(), width, height, ExtendedColorType::Rgb8)
            .unwrap();
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[test]
    fn test_decode_keeps_matching_size() {
        let image = decode_annotated(&jpeg_base64(64, 48), 64, 48).unwrap();
        assert_eq!(image.dimensions(), (64, 48));
    }

    #[test]
    fn test_decode_scales_to_overlay() {
        let image = decode_annotated(&jpeg_base64(32, 24), 64, 48).unwrap();
        assert_eq!(image.dimensions(), (64, 48));
    }

    #[test]
    fn test_decode_accepts_data_url() {
        let encoded = format!("{}{}", DATA_URL_PREFIX, jpeg_base64(8, 8));
        assert!(decode_annotated(&encoded, 8, 8).is_ok());
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        assert!(matches!(
            decode_annotated("***", 8, 8),
            Err(DisplayError::Base64(_))
        ));
    }

    #[test]
    fn test_decode_rejects_non_image() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"not a jpeg");
        assert!(matches!(
            decode_annotated(&encoded, 8, 8),
            Err(DisplayError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_empty_overlay() {
        assert!(matches!(
            decode_annotated(&jpeg_base64(8, 8), 0, 480),
            Err(DisplayError::EmptyOverlay)
        ));
    }

    #[test]
    fn test_draw_replaces_and_clear_blanks() {
        let mut canvas = OverlayCanvas::new(4, 4);
        assert!(canvas.is_blank());

        canvas.draw(&RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])));
        assert_eq!(canvas.pixel(0, 0), Some([1, 2, 3, 255]));

        canvas.draw(&RgbImage::from_pixel(2, 2, Rgb([9, 9, 9])));
        assert_eq!(canvas.pixel(3, 3), Some([9, 9, 9, 255]));

        canvas.clear();
        assert!(canvas.is_blank());
    }

    #[test]
    fn test_draw_on_unsized_canvas_is_noop() {
        let mut canvas = OverlayCanvas::new(0, 0);
        canvas.draw(&RgbImage::from_pixel(2, 2, Rgb([9, 9, 9])));
        assert!(canvas.is_blank());
    }

    proptest! {
        #[test]
        fn resize_always_blank(w in 0u32..32, h in 0u32..32) {
            let mut canvas = OverlayCanvas::new(4, 4);
            canvas.draw(&RgbImage::from_pixel(4, 4, Rgb([5, 5, 5])));
            canvas.resize(w, h);
            prop_assert_eq!((canvas.width(), canvas.height()), (w, h));
            prop_assert!(canvas.is_blank());
        }
    }
}
