//! Image preprocessing for the trunk.
//!
//! Pipeline per image:
//! 1. Decode from file (format sniffed by the `image` crate)
//! 2. Coerce grayscale/alpha input to plain 3-channel RGB
//! 3. Resize to a fixed square resolution with bilinear interpolation
//! 4. Normalize each channel: (value/255 − mean) / std
//! 5. Emit planar CHW `f32` values for the convolution stem

use std::path::Path;

use image::DynamicImage;

use crate::config::ModelConfig;
use crate::error::{EmbedError, EmbedResult};

/// Image decoder and normalizer.
pub struct ImageProcessor {
    target_size: u32,
    mean: [f32; 3],
    std: [f32; 3],
}

impl ImageProcessor {
    /// Create a processor with explicit parameters.
    #[must_use]
    pub fn new(target_size: u32, mean: [f32; 3], std: [f32; 3]) -> Self {
        Self {
            target_size,
            mean,
            std,
        }
    }

    /// Create a processor matching a model's expected input.
    #[must_use]
    pub fn for_model(config: &ModelConfig) -> Self {
        Self::new(config.image_size, config.mean, config.std)
    }

    /// Decode and preprocess one image file.
    ///
    /// Returns `3 * size * size` values in planar CHW order. Undecodable
    /// files propagate an error; there is no retry.
    pub fn load(&self, path: &Path) -> EmbedResult<Vec<f32>> {
        let img = image::open(path).map_err(|e| EmbedError::InvalidImage {
            path: path.to_path_buf(),
            reason: format!("decode failed: {}", e),
        })?;
        Ok(self.preprocess(&img))
    }

    /// Resize, coerce to RGB, and normalize a decoded image.
    #[must_use]
    pub fn preprocess(&self, img: &DynamicImage) -> Vec<f32> {
        let resized = img.resize_exact(
            self.target_size,
            self.target_size,
            image::imageops::FilterType::Triangle,
        );

        // to_rgb8 folds grayscale up and drops alpha.
        let rgb = resized.to_rgb8();
        let pixels = (self.target_size * self.target_size) as usize;

        let mut buffer = vec![0.0f32; pixels * 3];
        for (i, pixel) in rgb.pixels().enumerate() {
            for channel in 0..3 {
                let value = f32::from(pixel[channel]) / 255.0;
                buffer[channel * pixels + i] = (value - self.mean[channel]) / self.std[channel];
            }
        }
        buffer
    }

    /// Square resolution the processor emits.
    #[must_use]
    pub const fn target_size(&self) -> u32 {
        self.target_size
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    use super::*;
    use crate::config::{IMAGENET_MEAN, IMAGENET_STD};

    fn processor(size: u32) -> ImageProcessor {
        ImageProcessor::new(size, IMAGENET_MEAN, IMAGENET_STD)
    }

    #[test]
    fn output_is_planar_chw() {
        let mut img = RgbImage::new(4, 4);
        for pixel in img.pixels_mut() {
            *pixel = Rgb([255, 0, 0]);
        }
        let buffer = processor(4).preprocess(&DynamicImage::ImageRgb8(img));
        assert_eq!(buffer.len(), 3 * 4 * 4);

        // Uniform red: the whole R plane holds one value, G and B another.
        let r = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let g = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        for i in 0..16 {
            assert!((buffer[i] - r).abs() < 1e-6);
            assert!((buffer[16 + i] - g).abs() < 1e-6);
        }
    }

    #[test]
    fn resizes_to_target_resolution() {
        let img = RgbImage::new(10, 6);
        let buffer = processor(8).preprocess(&DynamicImage::ImageRgb8(img));
        assert_eq!(buffer.len(), 3 * 8 * 8);
    }

    #[test]
    fn alpha_channel_is_dropped() {
        let mut img = RgbaImage::new(4, 4);
        for pixel in img.pixels_mut() {
            *pixel = Rgba([10, 20, 30, 128]);
        }
        let buffer = processor(4).preprocess(&DynamicImage::ImageRgba8(img));
        assert_eq!(buffer.len(), 3 * 4 * 4);
    }

    #[test]
    fn grayscale_is_coerced_to_rgb() {
        let img = image::GrayImage::from_pixel(4, 4, image::Luma([100]));
        let buffer = processor(4).preprocess(&DynamicImage::ImageLuma8(img));
        assert_eq!(buffer.len(), 3 * 4 * 4);
        // All three planes carry the same source value, shifted by each
        // channel's own mean/std.
        let v = 100.0 / 255.0;
        for channel in 0..3 {
            let expected = (v - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel];
            assert!((buffer[channel * 16] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn missing_file_propagates() {
        let result = processor(4).load(Path::new("/nonexistent/image.jpg"));
        assert!(matches!(result, Err(EmbedError::InvalidImage { .. })));
    }
}
