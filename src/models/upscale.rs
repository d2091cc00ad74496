//! Upscaling with optional denoise and sharpen passes.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use crate::error::{Error, Result};

pub const SUPPORTED_SCALES: [u32; 3] = [2, 4, 8];

/// Largest output edge, in pixels.
pub const MAX_OUTPUT_DIMENSION: u32 = 16_384;

pub fn upscale(
    image: &DynamicImage,
    scale: u32,
    denoise_level: f32,
    sharpen: bool,
) -> Result<DynamicImage> {
    if !SUPPORTED_SCALES.contains(&scale) {
        return Err(Error::InvalidParams(
            "Scale factor must be 2, 4, or 8".to_string(),
        ));
    }

    let (w, h) = image.dimensions();
    let (new_w, new_h) = match (w.checked_mul(scale), h.checked_mul(scale)) {
        (Some(nw), Some(nh)) if nw <= MAX_OUTPUT_DIMENSION && nh <= MAX_OUTPUT_DIMENSION => {
            (nw, nh)
        }
        _ => {
            return Err(Error::InvalidParams(format!(
                "Upscaled image would exceed {}x{} pixels",
                MAX_OUTPUT_DIMENSION, MAX_OUTPUT_DIMENSION
            )))
        }
    };

    let source = if denoise_level > 0.0 {
        image.blur(denoise_level * 2.0)
    } else {
        image.clone()
    };
    let mut result = source.resize_exact(new_w, new_h, FilterType::Lanczos3);
    if sharpen {
        result = result.unsharpen(1.0, 2);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::square_on_white;

    #[test]
    fn test_dimensions_scale() {
        let image = square_on_white(8);
        for scale in SUPPORTED_SCALES {
            let out = upscale(&image, scale, 0.0, false).unwrap();
            assert_eq!(out.dimensions(), (8 * scale, 8 * scale));
        }
    }

    #[test]
    fn test_denoise_and_sharpen_keep_dimensions() {
        let out = upscale(&square_on_white(8), 2, 0.5, true).unwrap();
        assert_eq!(out.dimensions(), (16, 16));
    }

    #[test]
    fn test_rejects_unsupported_scale() {
        let err = upscale(&square_on_white(4), 3, 0.0, false).unwrap_err();
        assert_eq!(err.to_string(), "Scale factor must be 2, 4, or 8");
    }

    #[test]
    fn test_rejects_oversized_output() {
        let image = DynamicImage::new_rgba8(4096, 1);
        assert!(upscale(&image, 8, 0.0, false).is_err());
    }
}
