//! Inpainting.
//!
//! Masked pixels (bright in the mask) are filled with the mean color of the
//! unmasked pixels.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

use crate::error::{Error, Result};

/// Mask luminance above which a pixel is repainted.
const MASK_CUTOFF: u8 = 127;

pub fn inpaint(image: &DynamicImage, mask: &DynamicImage) -> Result<RgbaImage> {
    let (w, h) = image.dimensions();
    let mask = if mask.dimensions() == (w, h) {
        mask.to_luma8()
    } else {
        mask.resize_exact(w, h, FilterType::Nearest).to_luma8()
    };
    let mut rgba = image.to_rgba8();

    let mut sum = [0u64; 4];
    let mut count = 0u64;
    for (pixel, m) in rgba.pixels().zip(mask.pixels()) {
        if m.0[0] <= MASK_CUTOFF {
            for (acc, channel) in sum.iter_mut().zip(pixel.0.iter()) {
                *acc += u64::from(*channel);
            }
            count += 1;
        }
    }

    if count == 0 {
        return Err(Error::InvalidParams(
            "Mask covers the entire image".to_string(),
        ));
    }

    let fill = Rgba(sum.map(|s| (s / count) as u8));
    for (pixel, m) in rgba.pixels_mut().zip(mask.pixels()) {
        if m.0[0] > MASK_CUTOFF {
            *pixel = fill;
        }
    }
    Ok(rgba)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_masked_region_takes_mean_color() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_fn(4, 1, |x, _| {
            if x < 2 {
                Rgba([100, 100, 100, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        }));
        let mask = DynamicImage::ImageLuma8(GrayImage::from_fn(4, 1, |x, _| {
            if x == 3 {
                Luma([255])
            } else {
                Luma([0])
            }
        }));

        let result = inpaint(&image, &mask).unwrap();
        // Mean of 100, 100, 0 is 66.
        assert_eq!(result.get_pixel(3, 0).0, [66, 66, 66, 255]);
        assert_eq!(result.get_pixel(0, 0).0, [100, 100, 100, 255]);
    }

    #[test]
    fn test_mask_is_resized() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 255])));
        let mask = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([0])));

        let result = inpaint(&image, &mask).unwrap();
        assert_eq!(result.dimensions(), (8, 8));
    }

    #[test]
    fn test_full_mask_is_rejected() {
        let image = DynamicImage::ImageRgba8(RgbaImage::new(2, 2));
        let mask = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([255])));

        assert!(inpaint(&image, &mask).is_err());
    }
}
