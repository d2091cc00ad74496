//! Background removal.
//!
//! The background color is estimated from the image border; pixels whose
//! color distance from it falls below the threshold become transparent.

use image::{DynamicImage, Rgba, RgbaImage};

fn border_color(image: &RgbaImage) -> [f32; 3] {
    let (w, h) = image.dimensions();
    let mut sum = [0f64; 3];
    let mut count = 0f64;

    for (x, y, pixel) in image.enumerate_pixels() {
        if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
            for (acc, channel) in sum.iter_mut().zip(pixel.0.iter()) {
                *acc += f64::from(*channel);
            }
            count += 1.0;
        }
    }

    if count == 0.0 {
        return [0.0; 3];
    }
    [
        (sum[0] / count) as f32,
        (sum[1] / count) as f32,
        (sum[2] / count) as f32,
    ]
}

/// Foreground score in `[0, 1]` for every pixel, row-major.
pub fn saliency_mask(image: &RgbaImage) -> Vec<f32> {
    let background = border_color(image);
    image
        .pixels()
        .map(|p| {
            let distance = p.0[..3]
                .iter()
                .zip(background.iter())
                .map(|(c, b)| (f32::from(*c) - b).powi(2))
                .sum::<f32>()
                .sqrt();
            (distance / 255.0).min(1.0)
        })
        .collect()
}

/// Make background pixels transparent. `threshold` is in `[0, 1]`.
pub fn remove_background(image: &DynamicImage, threshold: f32) -> RgbaImage {
    let mut rgba = image.to_rgba8();
    let mask = saliency_mask(&rgba);

    for (pixel, score) in rgba.pixels_mut().zip(mask) {
        if score <= threshold {
            *pixel = Rgba([pixel.0[0], pixel.0[1], pixel.0[2], 0]);
        }
    }
    rgba
}
