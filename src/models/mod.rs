//! Placeholder image models.
//!
//! Deterministic stand-ins for the AI backends. Images travel as base64
//! strings, optionally wrapped in a `data:` URL; results are encoded as PNG.

pub mod analysis;
pub mod background;
pub mod inpainting;
pub mod style;
pub mod upscale;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageOutputFormat};
use std::io::Cursor;

use crate::error::{Error, Result};

/// Decode a base64 image payload.
pub fn decode_image(data: &str) -> Result<DynamicImage> {
    let payload = match data.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => data,
    };
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::InvalidImage(e.to_string()))?;
    Ok(image::load_from_memory(&bytes)?)
}

/// Encode an image as base64 PNG.
pub fn encode_png(image: &DynamicImage) -> Result<String> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageOutputFormat::Png)?;
    Ok(STANDARD.encode(buf.into_inner()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use image::{DynamicImage, Rgba, RgbaImage};

    /// A white canvas with a red square in the middle.
    pub fn square_on_white(size: u32) -> DynamicImage {
        let quarter = size / 4;
        DynamicImage::ImageRgba8(RgbaImage::from_fn(size, size, |x, y| {
            let inside = (quarter..size - quarter).contains(&x)
                && (quarter..size - quarter).contains(&y);
            if inside {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        }))
    }
}
