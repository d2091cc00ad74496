//! Style transfer.
//!
//! Each style is a three-color palette. Pixel luminance is mapped onto the
//! palette and blended with the original by `strength`.

use image::{DynamicImage, Rgba, RgbaImage};
use serde::Serialize;

use crate::error::{Error, Result};

pub const DEFAULT_STYLE: &str = "starry_night";

#[derive(Debug, Clone, Serialize)]
pub struct StyleInfo {
    pub id: &'static str,
    pub name: &'static str,
    #[serde(skip)]
    pub palette: [[u8; 3]; 3],
}

pub static STYLES: &[StyleInfo] = &[
    StyleInfo {
        id: "starry_night",
        name: "Starry Night (Van Gogh)",
        palette: [[16, 32, 84], [52, 98, 168], [240, 214, 92]],
    },
    StyleInfo {
        id: "mosaic",
        name: "Mosaic",
        palette: [[60, 34, 20], [184, 92, 38], [236, 220, 180]],
    },
    StyleInfo {
        id: "candy",
        name: "Candy",
        palette: [[120, 10, 90], [240, 70, 140], [255, 220, 120]],
    },
    StyleInfo {
        id: "udnie",
        name: "Udnie",
        palette: [[30, 24, 40], [150, 110, 90], [230, 200, 170]],
    },
];

pub fn available_styles() -> &'static [StyleInfo] {
    STYLES
}

pub fn find_style(id: &str) -> Result<&'static StyleInfo> {
    STYLES.iter().find(|s| s.id == id).ok_or_else(|| {
        let known: Vec<&str> = STYLES.iter().map(|s| s.id).collect();
        Error::InvalidParams(format!(
            "Unknown style '{}'. Available styles: {}",
            id,
            known.join(", ")
        ))
    })
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn palette_color(palette: &[[u8; 3]; 3], luma: f32) -> [f32; 3] {
    let (lo, hi, t) = if luma < 0.5 {
        (palette[0], palette[1], luma * 2.0)
    } else {
        (palette[1], palette[2], (luma - 0.5) * 2.0)
    };
    [0, 1, 2].map(|i| lerp(f32::from(lo[i]), f32::from(hi[i]), t))
}

/// Restyle `image`. `strength` is in `[0, 1]`; zero returns the input unchanged.
pub fn apply_style(image: &DynamicImage, style: &StyleInfo, strength: f32) -> RgbaImage {
    let mut rgba = image.to_rgba8();
    for pixel in rgba.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let luma =
            (0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b)) / 255.0;
        let target = palette_color(&style.palette, luma);
        let blend = |c: u8, t: f32| lerp(f32::from(c), t, strength).round().clamp(0.0, 255.0) as u8;
        *pixel = Rgba([blend(r, target[0]), blend(g, target[1]), blend(b, target[2]), a]);
    }
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::square_on_white;

    #[test]
    fn test_known_styles() {
        let ids: Vec<&str> = available_styles().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["starry_night", "mosaic", "candy", "udnie"]);
        assert_eq!(find_style(DEFAULT_STYLE).unwrap().name, "Starry Night (Van Gogh)");
    }

    #[test]
    fn test_unknown_style() {
        let err = find_style("cubism").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown style 'cubism'. Available styles: starry_night, mosaic, candy, udnie"
        );
    }

    #[test]
    fn test_style_serializes_without_palette() {
        let value = serde_json::to_value(&STYLES[1]).unwrap();
        assert_eq!(value, serde_json::json!({"id": "mosaic", "name": "Mosaic"}));
    }

    #[test]
    fn test_zero_strength_is_identity() {
        let image = square_on_white(8);
        let styled = apply_style(&image, find_style("candy").unwrap(), 0.0);
        assert_eq!(styled, image.to_rgba8());
    }

    #[test]
    fn test_full_strength_maps_white_to_palette_top() {
        let image = square_on_white(8);
        let style = find_style("starry_night").unwrap();
        let styled = apply_style(&image, style, 1.0);

        assert_eq!(styled.get_pixel(0, 0).0, [240, 214, 92, 255]);
    }
}
