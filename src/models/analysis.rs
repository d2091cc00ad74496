//! Color statistics for image analysis.

use image::DynamicImage;
use serde::Serialize;

/// Named reference colors a dominant color is matched against.
const REFERENCE_COLORS: [(&str, [u8; 3]); 9] = [
    ("Red", [180, 0, 0]),
    ("Green", [0, 180, 0]),
    ("Blue", [0, 0, 180]),
    ("Yellow", [180, 180, 0]),
    ("Cyan", [0, 180, 180]),
    ("Magenta", [180, 0, 180]),
    ("White", [220, 220, 220]),
    ("Black", [35, 35, 35]),
    ("Gray", [128, 128, 128]),
];

/// Per-channel distance under which the average matches a reference color.
const REFERENCE_TOLERANCE: i32 = 50;

/// Per-channel spread under which the average counts as gray.
const GRAYSCALE_TOLERANCE: i32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AverageColor {
    pub rgb: [u8; 3],
    pub hex: String,
}

/// Summary statistics over the RGB channels of an image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorAnalysis {
    pub average_color: AverageColor,
    /// Mean of the channel means.
    pub brightness: f64,
    /// Mean of the channel standard deviations.
    pub contrast: f64,
    pub is_grayscale: bool,
    pub dominant_colors: Vec<&'static str>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn analyze_colors(image: &DynamicImage) -> ColorAnalysis {
    let rgb = image.to_rgb8();
    let count = f64::from(rgb.width()) * f64::from(rgb.height());

    let mut sum = [0f64; 3];
    let mut sum_sq = [0f64; 3];
    for pixel in rgb.pixels() {
        for (c, value) in pixel.0.iter().enumerate() {
            let value = f64::from(*value);
            sum[c] += value;
            sum_sq[c] += value * value;
        }
    }

    let mut mean = [0f64; 3];
    let mut stddev = [0f64; 3];
    if count > 0.0 {
        for c in 0..3 {
            mean[c] = sum[c] / count;
            stddev[c] = (sum_sq[c] / count - mean[c] * mean[c]).max(0.0).sqrt();
        }
    }

    let average = mean.map(|m| m as u8);
    let [r, g, b] = average.map(i32::from);

    ColorAnalysis {
        average_color: AverageColor {
            rgb: average,
            hex: format!("#{:02x}{:02x}{:02x}", average[0], average[1], average[2]),
        },
        brightness: round2(mean.iter().sum::<f64>() / 3.0),
        contrast: round2(stddev.iter().sum::<f64>() / 3.0),
        is_grayscale: (r - g).abs() < GRAYSCALE_TOLERANCE && (r - b).abs() < GRAYSCALE_TOLERANCE,
        dominant_colors: dominant_colors(average),
    }
}

fn dominant_colors(average: [u8; 3]) -> Vec<&'static str> {
    let matches: Vec<&'static str> = REFERENCE_COLORS
        .iter()
        .filter(|(_, reference)| {
            average
                .iter()
                .zip(reference)
                .all(|(a, r)| (i32::from(*a) - i32::from(*r)).abs() < REFERENCE_TOLERANCE)
        })
        .map(|(name, _)| *name)
        .collect();

    if matches.is_empty() {
        vec!["Mixed"]
    } else {
        matches
    }
}
