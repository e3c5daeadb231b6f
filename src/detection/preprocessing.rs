use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, Rgb, RgbImage};
use imageproc::filter::{median_filter, separable_filter_equal};
use serde::{Deserialize, Serialize};

use crate::detection::morphology::BorderMode;
use crate::error::ConfigError;
use crate::models::{MASK_BACKGROUND, MASK_FOREGROUND, Mask, Range};

/// Interpolation used when scaling frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    Nearest,
    Linear,
    #[default]
    Cubic,
    Lanczos,
}

impl Interpolation {
    fn filter_type(self) -> FilterType {
        match self {
            Interpolation::Nearest => FilterType::Nearest,
            Interpolation::Linear => FilterType::Triangle,
            Interpolation::Cubic => FilterType::CatmullRom,
            Interpolation::Lanczos => FilterType::Lanczos3,
        }
    }
}

/// Scale an image to exactly `width` x `height`, ignoring aspect ratio
pub fn resize(image: &RgbImage, width: u32, height: u32, interpolation: Interpolation) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    imageops::resize(image, width, height, interpolation.filter_type())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlurKind {
    Box,
    Gaussian,
    Median,
    Bilateral,
}

/// A blur with its radius already resolved into the parameters the filter uses
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlurFilter {
    Box { ksize: u32 },
    Gaussian { ksize: u32, sigma: f32 },
    Median { ksize: u32 },
    /// Color and space sigma; the window is sized from the sigma.
    Bilateral { sigma: f32 },
}

impl BlurFilter {
    /// Resolve a tuned radius into kernel parameters.
    ///
    /// Box and median use `2r + 1`, gaussian `6r + 1` with sigma `r`, where `r`
    /// is the radius rounded half away from zero.
    pub fn new(kind: BlurKind, radius: f64) -> Result<Self, ConfigError> {
        if !radius.is_finite() {
            return Err(ConfigError::NonFinite {
                field: "blur.radius",
                value: radius,
            });
        }
        if radius < 0.0 {
            return Err(ConfigError::Negative {
                field: "blur.radius",
                value: radius,
            });
        }
        let r = radius.round() as u32;
        Ok(match kind {
            BlurKind::Box => BlurFilter::Box { ksize: 2 * r + 1 },
            BlurKind::Gaussian => BlurFilter::Gaussian {
                ksize: 6 * r + 1,
                sigma: r as f32,
            },
            BlurKind::Median => BlurFilter::Median { ksize: 2 * r + 1 },
            BlurKind::Bilateral => BlurFilter::Bilateral {
                sigma: radius as f32,
            },
        })
    }

    pub fn apply(&self, image: &RgbImage) -> RgbImage {
        match *self {
            BlurFilter::Box { ksize } if ksize > 1 => {
                let kernel = vec![1.0 / ksize as f32; ksize as usize];
                blur_separable(image, &kernel)
            }
            BlurFilter::Gaussian { ksize, sigma } if ksize > 1 && sigma > 0.0 => {
                blur_separable(image, &gaussian_kernel(ksize, sigma))
            }
            BlurFilter::Median { ksize } if ksize > 1 => {
                let radius = ksize / 2;
                median_filter(image, radius, radius)
            }
            BlurFilter::Bilateral { sigma } => bilateral(image, sigma),
            _ => image.clone(),
        }
    }
}

fn gaussian_kernel(ksize: u32, sigma: f32) -> Vec<f32> {
    let center = (ksize as f32 - 1.0) / 2.0;
    let weights: Vec<f32> = (0..ksize)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

fn reflect(p: i64, len: i64) -> i64 {
    BorderMode::Reflect101.index(p, len).unwrap_or(0)
}

/// Filter rows then columns with the same odd-length kernel.
///
/// Runs on f32 samples so the intermediate row pass is not truncated to u8.
fn blur_separable(image: &RgbImage, kernel: &[f32]) -> RgbImage {
    let (width, height) = image.dimensions();
    let samples: ImageBuffer<Rgb<f32>, Vec<f32>> =
        ImageBuffer::from_fn(width, height, |x, y| Rgb(image.get_pixel(x, y).0.map(f32::from)));
    let filtered = separable_filter_equal(&samples, kernel);
    RgbImage::from_fn(width, height, |x, y| {
        Rgb(filtered.get_pixel(x, y).0.map(|v| v.round().clamp(0.0, 255.0) as u8))
    })
}

/// Edge-preserving blur over a circular window of radius `1.5 * sigma`
fn bilateral(image: &RgbImage, sigma: f32) -> RgbImage {
    let sigma = if sigma > 0.0 { sigma } else { 1.0 };
    let radius = ((sigma * 1.5).round() as i64).max(1);
    let coeff = -0.5 / (sigma * sigma);

    let window: Vec<(i64, i64, f32)> = (-radius..=radius)
        .flat_map(|dy| (-radius..=radius).map(move |dx| (dx, dy)))
        .filter(|(dx, dy)| dx * dx + dy * dy <= radius * radius)
        .map(|(dx, dy)| (dx, dy, ((dx * dx + dy * dy) as f32 * coeff).exp()))
        .collect();

    let (width, height) = image.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let center = image.get_pixel(x, y).0;
        let mut sum = [0f32; 3];
        let mut total = 0f32;
        for &(dx, dy, spatial) in &window {
            let sx = reflect(x as i64 + dx, width as i64);
            let sy = reflect(y as i64 + dy, height as i64);
            let pixel = image.get_pixel(sx as u32, sy as u32).0;
            let diff: i32 = pixel
                .iter()
                .zip(center)
                .map(|(&a, b)| (a as i32 - b as i32).abs())
                .sum();
            let weight = spatial * ((diff * diff) as f32 * coeff).exp();
            for (s, v) in sum.iter_mut().zip(pixel) {
                *s += weight * v as f32;
            }
            total += weight;
        }
        Rgb(sum.map(|v| (v / total).round().clamp(0.0, 255.0) as u8))
    })
}

/// Convert one RGB pixel to 8-bit HSV: hue in `[0, 180)`, saturation and value in `[0, 255]`
pub fn rgb_to_hsv(pixel: Rgb<u8>) -> [u8; 3] {
    let [r, g, b] = pixel.0.map(i32::from);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v == 0 {
        0
    } else {
        (255.0 * diff as f64 / v as f64).round() as i32
    };

    let h = if diff == 0 {
        0.0
    } else {
        let d = diff as f64;
        let degrees = if v == r {
            60.0 * (g - b) as f64 / d
        } else if v == g {
            120.0 + 60.0 * (b - r) as f64 / d
        } else {
            240.0 + 60.0 * (r - g) as f64 / d
        };
        if degrees < 0.0 { degrees + 360.0 } else { degrees }
    };
    let mut h = (h / 2.0).round() as i32;
    if h >= 180 {
        h -= 180;
    }

    [h as u8, s as u8, v as u8]
}

/// Inclusive hue/saturation/value ranges. Hue does not wrap around 180.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HsvRanges {
    pub hue: Range,
    pub saturation: Range,
    pub value: Range,
}

impl HsvRanges {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.hue.validate("threshold.hue")?;
        self.saturation.validate("threshold.saturation")?;
        self.value.validate("threshold.value")
    }

    /// Bounds as 8-bit values: round half to even, then clamp.
    fn byte_bounds(&self) -> [(u8, u8); 3] {
        [self.hue, self.saturation, self.value].map(|range| (to_byte(range.min), to_byte(range.max)))
    }
}

fn to_byte(value: f64) -> u8 {
    value.round_ties_even().clamp(0.0, 255.0) as u8
}

/// Segment an image: foreground iff all three HSV channels are in range
pub fn hsv_threshold(image: &RgbImage, ranges: &HsvRanges) -> Mask {
    let bounds = ranges.byte_bounds();
    let (width, height) = image.dimensions();
    Mask::from_fn(width, height, |x, y| {
        let hsv = rgb_to_hsv(*image.get_pixel(x, y));
        let inside = hsv
            .iter()
            .zip(bounds)
            .all(|(&channel, (lo, hi))| channel >= lo && channel <= hi);
        Luma([if inside { MASK_FOREGROUND } else { MASK_BACKGROUND }])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Rgb([0, 0, 0]), [0, 0, 0])]
    #[case(Rgb([255, 255, 255]), [0, 0, 255])]
    #[case(Rgb([255, 0, 0]), [0, 255, 255])]
    #[case(Rgb([0, 255, 0]), [60, 255, 255])]
    #[case(Rgb([0, 0, 255]), [120, 255, 255])]
    #[case(Rgb([255, 0, 1]), [0, 255, 255])]
    #[case(Rgb([128, 64, 64]), [0, 128, 128])]
    fn test_rgb_to_hsv(#[case] rgb: Rgb<u8>, #[case] hsv: [u8; 3]) {
        assert_eq!(rgb_to_hsv(rgb), hsv);
    }

    #[rstest]
    #[case(BlurKind::Box, 3.8472440561712458, BlurFilter::Box { ksize: 9 })]
    #[case(BlurKind::Median, 2.5, BlurFilter::Median { ksize: 7 })]
    #[case(BlurKind::Gaussian, 3.8472440561712458, BlurFilter::Gaussian { ksize: 25, sigma: 4.0 })]
    #[case(BlurKind::Gaussian, 0.4, BlurFilter::Gaussian { ksize: 1, sigma: 0.0 })]
    #[case(BlurKind::Bilateral, 1.25, BlurFilter::Bilateral { sigma: 1.25 })]
    fn test_blur_kernel_sizes(#[case] kind: BlurKind, #[case] radius: f64, #[case] expected: BlurFilter) {
        assert_eq!(BlurFilter::new(kind, radius).unwrap(), expected);
    }

    #[test]
    fn test_blur_rejects_negative_radius() {
        assert!(matches!(
            BlurFilter::new(BlurKind::Box, -1.0),
            Err(ConfigError::Negative { .. })
        ));
    }

    #[rstest]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    #[case(f64::NEG_INFINITY)]
    fn test_blur_rejects_non_finite_radius(#[case] radius: f64) {
        assert!(matches!(
            BlurFilter::new(BlurKind::Gaussian, radius),
            Err(ConfigError::NonFinite { field: "blur.radius", .. })
        ));
    }

    #[test]
    fn test_gaussian_blur_is_symmetric_and_conserves_mass() {
        let mut image = RgbImage::new(31, 31);
        image.put_pixel(15, 15, Rgb([255, 255, 255]));
        let blurred = BlurFilter::new(BlurKind::Gaussian, 1.0).unwrap().apply(&image);
        assert_eq!(blurred.get_pixel(14, 15), blurred.get_pixel(16, 15));
        assert_eq!(blurred.get_pixel(15, 14), blurred.get_pixel(15, 16));
        assert!(blurred.get_pixel(15, 15)[0] < 255);
        let total: u32 = blurred.pixels().map(|p| p[0] as u32).sum();
        assert!((230..=280).contains(&total), "total {total}");
    }

    #[rstest]
    #[case(BlurKind::Box)]
    #[case(BlurKind::Gaussian)]
    #[case(BlurKind::Median)]
    #[case(BlurKind::Bilateral)]
    fn test_blur_keeps_uniform_image(#[case] kind: BlurKind) {
        let image = RgbImage::from_pixel(12, 9, Rgb([40, 120, 200]));
        let blurred = BlurFilter::new(kind, 2.0).unwrap().apply(&image);
        assert_eq!(blurred, image);
    }

    #[test]
    fn test_box_blur_spreads_single_pixel() {
        let mut image = RgbImage::new(9, 9);
        image.put_pixel(4, 4, Rgb([90, 90, 90]));
        let blurred = BlurFilter::Box { ksize: 3 }.apply(&image);
        assert_eq!(blurred.get_pixel(4, 4), &Rgb([10, 10, 10]));
        assert_eq!(blurred.get_pixel(3, 5), &Rgb([10, 10, 10]));
        assert_eq!(blurred.get_pixel(2, 4), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_resize_matches_target_dimensions() {
        let image = RgbImage::new(320, 240);
        for interpolation in [
            Interpolation::Nearest,
            Interpolation::Linear,
            Interpolation::Cubic,
            Interpolation::Lanczos,
        ] {
            assert_eq!(resize(&image, 160, 90, interpolation).dimensions(), (160, 90));
        }
    }

    #[test]
    fn test_threshold_bounds_round_half_to_even() {
        // 76.5 rounds to 76, so a saturation of 76 is inside the range.
        let ranges = HsvRanges {
            hue: Range::new(0.0, 179.0),
            saturation: Range::new(76.5, 255.0),
            value: Range::new(0.0, 255.0),
        };
        // (255, 179, 179): v = 255, s = round(255 * 76 / 255) = 76.
        let image = RgbImage::from_pixel(1, 1, Rgb([255, 179, 179]));
        assert_eq!(hsv_threshold(&image, &ranges).get_pixel(0, 0)[0], MASK_FOREGROUND);
    }

    #[test]
    fn test_threshold_selects_in_range_pixels() {
        let ranges = HsvRanges {
            hue: Range::new(50.0, 70.0),
            saturation: Range::new(100.0, 255.0),
            value: Range::new(100.0, 255.0),
        };
        let mut image = RgbImage::new(3, 1);
        image.put_pixel(0, 0, Rgb([0, 255, 0]));
        image.put_pixel(1, 0, Rgb([255, 0, 0]));
        let mask = hsv_threshold(&image, &ranges);
        assert_eq!(mask.as_raw(), &vec![MASK_FOREGROUND, MASK_BACKGROUND, MASK_BACKGROUND]);
    }
}
