use headingcam::config::ThresholdConfig;
use headingcam::{Frame, PipelineVariant, Range, VisionConfig};
use image::{Rgb, RgbImage};
use tempfile::NamedTempFile;

pub const WIDTH: u32 = 160;
pub const HEIGHT: u32 = 90;

const TARGET: Rgb<u8> = Rgb([0, 255, 0]);

/// An all-black frame
pub fn blank_frame(index: usize) -> Frame {
    Frame::from_rgb(RgbImage::new(WIDTH, HEIGHT), index)
}

/// Pure green disks `(cx, cy, radius)` on black
pub fn disk_image(disks: &[(i32, i32, i32)]) -> RgbImage {
    RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
        let (x, y) = (x as i32, y as i32);
        let inside = disks
            .iter()
            .any(|&(cx, cy, r)| (x - cx).pow(2) + (y - cy).pow(2) <= r * r);
        if inside { TARGET } else { Rgb([0, 0, 0]) }
    })
}

pub fn disk_frame(disks: &[(i32, i32, i32)], index: usize) -> Frame {
    Frame::from_rgb(disk_image(disks), index)
}

/// Configuration that segments pure green and keeps frames at their native size
pub fn green_config(variant: PipelineVariant) -> VisionConfig {
    VisionConfig {
        variant,
        blur: None,
        threshold: ThresholdConfig {
            alliance: None,
            hue: Range::new(50.0, 70.0),
            saturation: Range::new(100.0, 255.0),
            value: Range::new(100.0, 255.0),
        },
        ..Default::default()
    }
}

/// Writes `image` to a temporary PNG that lives as long as the returned handle.
pub fn save_png(image: &RgbImage) -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp image file");
    image
        .save_with_format(file.path(), image::ImageFormat::Png)
        .expect("Failed to save test image");
    file
}
