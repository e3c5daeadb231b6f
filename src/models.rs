use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::geometry::{arc_length, convex_hull};
use imageproc::point::Point;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ProcessingError};

/// Mask value for pixels outside every threshold range.
pub const MASK_BACKGROUND: u8 = 0;
/// Mask value for pixels inside all three threshold ranges.
pub const MASK_FOREGROUND: u8 = 255;

/// Single-channel binary image; every pixel is `MASK_BACKGROUND` or `MASK_FOREGROUND`.
pub type Mask = GrayImage;

/// A captured camera frame: contiguous bytes in row-major order.
///
/// One channel is luma, three are RGB, four are RGBA (alpha is ignored).
/// The buffer is only checked when a stage asks for pixels, so a malformed
/// frame costs the frame and nothing else.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn from_rgb(image: RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 3, index)
    }

    pub fn from_dynamic(image: DynamicImage, index: usize) -> Self {
        Self::from_rgb(image.to_rgb8(), index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Decode the buffer into an RGB image.
    pub fn to_rgb(&self) -> Result<RgbImage, ProcessingError> {
        if self.width == 0 || self.height == 0 {
            return Err(ProcessingError::EmptyFrame {
                width: self.width,
                height: self.height,
            });
        }
        if !matches!(self.channels, 1 | 3 | 4) {
            return Err(ProcessingError::UnsupportedChannels(self.channels));
        }

        let pixels = self.width as usize * self.height as usize;
        let expected = pixels * self.channels as usize;
        if self.data.len() != expected {
            return Err(ProcessingError::MalformedBuffer {
                width: self.width,
                height: self.height,
                channels: self.channels,
                expected,
                actual: self.data.len(),
            });
        }

        let stride = self.channels as usize;
        let width = self.width;
        let data = &self.data;
        let rgb = RgbImage::from_fn(self.width, self.height, |x, y| {
            let offset = (y as usize * width as usize + x as usize) * stride;
            match stride {
                1 => Rgb([data[offset]; 3]),
                _ => Rgb([data[offset], data[offset + 1], data[offset + 2]]),
            }
        });
        Ok(rgb)
    }
}

/// Axis-aligned bounding box; `width`/`height` count pixels inclusively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Center as `x + w/2`, `y + h/2`.
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }
}

/// Inclusive `[min, max]` range. Deserializes from a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn validate(&self, field: &str) -> Result<(), ConfigError> {
        // Written so that NaN bounds are rejected as well.
        if !(self.min <= self.max) {
            return Err(ConfigError::InvertedRange {
                field: field.to_string(),
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

impl From<[f64; 2]> for Range {
    fn from([min, max]: [f64; 2]) -> Self {
        Self { min, max }
    }
}

impl From<Range> for [f64; 2] {
    fn from(range: Range) -> Self {
        [range.min, range.max]
    }
}

/// Boundary of a connected foreground region, in traversal order.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<Point<i32>>,
    /// True for hole borders and for regions enclosed by another region.
    pub nested: bool,
}

impl Contour {
    pub fn new(points: Vec<Point<i32>>) -> Self {
        Self {
            points,
            nested: false,
        }
    }

    /// Four-corner contour covering `bbox`.
    pub fn from_bounding_box(bbox: BoundingBox) -> Self {
        let x0 = bbox.x as i32;
        let y0 = bbox.y as i32;
        let x1 = x0 + bbox.width as i32 - 1;
        let y1 = y0 + bbox.height as i32 - 1;
        Self::new(vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let Some(first) = self.points.first() else {
            return BoundingBox::default();
        };
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &self.points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        BoundingBox {
            x: min_x.max(0) as u32,
            y: min_y.max(0) as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        }
    }

    /// Polygon area enclosed by the boundary points (shoelace formula).
    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }

    /// Closed arc length of the boundary.
    pub fn perimeter(&self) -> f64 {
        arc_length(self.points.as_slice(), true)
    }

    pub fn hull_area(&self) -> f64 {
        if self.points.len() < 3 {
            return 0.0;
        }
        polygon_area(&convex_hull(self.points.as_slice()))
    }

    /// `area / hull_area * 100`, or `None` when the hull is degenerate.
    pub fn solidity(&self) -> Option<f64> {
        let hull = self.hull_area();
        (hull > 0.0).then(|| 100.0 * self.area() / hull)
    }

    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    /// Bounding-box width over height.
    pub fn aspect_ratio(&self) -> f64 {
        let bbox = self.bounding_box();
        if bbox.height == 0 {
            return 0.0;
        }
        bbox.width as f64 / bbox.height as f64
    }

    pub fn center(&self) -> (f64, f64) {
        self.bounding_box().center()
    }
}

fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice.abs() as f64 / 2.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

/// A candidate target: a boundary contour or a detected circle.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Contour(Contour),
    Circle(Circle),
}

impl Shape {
    pub fn center(&self) -> (f64, f64) {
        match self {
            Shape::Contour(contour) => contour.center(),
            Shape::Circle(circle) => (circle.x, circle.y),
        }
    }

    /// Ranking key for selection: radius for circles, area for contours.
    pub fn size(&self) -> f64 {
        match self {
            Shape::Contour(contour) => contour.area(),
            Shape::Circle(circle) => circle.radius,
        }
    }
}
