use std::collections::BTreeMap;
use std::f64::consts::PI;

use image::Luma;
use imageproc::region_labelling::{Connectivity, connected_components};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::{Circle, MASK_BACKGROUND, MASK_FOREGROUND, Mask, Range};

/// Blob detector settings for the circle variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobParams {
    /// Smallest region, in pixels, that counts as a blob.
    pub min_area: f64,
    /// Accepted `pixels / bounding circle area`, in [0, 1].
    pub circularity: Range,
    /// Look for background regions instead of foreground ones.
    pub dark_blobs: bool,
}

impl Default for BlobParams {
    fn default() -> Self {
        Self {
            min_area: 1.0,
            circularity: Range::new(0.0, 1.0),
            dark_blobs: false,
        }
    }
}

impl BlobParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_area >= 0.0) {
            return Err(ConfigError::Negative {
                field: "blobs.min_area",
                value: self.min_area,
            });
        }
        self.circularity.validate("blobs.circularity")
    }
}

#[derive(Debug, Clone, Copy)]
struct RegionStats {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    sum_x: u64,
    sum_y: u64,
    pixels: u64,
}

impl RegionStats {
    fn new(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            sum_x: x as u64,
            sum_y: y as u64,
            pixels: 1,
        }
    }

    fn add(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.sum_x += x as u64;
        self.sum_y += y as u64;
        self.pixels += 1;
    }

    /// Region pixels over the area of the circle spanning its longer side, capped at 1
    fn circularity(&self) -> f64 {
        let extent = (self.max_x - self.min_x + 1).max(self.max_y - self.min_y + 1) as f64;
        let bounding = PI * (extent / 2.0).powi(2);
        (self.pixels as f64 / bounding).min(1.0)
    }

    fn to_circle(self) -> Circle {
        let n = self.pixels as f64;
        Circle {
            x: self.sum_x as f64 / n,
            y: self.sum_y as f64 / n,
            radius: (n / PI).sqrt(),
        }
    }
}

/// Reduce each 8-connected region to an equal-area circle at its centroid.
///
/// Blobs come out ordered by label, i.e. by where the region was first met
/// in a raster scan.
pub fn find_blobs(mask: &Mask, params: &BlobParams) -> Vec<Circle> {
    let source = if params.dark_blobs {
        let mut inverted = mask.clone();
        for pixel in inverted.pixels_mut() {
            pixel[0] = if pixel[0] == MASK_BACKGROUND {
                MASK_FOREGROUND
            } else {
                MASK_BACKGROUND
            };
        }
        inverted
    } else {
        mask.clone()
    };

    let labeled = connected_components(&source, Connectivity::Eight, Luma([MASK_BACKGROUND]));

    let mut regions: BTreeMap<u32, RegionStats> = BTreeMap::new();
    for (x, y, label) in labeled.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        regions
            .entry(label)
            .and_modify(|stats| stats.add(x, y))
            .or_insert_with(|| RegionStats::new(x, y));
    }

    regions
        .into_values()
        .filter(|stats| stats.pixels as f64 >= params.min_area)
        .filter(|stats| params.circularity.contains(stats.circularity()))
        .map(RegionStats::to_circle)
        .collect()
}
