use imageproc::contours;
use imageproc::point::Point;
use serde::{Deserialize, Serialize};

use crate::models::{BoundingBox, Contour, MASK_BACKGROUND, Mask};

/// How boundary points are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainApprox {
    /// Every boundary pixel
    None,
    /// Only the end points of straight horizontal, vertical and diagonal runs
    #[default]
    Simple,
}

/// Find region boundaries in a binary mask, in raster discovery order
pub fn find_contours(mask: &Mask, external_only: bool, approx: ChainApprox) -> Vec<Contour> {
    contours::find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| !external_only || c.parent.is_none())
        .map(|c| {
            let points = match approx {
                ChainApprox::None => c.points,
                ChainApprox::Simple => compress_chain(&c.points),
            };
            Contour {
                points,
                nested: c.parent.is_some(),
            }
        })
        .collect()
}

/// Drop every point whose incoming and outgoing steps point the same way.
///
/// The chain is closed: the last point connects back to the first.
pub fn compress_chain(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let step = |a: Point<i32>, b: Point<i32>| (b.x - a.x, b.y - a.y);
    let kept: Vec<Point<i32>> = (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let here = points[i];
            let next = points[(i + 1) % n];
            step(prev, here) != step(here, next)
        })
        .map(|i| points[i])
        .collect();

    if kept.is_empty() { points.to_vec() } else { kept }
}

/// Tight box around every foreground pixel, `None` for an empty mask
pub fn mask_bounding_box(mask: &Mask) -> Option<BoundingBox> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel[0] == MASK_BACKGROUND {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((min_x, min_y, max_x, max_y)) => {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            }
        });
    }

    bounds.map(|(min_x, min_y, max_x, max_y)| BoundingBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}
