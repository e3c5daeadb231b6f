use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::{Contour, Range, Shape};

/// Geometric limits a contour must meet to stay a candidate. All checks are inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterBounds {
    pub min_area: f64,
    pub min_perimeter: f64,
    /// Bounding-box width in pixels.
    pub width: Range,
    /// Bounding-box height in pixels.
    pub height: Range,
    /// `100 * area / hull_area`.
    pub solidity: Range,
    /// Number of stored boundary points.
    pub vertices: Range,
    /// Bounding-box width over height.
    pub ratio: Range,
    /// Discard holes and regions enclosed by another region.
    pub external_only: bool,
}

impl Default for FilterBounds {
    fn default() -> Self {
        Self {
            min_area: 0.0,
            min_perimeter: 0.0,
            width: Range::new(0.0, 1000.0),
            height: Range::new(0.0, 1000.0),
            solidity: Range::new(0.0, 100.0),
            vertices: Range::new(0.0, 1_000_000.0),
            ratio: Range::new(0.0, 1000.0),
            external_only: true,
        }
    }
}

impl FilterBounds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("filter.min_area", self.min_area),
            ("filter.min_perimeter", self.min_perimeter),
        ] {
            if !(value >= 0.0) {
                return Err(ConfigError::Negative { field, value });
            }
        }
        self.width.validate("filter.width")?;
        self.height.validate("filter.height")?;
        self.solidity.validate("filter.solidity")?;
        self.vertices.validate("filter.vertices")?;
        self.ratio.validate("filter.ratio")
    }

    /// Checks run cheapest first: box size, area, perimeter, solidity,
    /// vertex count, aspect ratio.
    pub fn accepts(&self, contour: &Contour) -> bool {
        if self.external_only && contour.nested {
            return false;
        }

        let bbox = contour.bounding_box();
        if !self.width.contains(bbox.width as f64) || !self.height.contains(bbox.height as f64) {
            return false;
        }
        if contour.area() < self.min_area {
            return false;
        }
        if contour.perimeter() < self.min_perimeter {
            return false;
        }
        // A degenerate hull has no solidity and never passes.
        match contour.solidity() {
            Some(solidity) if self.solidity.contains(solidity) => {}
            _ => return false,
        }
        if !self.vertices.contains(contour.vertex_count() as f64) {
            return false;
        }
        self.ratio.contains(contour.aspect_ratio())
    }
}

/// Keep contours that pass `bounds`. Circles carry no boundary and pass through.
pub fn filter_shapes(shapes: Vec<Shape>, bounds: &FilterBounds) -> Vec<Shape> {
    shapes
        .into_iter()
        .filter(|shape| match shape {
            Shape::Contour(contour) => bounds.accepts(contour),
            Shape::Circle(_) => true,
        })
        .collect()
}

/// The shape with the strictly largest size; on ties the earliest wins.
pub fn select_largest(shapes: Vec<Shape>) -> Option<Shape> {
    let mut best: Option<Shape> = None;
    for shape in shapes {
        let replace = match &best {
            Some(current) => shape.size() > current.size(),
            None => true,
        };
        if replace {
            best = Some(shape);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Circle;
    use imageproc::point::Point;
    use rstest::rstest;

    fn rect(x: i32, y: i32, w: i32, h: i32) -> Contour {
        Contour::new(vec![
            Point::new(x, y),
            Point::new(x + w - 1, y),
            Point::new(x + w - 1, y + h - 1),
            Point::new(x, y + h - 1),
        ])
    }

    fn circle(x: f64, radius: f64) -> Shape {
        Shape::Circle(Circle { x, y: 0.0, radius })
    }

    #[test]
    fn test_default_bounds_accept_plain_rectangle() {
        assert!(FilterBounds::default().accepts(&rect(0, 0, 10, 5)));
    }

    #[rstest]
    #[case::too_narrow(FilterBounds { width: Range::new(11.0, 100.0), ..Default::default() })]
    #[case::too_tall(FilterBounds { height: Range::new(0.0, 4.0), ..Default::default() })]
    #[case::too_small(FilterBounds { min_area: 37.0, ..Default::default() })]
    #[case::too_short(FilterBounds { min_perimeter: 27.0, ..Default::default() })]
    #[case::too_few_vertices(FilterBounds { vertices: Range::new(5.0, 10.0), ..Default::default() })]
    #[case::too_wide(FilterBounds { ratio: Range::new(0.0, 1.5), ..Default::default() })]
    fn test_each_bound_rejects(#[case] bounds: FilterBounds) {
        // 10x5 box: area 36, perimeter 26, ratio 2.
        assert!(!bounds.accepts(&rect(0, 0, 10, 5)));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let bounds = FilterBounds {
            min_area: 36.0,
            min_perimeter: 26.0,
            width: Range::new(10.0, 10.0),
            height: Range::new(5.0, 5.0),
            vertices: Range::new(4.0, 4.0),
            ratio: Range::new(2.0, 2.0),
            ..Default::default()
        };
        assert!(bounds.accepts(&rect(0, 0, 10, 5)));
    }

    #[test]
    fn test_degenerate_hull_fails_solidity() {
        let line = Contour::new(vec![Point::new(0, 0), Point::new(8, 0)]);
        assert!(!FilterBounds::default().accepts(&line));
    }

    #[test]
    fn test_nested_contours_follow_external_only() {
        let mut hole = rect(5, 5, 4, 4);
        hole.nested = true;
        assert!(!FilterBounds::default().accepts(&hole));
        let all = FilterBounds {
            external_only: false,
            ..Default::default()
        };
        assert!(all.accepts(&hole));
    }

    #[test]
    fn test_circles_pass_through() {
        let bounds = FilterBounds {
            min_area: 1e9,
            ..Default::default()
        };
        let shapes = vec![circle(1.0, 3.0), Shape::Contour(rect(0, 0, 3, 3))];
        assert_eq!(filter_shapes(shapes, &bounds), vec![circle(1.0, 3.0)]);
    }

    #[test]
    fn test_select_largest_prefers_first_on_tie() {
        let shapes = vec![circle(1.0, 5.0), circle(2.0, 8.0), circle(3.0, 8.0)];
        assert_eq!(select_largest(shapes), Some(circle(2.0, 8.0)));
    }

    #[test]
    fn test_select_largest_of_nothing() {
        assert_eq!(select_largest(Vec::new()), None);
    }

    #[test]
    fn test_validate_rejects_bad_bounds() {
        let negative = FilterBounds {
            min_perimeter: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            negative.validate(),
            Err(ConfigError::Negative { field: "filter.min_perimeter", .. })
        ));
        let inverted = FilterBounds {
            solidity: Range::new(90.0, 10.0),
            ..Default::default()
        };
        assert!(matches!(inverted.validate(), Err(ConfigError::InvertedRange { .. })));
    }
}
