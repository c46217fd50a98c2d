//! Coordinate normalization, bounding boxes and the polygon-level
//! operations shared by every input format.

use geo_types::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};

use crate::types::Point;

/// Map source pixel coordinates into the target space:
/// `x' = (x + shift_x) / width`, `y' = (y + shift_y) / height`.
pub fn normalize(points: &[Point], shift_x: f64, shift_y: f64, width: f64, height: f64) -> Vec<Point> {
    points
        .iter()
        .map(|&[x, y]| [(x + shift_x) / width, (y + shift_y) / height])
        .collect()
}

/// How a parsed outline is moved into output space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransform {
    pub shift_x: f64,
    pub shift_y: f64,
    /// `(width, height)` when scaling to [0, 1]; `None` keeps absolute pixels
    pub scale: Option<(f64, f64)>,
}

impl CoordinateTransform {
    pub fn identity() -> Self {
        Self { shift_x: 0.0, shift_y: 0.0, scale: None }
    }

    pub fn shift_only(shift_x: f64, shift_y: f64) -> Self {
        Self { shift_x, shift_y, scale: None }
    }

    pub fn normalizing(shift_x: f64, shift_y: f64, width: f64, height: f64) -> Self {
        Self { shift_x, shift_y, scale: Some((width, height)) }
    }

    pub fn is_normalizing(&self) -> bool {
        self.scale.is_some()
    }

    /// Rewrite the points in place, preserving their order.
    pub fn apply(&self, points: &mut [Point]) {
        let (width, height) = self.scale.unwrap_or((1.0, 1.0));
        for point in points.iter_mut() {
            point[0] = (point[0] + self.shift_x) / width;
            point[1] = (point[1] + self.shift_y) / height;
        }
    }
}

/// Axis-aligned extents of a point sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn to_array(self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

/// Single-pass extents; `None` for an empty sequence.
pub fn bounding_box(points: &[Point]) -> Option<BoundingBox> {
    let (&[x0, y0], rest) = points.split_first()?;
    let start = BoundingBox { min_x: x0, min_y: y0, max_x: x0, max_y: y0 };
    Some(rest.iter().fold(start, |b, &[x, y]| BoundingBox {
        min_x: b.min_x.min(x),
        min_y: b.min_y.min(y),
        max_x: b.max_x.max(x),
        max_y: b.max_y.max(y),
    }))
}

fn line_string(points: &[Point]) -> LineString<f64> {
    LineString::new(points.iter().map(|&[x, y]| Coord { x, y }).collect())
}

/// Enclosed area of an outline; zero for fewer than three points.
pub fn polygon_area(points: &[Point]) -> f64 {
    use geo::Area;

    if points.len() < 3 {
        return 0.0;
    }
    Polygon::new(line_string(points), vec![]).unsigned_area()
}

/// Douglas-Peucker simplification of an outline
pub fn simplify(points: &[Point], tolerance: f64) -> Vec<Point> {
    use geo::Simplify;

    line_string(points)
        .simplify(&tolerance)
        .coords()
        .map(|c| [c.x, c.y])
        .collect()
}

/// Inclusive pixel-area window a polygon must fall in to be kept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct AreaFilter {
    pub min: f64,
    pub max: f64,
}

impl Default for AreaFilter {
    fn default() -> Self {
        Self { min: 0.0, max: 40_000_000_000.0 }
    }
}

impl AreaFilter {
    pub fn accepts(&self, area: f64) -> bool {
        area >= self.min && area <= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_matches_formula() {
        let points = vec![[10.0, 20.0], [0.0, 0.0], [5.5, 7.25]];
        let out = normalize(&points, 2.0, 4.0, 100.0, 50.0);

        assert_eq!(out.len(), points.len());
        for (p, q) in points.iter().zip(&out) {
            assert_eq!(q[0], (p[0] + 2.0) / 100.0);
            assert_eq!(q[1], (p[1] + 4.0) / 50.0);
        }
    }

    #[test]
    fn test_transform_agrees_with_normalize() {
        let points = vec![[3.0, 4.0], [8.0, 1.0]];
        let mut in_place = points.clone();
        CoordinateTransform::normalizing(8192.0, 12288.0, 20000.0, 30000.0).apply(&mut in_place);
        assert_eq!(in_place, normalize(&points, 8192.0, 12288.0, 20000.0, 30000.0));
    }

    #[test]
    fn test_shift_only_keeps_pixel_space() {
        let mut points = vec![[1.0, 2.0]];
        let transform = CoordinateTransform::shift_only(4096.0, 8192.0);
        assert!(!transform.is_normalizing());
        transform.apply(&mut points);
        assert_eq!(points, vec![[4097.0, 8194.0]]);

        let mut untouched = vec![[1.0, 2.0]];
        CoordinateTransform::identity().apply(&mut untouched);
        assert_eq!(untouched, vec![[1.0, 2.0]]);
    }

    #[test]
    fn test_bounding_box_contains_every_point_and_ignores_order() {
        let points = vec![[3.0, 9.0], [-1.0, 4.0], [7.5, -2.0], [0.0, 0.0]];
        let bb = bounding_box(&points).unwrap();
        assert_eq!(bb.to_array(), [-1.0, -2.0, 7.5, 9.0]);
        for &[x, y] in &points {
            assert!(bb.min_x <= x && x <= bb.max_x);
            assert!(bb.min_y <= y && y <= bb.max_y);
        }

        let mut reversed = points.clone();
        reversed.reverse();
        reversed.rotate_left(1);
        assert_eq!(bounding_box(&reversed), Some(bb));
    }

    #[test]
    fn test_bounding_box_of_empty_sequence_is_none() {
        assert_eq!(bounding_box(&[]), None);
    }

    #[test]
    fn test_polygon_area_and_filter() {
        let square = vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]];
        assert_eq!(polygon_area(&square), 100.0);
        assert_eq!(polygon_area(&square[..2]), 0.0);

        let filter = AreaFilter { min: 50.0, max: 150.0 };
        assert!(filter.accepts(100.0));
        assert!(!filter.accepts(49.9));
        assert!(AreaFilter::default().accepts(0.0));
    }

    #[test]
    fn test_simplify_drops_collinear_points() {
        let line = vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [2.0, 2.0]];
        let simple = simplify(&line, 0.1);
        assert_eq!(simple, vec![[0.0, 0.0], [2.0, 0.0], [2.0, 2.0]]);
    }
}
