use serde::{Deserialize, Serialize};
use geo_types::{Coord, LineString, Polygon};

/// Result of vectorizing one mask raster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizedMask {
    /// One entry per connected foreground region
    pub polygons: Vec<MaskPolygon>,
    /// Raster dimensions in pixels
    pub width: u32,
    pub height: u32,
}

/// A border traced in the raster, before holes are attached to their owners
#[derive(Debug, Clone, PartialEq)]
pub struct TracedContour {
    pub points: Vec<[f64; 2]>,
    pub is_hole: bool,
    /// Index of the enclosing contour in the same extraction result
    pub parent: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaskPolygon {
    /// Outer boundary in pixel coordinates, in tracing order
    pub exterior: Vec<[f64; 2]>,
    /// Interior boundaries (holes)
    pub holes: Vec<Vec<[f64; 2]>>,
}

fn to_line_string(points: &[[f64; 2]]) -> LineString<f64> {
    LineString::new(points.iter().map(|&[x, y]| Coord { x, y }).collect())
}

fn ring_length(points: &[[f64; 2]]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let open: f64 = points
        .windows(2)
        .map(|w| ((w[1][0] - w[0][0]).powi(2) + (w[1][1] - w[0][1]).powi(2)).sqrt())
        .sum();
    // contours from the tracer are implicitly closed
    let (first, last) = (points[0], points[points.len() - 1]);
    open + ((first[0] - last[0]).powi(2) + (first[1] - last[1]).powi(2)).sqrt()
}

impl MaskPolygon {
    pub fn new(exterior: Vec<[f64; 2]>) -> Self {
        Self { exterior, holes: Vec::new() }
    }

    /// Convert to geo-types Polygon for geometric operations
    pub fn to_geo_polygon(&self) -> Polygon<f64> {
        let holes = self.holes.iter().map(|hole| to_line_string(hole)).collect();
        Polygon::new(to_line_string(&self.exterior), holes)
    }

    /// Area enclosed by the exterior minus the holes, in square pixels
    pub fn area(&self) -> f64 {
        use geo::Area;
        self.to_geo_polygon().unsigned_area()
    }

    /// Total length of all rings
    pub fn perimeter(&self) -> f64 {
        ring_length(&self.exterior) + self.holes.iter().map(|h| ring_length(h)).sum::<f64>()
    }

    pub fn has_holes(&self) -> bool {
        !self.holes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_area_and_perimeter() {
        let square = MaskPolygon::new(vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]);
        assert!((square.area() - 100.0).abs() < 1e-9);
        assert!((square.perimeter() - 40.0).abs() < 1e-9);
        assert!(!square.has_holes());
    }

    #[test]
    fn test_hole_reduces_area() {
        let mut shape = MaskPolygon::new(vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]);
        shape.holes.push(vec![[2.0, 2.0], [4.0, 2.0], [4.0, 4.0], [2.0, 4.0]]);
        assert!((shape.area() - 96.0).abs() < 1e-9);
    }
}
