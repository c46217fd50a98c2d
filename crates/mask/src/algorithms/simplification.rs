use geo_types::{Coord, LineString};
use crate::{error::Result, traits::ShapePostProcessor, types::MaskPolygon};

fn simplify_ring(points: &[[f64; 2]], tolerance: f64) -> Vec<[f64; 2]> {
    use geo::Simplify;

    let coords: Vec<Coord<f64>> = points.iter().map(|&[x, y]| Coord { x, y }).collect();
    LineString::new(coords)
        .simplify(&tolerance)
        .coords()
        .map(|c| [c.x, c.y])
        .collect()
}

/// Douglas-Peucker simplifier using geo crate's implementation
#[derive(Debug, Clone)]
pub struct DouglasPeuckerSimplifier {
    pub tolerance: f64,
}

impl ShapePostProcessor for DouglasPeuckerSimplifier {
    fn process(&self, shapes: &mut [MaskPolygon]) -> Result<()> {
        for shape in shapes {
            shape.exterior = simplify_ring(&shape.exterior, self.tolerance);
            for hole in &mut shape.holes {
                *hole = simplify_ring(hole, self.tolerance);
            }
        }
        Ok(())
    }
}

/// Clears polygons that cannot enclose any area (fewer than three points or
/// non-finite coordinates) and drops degenerate holes.
#[derive(Debug, Clone, Default)]
pub struct GeometryValidator;

impl ShapePostProcessor for GeometryValidator {
    fn process(&self, shapes: &mut [MaskPolygon]) -> Result<()> {
        for shape in shapes {
            let has_invalid_coords = shape
                .exterior
                .iter()
                .chain(shape.holes.iter().flatten())
                .any(|&[x, y]| !x.is_finite() || !y.is_finite());

            if shape.exterior.len() < 3 || has_invalid_coords {
                shape.exterior.clear();
                shape.holes.clear();
                continue;
            }
            shape.holes.retain(|hole| hole.len() >= 3);
        }
        Ok(())
    }
}
