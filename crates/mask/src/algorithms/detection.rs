use tracing::debug;
use crate::{error::{MaskError, Result}, traits::HoleAssigner, types::{MaskPolygon, TracedContour}};

/// Attaches every hole border to the outer border that encloses it,
/// using the parent links produced by the border follower.
#[derive(Debug, Clone, Default)]
pub struct ParentLinkHoleAssigner;

impl HoleAssigner for ParentLinkHoleAssigner {
    fn assign_holes(&self, contours: Vec<TracedContour>) -> Result<Vec<MaskPolygon>> {
        // contour index -> polygon index, for outer borders only
        let mut owner: Vec<Option<usize>> = vec![None; contours.len()];
        let mut polygons = Vec::new();

        for (i, contour) in contours.iter().enumerate() {
            if !contour.is_hole {
                owner[i] = Some(polygons.len());
                polygons.push(MaskPolygon::new(contour.points.clone()));
            }
        }

        for contour in contours.into_iter().filter(|c| c.is_hole) {
            let parent = contour.parent.ok_or_else(|| {
                MaskError::GeometricComputation("hole border without an enclosing border".into())
            })?;
            match owner.get(parent).copied().flatten() {
                Some(idx) => polygons[idx].holes.push(contour.points),
                None => debug!(parent, "dropping hole whose parent is not an outer border"),
            }
        }

        Ok(polygons)
    }
}

/// Treats every outer border as a separate polygon and ignores holes
#[derive(Debug, Clone, Default)]
pub struct OuterOnlyAssigner;

impl HoleAssigner for OuterOnlyAssigner {
    fn assign_holes(&self, contours: Vec<TracedContour>) -> Result<Vec<MaskPolygon>> {
        Ok(contours
            .into_iter()
            .filter(|c| !c.is_hole)
            .map(|c| MaskPolygon::new(c.points))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contour(points: &[[f64; 2]], is_hole: bool, parent: Option<usize>) -> TracedContour {
        TracedContour { points: points.to_vec(), is_hole, parent }
    }

    #[test]
    fn test_holes_follow_parent_links() {
        let contours = vec![
            contour(&[[0.0, 0.0], [9.0, 0.0], [9.0, 9.0], [0.0, 9.0]], false, None),
            contour(&[[3.0, 3.0], [5.0, 3.0], [5.0, 5.0]], true, Some(0)),
            contour(&[[20.0, 20.0], [22.0, 20.0], [22.0, 22.0]], false, None),
        ];

        let polygons = ParentLinkHoleAssigner.assign_holes(contours.clone()).unwrap();
        assert_eq!(polygons.len(), 2);
        assert_eq!(polygons[0].holes.len(), 1);
        assert!(polygons[1].holes.is_empty());

        let outer_only = OuterOnlyAssigner.assign_holes(contours).unwrap();
        assert_eq!(outer_only.len(), 2);
        assert!(outer_only.iter().all(|p| p.holes.is_empty()));
    }

    #[test]
    fn test_orphan_hole_is_an_error() {
        let contours = vec![contour(&[[1.0, 1.0]], true, None)];
        assert!(ParentLinkHoleAssigner.assign_holes(contours).is_err());
    }
}
