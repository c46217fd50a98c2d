use image::GrayImage;
use imageproc::contours::BorderType;
use crate::{error::Result, traits::ContourExtractor, types::TracedContour};

/// Border-following contour extractor backed by imageproc
#[derive(Debug, Clone, Default)]
pub struct ImageprocContourExtractor;

impl ContourExtractor for ImageprocContourExtractor {
    fn extract_contours(&self, binary_image: &GrayImage) -> Result<Vec<TracedContour>> {
        let contours = imageproc::contours::find_contours::<i32>(binary_image);

        let result = contours
            .into_iter()
            .map(|contour| TracedContour {
                points: contour
                    .points
                    .iter()
                    .map(|p| [p.x as f64, p.y as f64])
                    .collect(),
                is_hole: contour.border_type == BorderType::Hole,
                parent: contour.parent,
            })
            .collect();

        Ok(result)
    }
}
