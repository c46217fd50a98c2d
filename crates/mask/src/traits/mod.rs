use image::GrayImage;
use crate::{error::Result, types::{MaskPolygon, TracedContour}};

/// Trait for image preprocessing algorithms
pub trait ImagePreprocessor: Send + Sync {
    /// Preprocess the input image (e.g. threshold to a binary raster)
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage>;
}

/// Trait for contour extraction algorithms
pub trait ContourExtractor: Send + Sync {
    /// Trace region borders in a binary image
    fn extract_contours(&self, image: &GrayImage) -> Result<Vec<TracedContour>>;
}

/// Trait for turning traced borders into polygons
pub trait HoleAssigner: Send + Sync {
    fn assign_holes(&self, contours: Vec<TracedContour>) -> Result<Vec<MaskPolygon>>;
}

/// Trait for polygon post-processing algorithms
pub trait ShapePostProcessor: Send + Sync {
    fn process(&self, shapes: &mut [MaskPolygon]) -> Result<()>;
}
