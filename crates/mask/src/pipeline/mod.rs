pub mod builder;

use image::GrayImage;
use tracing::debug;
use crate::{
    error::{MaskError, Result},
    types::VectorizedMask,
    traits::{ImagePreprocessor, ContourExtractor, HoleAssigner, ShapePostProcessor},
};

/// Mask vectorization pipeline: preprocess, trace borders, build polygons,
/// post-process.
pub struct Pipeline {
    preprocessors: Vec<Box<dyn ImagePreprocessor>>,
    contour_extractor: Box<dyn ContourExtractor>,
    hole_assigner: Box<dyn HoleAssigner>,
    postprocessors: Vec<Box<dyn ShapePostProcessor>>,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::PipelineBuilder {
        builder::PipelineBuilder::new()
    }

    pub fn new(
        preprocessors: Vec<Box<dyn ImagePreprocessor>>,
        contour_extractor: Box<dyn ContourExtractor>,
        hole_assigner: Box<dyn HoleAssigner>,
        postprocessors: Vec<Box<dyn ShapePostProcessor>>,
    ) -> Self {
        Self {
            preprocessors,
            contour_extractor,
            hole_assigner,
            postprocessors,
        }
    }

    /// Process an image through the entire pipeline
    pub fn process(&self, image: &GrayImage) -> Result<VectorizedMask> {
        if image.width() == 0 || image.height() == 0 {
            return Err(MaskError::EmptyRaster {
                width: image.width(),
                height: image.height(),
            });
        }

        let mut processed_image = image.clone();
        for preprocessor in &self.preprocessors {
            processed_image = preprocessor.preprocess(&processed_image)?;
        }

        let contours = self.contour_extractor.extract_contours(&processed_image)?;
        debug!(contours = contours.len(), "traced mask borders");

        let mut polygons = self.hole_assigner.assign_holes(contours)?;

        for postprocessor in &self.postprocessors {
            postprocessor.process(&mut polygons)?;
        }

        // post-processors mark rejected shapes by clearing them
        polygons.retain(|shape| !shape.exterior.is_empty());

        Ok(VectorizedMask {
            polygons,
            width: image.width(),
            height: image.height(),
        })
    }

    /// Decode raw raster bytes (PNG, TIFF, ...) and vectorize them
    pub fn process_bytes(&self, bytes: &[u8]) -> Result<VectorizedMask> {
        let image = image::load_from_memory(bytes)?.to_luma8();
        self.process(&image)
    }

    pub fn info(&self) -> String {
        format!(
            "Pipeline: {} preprocessors, {} postprocessors",
            self.preprocessors.len(),
            self.postprocessors.len()
        )
    }
}
