use crate::{
    pipeline::Pipeline,
    traits::{ImagePreprocessor, ContourExtractor, HoleAssigner, ShapePostProcessor},
    algorithms::{
        ImageprocContourExtractor,
        ParentLinkHoleAssigner,
        ThresholdPreprocessor,
        DouglasPeuckerSimplifier,
        GeometryValidator,
    },
};

/// Builder for creating vectorization pipelines with a fluent API
pub struct PipelineBuilder {
    preprocessors: Vec<Box<dyn ImagePreprocessor>>,
    contour_extractor: Option<Box<dyn ContourExtractor>>,
    hole_assigner: Option<Box<dyn HoleAssigner>>,
    postprocessors: Vec<Box<dyn ShapePostProcessor>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            preprocessors: Vec::new(),
            contour_extractor: None,
            hole_assigner: None,
            postprocessors: Vec::new(),
        }
    }

    pub fn add_preprocessor<P>(mut self, preprocessor: P) -> Self
    where
        P: ImagePreprocessor + 'static,
    {
        self.preprocessors.push(Box::new(preprocessor));
        self
    }

    /// Set the contour extractor (replaces any existing one)
    pub fn set_contour_extractor<E>(mut self, extractor: E) -> Self
    where
        E: ContourExtractor + 'static,
    {
        self.contour_extractor = Some(Box::new(extractor));
        self
    }

    /// Set the hole assigner (replaces any existing one)
    pub fn set_hole_assigner<H>(mut self, assigner: H) -> Self
    where
        H: HoleAssigner + 'static,
    {
        self.hole_assigner = Some(Box::new(assigner));
        self
    }

    pub fn add_postprocessor<P>(mut self, postprocessor: P) -> Self
    where
        P: ShapePostProcessor + 'static,
    {
        self.postprocessors.push(Box::new(postprocessor));
        self
    }

    /// Add Douglas-Peucker simplification as a post-processing step
    pub fn with_simplification(self, tolerance: f64) -> Self {
        self.add_postprocessor(DouglasPeuckerSimplifier { tolerance })
    }

    pub fn with_validation(self) -> Self {
        self.add_postprocessor(GeometryValidator)
    }

    /// Build the pipeline with default components if not specified
    pub fn build(self) -> Pipeline {
        let contour_extractor = self
            .contour_extractor
            .unwrap_or_else(|| Box::new(ImageprocContourExtractor));

        let hole_assigner = self
            .hole_assigner
            .unwrap_or_else(|| Box::new(ParentLinkHoleAssigner));

        Pipeline::new(
            self.preprocessors,
            contour_extractor,
            hole_assigner,
            self.postprocessors,
        )
    }

    /// The pipeline used for segmentation masks: binarize, trace, validate
    pub fn build_segmentation() -> Pipeline {
        Self::new()
            .add_preprocessor(ThresholdPreprocessor::default())
            .with_validation()
            .build()
    }

    /// Segmentation pipeline with outline simplification
    pub fn build_segmentation_simplified(tolerance: f64) -> Pipeline {
        Self::new()
            .add_preprocessor(ThresholdPreprocessor::default())
            .with_simplification(tolerance)
            .with_validation()
            .build()
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
