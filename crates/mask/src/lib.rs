//! # Mask Vectorizer
//!
//! Turns binary segmentation masks into polygon outlines. Every connected
//! foreground region becomes one [`MaskPolygon`] with its holes, area and
//! perimeter; the raster dimensions travel with the result so callers can
//! normalize coordinates against the mask itself.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mask::Pipeline;
//!
//! let pipeline = mask::PipelineBuilder::build_segmentation();
//! let bytes = std::fs::read("tile-seg.png")?;
//! let result = pipeline.process_bytes(&bytes)?;
//! for polygon in &result.polygons {
//!     println!("{} points, area {}", polygon.exterior.len(), polygon.area());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Custom Pipeline
//!
//! ```rust,no_run
//! use mask::{Pipeline, algorithms::*};
//!
//! let pipeline = Pipeline::builder()
//!     .add_preprocessor(ThresholdPreprocessor { threshold: 127 })
//!     .set_hole_assigner(OuterOnlyAssigner)
//!     .with_simplification(1.5)
//!     .with_validation()
//!     .build();
//! ```

pub mod error;
pub mod types;
pub mod traits;
pub mod algorithms;
pub mod pipeline;

pub use error::{MaskError, Result};
pub use types::{MaskPolygon, TracedContour, VectorizedMask};
pub use traits::*;
pub use algorithms::*;
pub use pipeline::{Pipeline, builder::PipelineBuilder};

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn fill(img: &mut GrayImage, xs: std::ops::Range<u32>, ys: std::ops::Range<u32>, value: u8) {
        for y in ys {
            for x in xs.clone() {
                img.put_pixel(x, y, Luma([value]));
            }
        }
    }

    fn two_nuclei() -> GrayImage {
        let mut img = GrayImage::new(64, 48);
        fill(&mut img, 5..20, 5..20, 255);
        fill(&mut img, 30..50, 20..40, 255);
        img
    }

    #[test]
    fn test_each_region_becomes_a_polygon() {
        let pipeline = PipelineBuilder::build_segmentation();
        let result = pipeline.process(&two_nuclei()).expect("Should vectorize");

        assert_eq!(result.polygons.len(), 2);
        assert_eq!(result.width, 64);
        assert_eq!(result.height, 48);
        assert!(result.polygons.iter().all(|p| p.area() > 0.0));
    }

    #[test]
    fn test_ring_region_keeps_its_hole() {
        let mut img = GrayImage::new(40, 40);
        fill(&mut img, 5..35, 5..35, 255);
        fill(&mut img, 15..25, 15..25, 0);

        let result = PipelineBuilder::build_segmentation().process(&img).unwrap();
        assert_eq!(result.polygons.len(), 1);
        assert!(result.polygons[0].has_holes());
    }

    #[test]
    fn test_simplification_reduces_points() {
        let image = two_nuclei();
        let plain = PipelineBuilder::build_segmentation().process(&image).unwrap();
        let simple = PipelineBuilder::build_segmentation_simplified(1.0)
            .process(&image)
            .unwrap();

        let count = |m: &VectorizedMask| m.polygons.iter().map(|p| p.exterior.len()).sum::<usize>();
        assert!(count(&simple) <= count(&plain));
    }

    #[test]
    fn test_png_bytes_round_trip_through_decoder() {
        let mut bytes = Vec::new();
        two_nuclei()
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let result = PipelineBuilder::build_segmentation().process_bytes(&bytes).unwrap();
        assert_eq!(result.polygons.len(), 2);
    }

    #[test]
    fn test_empty_raster_is_rejected() {
        let err = PipelineBuilder::build_segmentation()
            .process(&GrayImage::new(0, 0))
            .unwrap_err();
        assert!(matches!(err, MaskError::EmptyRaster { .. }));
    }
}
