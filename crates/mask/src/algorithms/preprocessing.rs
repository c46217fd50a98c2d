use image::GrayImage;
use crate::{error::Result, traits::ImagePreprocessor};

/// Binarizes the mask: pixels above `threshold` become foreground
#[derive(Debug, Clone)]
pub struct ThresholdPreprocessor {
    pub threshold: u8,
}

impl Default for ThresholdPreprocessor {
    fn default() -> Self {
        // segmentation masks are written as 0 / 255, sometimes 0 / 1
        Self { threshold: 0 }
    }
}

impl ImagePreprocessor for ThresholdPreprocessor {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        Ok(imageproc::contrast::threshold(image, self.threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_label_one_masks_become_foreground() {
        let mut img = GrayImage::new(4, 4);
        img.put_pixel(1, 1, Luma([1u8]));
        let out = ThresholdPreprocessor::default().preprocess(&img).unwrap();
        assert_eq!(out.get_pixel(1, 1)[0], 255);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
    }
}
