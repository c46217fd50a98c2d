use thiserror::Error;

#[derive(Error, Debug)]
pub enum MaskError {
    #[error("Failed to decode mask raster: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("Mask raster is empty ({width}x{height})")]
    EmptyRaster { width: u32, height: u32 },

    #[error("Geometric computation error: {0}")]
    GeometricComputation(String),
}

pub type Result<T> = std::result::Result<T, MaskError>;
