use std::fmt;
use std::path::Path;

use mask::{Pipeline, PipelineBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{file_name, Decoded};
use crate::error::{LoaderError, Result};
use crate::features::mask_features;
use crate::types::PolygonRecord;

/// Positions of the tile grid indices among the `_` separated tokens of a
/// tile file name such as `TCGA-AB-0001.svs_mpp_0.25_12_34-seg.png`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TileNameLayout {
    pub x_token: usize,
    pub y_token: usize,
}

impl Default for TileNameLayout {
    fn default() -> Self {
        Self { x_token: 3, y_token: 4 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileIdentity {
    pub case_id: String,
    pub shift: (f64, f64),
}

impl TileNameLayout {
    const SUFFIXES: [&'static str; 2] = ["-seg.png", ".png"];

    /// Names with fewer tokens than the layout expects fall back to the
    /// trailing two tokens as the grid indices.
    pub fn parse(&self, path: &Path, tile_size: f64) -> Result<TileIdentity> {
        let name = file_name(path)?;
        let stem = Self::SUFFIXES
            .iter()
            .find_map(|suffix| name.strip_suffix(suffix))
            .unwrap_or(name);
        let tokens: Vec<&str> = stem.split('_').collect();

        let (x_raw, y_raw) = if tokens.len() > self.x_token.max(self.y_token) {
            (tokens[self.x_token], tokens[self.y_token])
        } else if tokens.len() >= 3 {
            (tokens[tokens.len() - 2], tokens[tokens.len() - 1])
        } else {
            return Err(LoaderError::parse(path, "tile name has no grid indices"));
        };

        let index = |raw: &str| {
            raw.parse::<i64>()
                .map_err(|_| LoaderError::parse(path, format!("tile index '{raw}' is not an integer")))
        };
        let (x, y) = (index(x_raw)?, index(y_raw)?);

        let case_id = tokens[0].split('.').next().unwrap_or_default();
        if case_id.is_empty() {
            return Err(LoaderError::parse(path, "tile name has no case id"));
        }

        Ok(TileIdentity {
            case_id: case_id.to_string(),
            shift: (x as f64 * tile_size, y as f64 * tile_size),
        })
    }
}

/// Vectorizes mask rasters; tiles additionally carry their grid position in
/// the file name.
pub struct MaskParser {
    pipeline: Pipeline,
    tiling: Option<(TileNameLayout, f64)>,
}

impl fmt::Debug for MaskParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaskParser")
            .field("pipeline", &self.pipeline.info())
            .field("tiling", &self.tiling)
            .finish()
    }
}

impl MaskParser {
    fn pipeline(simplify: Option<f64>) -> Pipeline {
        match simplify {
            Some(tolerance) => PipelineBuilder::build_segmentation_simplified(tolerance),
            None => PipelineBuilder::build_segmentation(),
        }
    }

    pub fn single(simplify: Option<f64>) -> Self {
        Self { pipeline: Self::pipeline(simplify), tiling: None }
    }

    pub fn tiled(simplify: Option<f64>, layout: TileNameLayout, tile_size: f64) -> Self {
        Self { pipeline: Self::pipeline(simplify), tiling: Some((layout, tile_size)) }
    }

    pub fn tile_identity(&self, path: &Path) -> Result<TileIdentity> {
        let (layout, tile_size) = self
            .tiling
            .unwrap_or((TileNameLayout::default(), crate::config::DEFAULT_TILE_SIZE));
        layout.parse(path, tile_size)
    }

    pub fn decode(&self, path: &Path) -> Result<Decoded> {
        let bytes = std::fs::read(path)?;
        let vectorized = self.pipeline.process_bytes(&bytes)?;
        debug!(
            polygons = vectorized.polygons.len(),
            width = vectorized.width,
            height = vectorized.height,
            "vectorized mask"
        );

        let records = vectorized
            .polygons
            .iter()
            .map(|polygon| PolygonRecord {
                points: polygon.exterior.clone(),
                features: mask_features(polygon),
                area: Some(polygon.area()),
            })
            .collect();

        Ok(Decoded {
            records,
            raster: Some((vectorized.width, vectorized.height)),
        })
    }
}
